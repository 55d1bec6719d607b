use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Dashboard client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Base URL of the classification service
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Upper bound for every request, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Rows per page on the history view
    #[serde(default = "default_history_page_size")]
    pub history_page_size: u32,
    /// Rows shown in the recent-predictions breakdown
    #[serde(default = "default_recent_limit")]
    pub recent_limit: u32,
    /// Model whose metrics headline the analytics view
    #[serde(default = "default_featured_model")]
    pub featured_model: String,
    /// Environment variable name containing the admin key
    #[serde(default = "default_env_var_admin_key")]
    pub env_var_admin_key: String,
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_history_page_size() -> u32 {
    20
}

fn default_recent_limit() -> u32 {
    10
}

fn default_featured_model() -> String {
    "BiLSTM".to_string()
}

fn default_env_var_admin_key() -> String {
    "HATESCAN_ADMIN_KEY".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            history_page_size: default_history_page_size(),
            recent_limit: default_recent_limit(),
            featured_model: default_featured_model(),
            env_var_admin_key: default_env_var_admin_key(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be greater than zero");
        }
        if self.history_page_size == 0 || self.recent_limit == 0 {
            anyhow::bail!("history_page_size and recent_limit must be greater than zero");
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Read the admin key from the configured environment variable
    pub fn admin_key(&self) -> Result<String> {
        std::env::var(&self.env_var_admin_key)
            .with_context(|| format!("Environment variable {} not found", self.env_var_admin_key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_parsing() {
        let toml_content = r#"
base_url = "http://classifier.internal:8080"
timeout_secs = 3
history_page_size = 50
recent_limit = 5
featured_model = "DistilBERT"
env_var_admin_key = "CLASSIFIER_ADMIN_KEY"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", toml_content).unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();
        assert_eq!(config.base_url, "http://classifier.internal:8080");
        assert_eq!(config.timeout(), Duration::from_secs(3));
        assert_eq!(config.history_page_size, 50);
        assert_eq!(config.recent_limit, 5);
        assert_eq!(config.featured_model, "DistilBERT");
        assert_eq!(config.env_var_admin_key, "CLASSIFIER_ADMIN_KEY");
    }

    #[test]
    fn test_config_defaults() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "# empty").unwrap();

        let config = Config::from_file(temp_file.path()).unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:5000");
        assert_eq!(config.timeout_secs, 10);
        assert_eq!(config.history_page_size, 20);
        assert_eq!(config.recent_limit, 10);
        assert_eq!(config.featured_model, "BiLSTM");
        assert_eq!(config.env_var_admin_key, "HATESCAN_ADMIN_KEY");
    }

    #[test]
    fn test_config_rejects_zero_page_size() {
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "history_page_size = 0").unwrap();

        assert!(Config::from_file(temp_file.path()).is_err());
    }

    #[test]
    fn test_config_missing_file() {
        let result = Config::from_file(Path::new("/nonexistent/hatescan.toml"));
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("Failed to read config file"));
    }

    #[test]
    fn test_admin_key_missing_env_var() {
        let config = Config {
            env_var_admin_key: "HATESCAN_TEST_UNSET_ADMIN_KEY".to_string(),
            ..Config::default()
        };
        let message = format!("{:#}", config.admin_key().unwrap_err());
        assert!(message.contains("HATESCAN_TEST_UNSET_ADMIN_KEY"));
    }
}
