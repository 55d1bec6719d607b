use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

mod analytics;
mod client;
mod config;
mod controller;
mod dashboard;
mod error;
mod events;
mod history;
mod models;
mod output;
mod session;

use crate::analytics::AnalyticsViewModel;
use crate::client::DashboardDataClient;
use crate::config::Config;
use crate::dashboard::Dashboard;
use crate::history::HistoryViewModel;
use crate::models::Label;
use crate::output::OutputFormat;

/// Hate speech classifier dashboard - classify text, correct predictions and browse analytics
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the service base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Output format: plain or json
    #[arg(short, long, default_value = "plain", global = true)]
    output: OutputFormat,

    /// Verbose output - log every request
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify a piece of text
    Classify { text: String },
    /// Record the correct label for a text
    Feedback {
        #[arg(long)]
        text: String,
        #[arg(long, default_value = "en")]
        language: String,
        /// normal, offensive, hate or 0-2
        #[arg(long)]
        label: Label,
    },
    /// Show one page of prediction history
    History {
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Label breakdown of the most recent predictions
    Recent,
    /// Show the analytics dashboard
    Analytics,
    /// Check that the service is up
    Status,
    /// Interactive session with live-refreshing views
    Interactive,
    /// Dataset and training administration
    #[command(subcommand)]
    Admin(AdminCommand),
}

#[derive(Subcommand, Debug)]
enum AdminCommand {
    /// Upload a labelled CSV dataset
    Upload { csv: PathBuf },
    /// Retrain the models
    Retrain,
}

fn init_logging(verbose: bool) {
    let fallback = if verbose { "hatescan=debug" } else { "hatescan=warn" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(base_url) = &args.base_url {
        config.base_url = base_url.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = load_config(&args)?;
    let client = DashboardDataClient::from_config(&config).context("Failed to build HTTP client")?;
    let format = args.output;

    match args.command {
        Command::Classify { text } => {
            let result = client.classify(&text).await?;
            output::print(&result, format, output::render_prediction);
        }
        Command::Feedback {
            text,
            language,
            label,
        } => {
            client.submit_feedback(&text, &language, label).await?;
            println!("{}", controller::FEEDBACK_CONFIRMATION);
        }
        Command::History { page } => {
            let mut history = HistoryViewModel::new(config.history_page_size);
            history
                .load(&client, page)
                .await
                .context("Failed to load history")?;
            output::print(&history.page(), format, |_| output::render_history(&history));
        }
        Command::Recent => {
            let mut history = HistoryViewModel::new(config.recent_limit);
            history
                .load(&client, 1)
                .await
                .context("Failed to load recent predictions")?;
            output::print(&history.class_breakdown(), format, output::render_breakdown);
        }
        Command::Analytics => {
            let mut view = AnalyticsViewModel::new();
            view.refresh(&client).await;
            match view.summary() {
                Some(summary) => output::print(summary, format, |s| {
                    output::render_summary(s, &config.featured_model)
                }),
                None => anyhow::bail!(
                    "Failed to load analytics: {}",
                    view.last_error()
                        .map(|e| e.to_string())
                        .unwrap_or_default()
                ),
            }
        }
        Command::Status => {
            let status = client.health().await?;
            println!("{}: {}", client.base_url(), status);
        }
        Command::Interactive => {
            let mut dashboard = Dashboard::new(client, config.history_page_size);
            session::run(&mut dashboard, &config.featured_model).await?;
        }
        Command::Admin(admin) => {
            let key = config.admin_key()?;
            let status = match admin {
                AdminCommand::Upload { csv } => client.upload_dataset(&csv, &key).await?,
                AdminCommand::Retrain => client.retrain(&key).await?,
            };
            println!("{}", status);
        }
    }

    Ok(())
}
