use crate::config::Config;
use crate::error::ClientError;
use crate::models::{
    AnalyticsSummary, FeedbackRequest, HistoryPage, HistoryResponse, Label, PredictRequest,
    PredictResponse, PredictionResult,
};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

const ADMIN_KEY_HEADER: &str = "X-ADMIN-KEY";

/// Request layer over the classification service endpoints.
///
/// Every call is a single round trip with no retries. Failures come back as
/// [`ClientError`] and never panic.
#[derive(Debug, Clone)]
pub struct DashboardDataClient {
    base_url: String,
    http: reqwest::Client,
}

impl DashboardDataClient {
    /// Create a client whose requests all expire after `timeout`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::ServiceUnavailable(format!("failed to create HTTP client: {}", e)))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { base_url, http })
    }

    pub fn from_config(config: &Config) -> Result<Self, ClientError> {
        Self::new(&config.base_url, config.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Classify `text`. The returned result is always expanded.
    pub async fn classify(&self, text: &str) -> Result<PredictionResult, ClientError> {
        if text.trim().is_empty() {
            return Err(ClientError::Validation("text is blank".to_string()));
        }

        debug!(chars = text.chars().count(), "classify request");
        let request = self.http.post(self.url("/predict")).json(&PredictRequest { text });
        let response = self.send(request).await?;
        let body: PredictResponse = Self::decode(response).await?;

        if !(0.0..=1.0).contains(&body.confidence) {
            return Err(ClientError::InvalidResponse(format!(
                "confidence {} outside [0, 1]",
                body.confidence
            )));
        }

        Ok(PredictionResult::from(body))
    }

    /// Record a correction for a previously classified text
    pub async fn submit_feedback(
        &self,
        text: &str,
        language: &str,
        correct_label: Label,
    ) -> Result<(), ClientError> {
        debug!(language, label = %correct_label, "feedback request");
        let request = self.http.post(self.url("/feedback")).json(&FeedbackRequest {
            text,
            language,
            correct_label,
        });
        self.send(request).await?;
        Ok(())
    }

    /// Fetch one page of prediction history
    pub async fn fetch_history(&self, page: u32, page_size: u32) -> Result<HistoryPage, ClientError> {
        if page == 0 || page_size == 0 {
            return Err(ClientError::Validation(format!(
                "page {} with size {} is out of range",
                page, page_size
            )));
        }

        debug!(page, page_size, "history request");
        let request = self
            .http
            .get(self.url("/history"))
            .query(&[("page", page), ("limit", page_size)]);
        let response = self.send(request).await?;
        let body: HistoryResponse = Self::decode(response).await?;

        HistoryPage::from_response(body, page)
    }

    /// Fetch the aggregate analytics snapshot
    pub async fn fetch_analytics(&self) -> Result<AnalyticsSummary, ClientError> {
        debug!("analytics request");
        let response = self.send(self.http.get(self.url("/analytics"))).await?;
        Self::decode(response).await
    }

    /// Service status line from the root endpoint
    pub async fn health(&self) -> Result<String, ClientError> {
        let response = self.send(self.http.get(self.url("/"))).await?;
        let body: Value = Self::decode(response).await?;
        match body.get("status").and_then(|s| s.as_str()) {
            Some(status) => Ok(status.to_string()),
            None => Err(ClientError::InvalidResponse("missing status field".to_string())),
        }
    }

    /// Append a labelled CSV to the training dataset
    pub async fn upload_dataset(&self, path: &Path, admin_key: &str) -> Result<String, ClientError> {
        let is_csv = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if !is_csv {
            return Err(ClientError::Validation(format!(
                "{} is not a .csv file",
                path.display()
            )));
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ClientError::Validation(format!("cannot read {}: {}", path.display(), e)))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_else(|| "dataset.csv".to_string());

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("text/csv")
            .map_err(|e| ClientError::Validation(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let request = self
            .http
            .post(self.url("/admin/upload"))
            .header(ADMIN_KEY_HEADER, admin_key)
            .multipart(form);
        let response = self.send(request).await?;
        Self::status_text(response).await
    }

    /// Ask the service to retrain its models
    pub async fn retrain(&self, admin_key: &str) -> Result<String, ClientError> {
        let request = self
            .http
            .post(self.url("/admin/retrain"))
            .header(ADMIN_KEY_HEADER, admin_key);
        let response = self.send(request).await?;
        Self::status_text(response).await
    }

    /// Send a request and turn transport failures and error statuses into
    /// [`ClientError::ServiceUnavailable`]
    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = request.send().await.map_err(|e| {
            warn!(error = %e, "request failed");
            ClientError::from_transport(e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = Self::error_message(&body).unwrap_or_else(|| status.to_string());
        warn!(status = status.as_u16(), %message, "service returned an error");
        Err(ClientError::ServiceUnavailable(format!(
            "HTTP {}: {}",
            status.as_u16(),
            message
        )))
    }

    /// Extract `{"error": "..."}` from an error body
    fn error_message(body: &str) -> Option<String> {
        let parsed: Value = serde_json::from_str(body).ok()?;
        parsed
            .get("error")
            .and_then(|e| e.as_str())
            .map(|e| e.to_string())
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let bytes = response.bytes().await.map_err(ClientError::from_transport)?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::InvalidResponse(e.to_string()))
    }

    /// Admin endpoints answer with free-form JSON; keep it readable
    async fn status_text(response: Response) -> Result<String, ClientError> {
        let body = response.text().await.map_err(ClientError::from_transport)?;
        match serde_json::from_str::<Value>(&body) {
            Ok(parsed) => match parsed.get("status").and_then(|s| s.as_str()) {
                Some(status) => Ok(status.to_string()),
                None => Ok(serde_json::to_string_pretty(&parsed).unwrap_or(body)),
            },
            Err(_) => Ok(body),
        }
    }
}
