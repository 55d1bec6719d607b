use crate::client::DashboardDataClient;
use crate::error::ClientError;
use crate::events::DashboardEvent;
use crate::models::{AnalyticsSummary, ClassCounts, Label, MisclassifiedSample, TrendPoint};
use serde::Serialize;
use tracing::{debug, warn};

/// Languages charted on the dashboard, in display order
pub const CHARTED_LANGUAGES: [(&str, &str); 3] =
    [("en", "English"), ("hi", "Hindi"), ("hi-en", "Hinglish")];

/// Misclassified samples shown in the preview table
pub const SAMPLE_PREVIEW_LEN: usize = 3;

/// Handle for one analytics fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
}

/// Holds the latest analytics snapshot.
///
/// Presentation data is derived from the snapshot through the free functions
/// below on every render; nothing derived is stored.
#[derive(Debug, Default)]
pub struct AnalyticsViewModel {
    summary: Option<AnalyticsSummary>,
    loading: bool,
    stale: bool,
    last_error: Option<ClientError>,
    generation: u64,
}

impl AnalyticsViewModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self) -> Option<&AnalyticsSummary> {
        self.summary.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn last_error(&self) -> Option<&ClientError> {
        self.last_error.as_ref()
    }

    /// Predictions move the counts; feedback moves the error analysis
    pub fn wants_refresh(event: &DashboardEvent) -> bool {
        matches!(
            event,
            DashboardEvent::PredictionCreated { .. } | DashboardEvent::FeedbackRecorded { .. }
        )
    }

    /// Start a fetch, superseding any fetch in flight
    pub fn begin_refresh(&mut self) -> FetchTicket {
        self.generation += 1;
        self.loading = true;
        FetchTicket {
            generation: self.generation,
        }
    }

    /// Apply a fetch result. Returns false if a newer fetch superseded it.
    pub fn complete_refresh(
        &mut self,
        ticket: FetchTicket,
        outcome: Result<AnalyticsSummary, ClientError>,
    ) -> bool {
        if ticket.generation != self.generation {
            debug!("discarding superseded analytics response");
            return false;
        }
        self.loading = false;

        match outcome {
            Ok(summary) => {
                self.summary = Some(summary);
                self.stale = false;
                self.last_error = None;
            }
            Err(err) => {
                warn!(error = %err, "analytics fetch failed, keeping last snapshot");
                self.stale = true;
                self.last_error = Some(err);
            }
        }
        true
    }

    pub async fn refresh(&mut self, client: &DashboardDataClient) -> bool {
        let ticket = self.begin_refresh();
        let outcome = client.fetch_analytics().await;
        self.complete_refresh(ticket, outcome)
    }
}

/// One bar of the model comparison chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRow {
    pub model: String,
    /// Accuracy as a whole percentage
    pub accuracy: u32,
    pub latency: u64,
}

/// Headline figures for one model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelKpi {
    pub model: String,
    pub accuracy_percent: u32,
    pub f1: f64,
    pub latency: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageSlice {
    pub code: &'static str,
    pub name: &'static str,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageClassRow {
    pub language: String,
    pub counts: ClassCounts,
}

fn percent(fraction: f64) -> u32 {
    (fraction * 100.0).round().clamp(0.0, 100.0) as u32
}

/// Normal, Offensive, Hate counts in that order
pub fn class_distribution(summary: &AnalyticsSummary) -> [(Label, u64); 3] {
    Label::ALL.map(|label| (label, summary.class_counts.get(label)))
}

pub fn trend_series(summary: &AnalyticsSummary) -> &[TrendPoint] {
    &summary.trend.0
}

/// Model rows in the order the service listed them
pub fn model_rows(summary: &AnalyticsSummary) -> Vec<ModelRow> {
    summary
        .models
        .iter()
        .map(|(name, metrics)| ModelRow {
            model: name.to_string(),
            accuracy: percent(metrics.accuracy),
            latency: metrics.latency,
        })
        .collect()
}

/// KPI card for `model`; zeros when the service does not report it
pub fn model_kpi(summary: &AnalyticsSummary, model: &str) -> ModelKpi {
    match summary.models.get(model) {
        Some(metrics) => ModelKpi {
            model: model.to_string(),
            accuracy_percent: percent(metrics.accuracy),
            f1: metrics.f1,
            latency: Some(metrics.latency),
        },
        None => ModelKpi {
            model: model.to_string(),
            accuracy_percent: 0,
            f1: 0.0,
            latency: None,
        },
    }
}

/// English/Hindi/Hinglish counts; absent codes count as zero
pub fn language_split(summary: &AnalyticsSummary) -> [LanguageSlice; 3] {
    CHARTED_LANGUAGES.map(|(code, name)| LanguageSlice {
        code,
        name,
        count: summary
            .language
            .distribution
            .get(code)
            .copied()
            .unwrap_or(0),
    })
}

pub fn language_class_rows(summary: &AnalyticsSummary) -> Vec<LanguageClassRow> {
    summary
        .language
        .class_by_language
        .iter()
        .map(|(language, counts)| LanguageClassRow {
            language: language.clone(),
            counts: *counts,
        })
        .collect()
}

/// Confusion count for (predicted, actual); zero when the pair is absent
pub fn confusion_cell(summary: &AnalyticsSummary, predicted: Label, actual: Label) -> u64 {
    summary.error_analysis.confusion.get(predicted, actual)
}

/// First few misclassified samples in server order
pub fn misclassified_preview(summary: &AnalyticsSummary) -> &[MisclassifiedSample] {
    let samples = &summary.error_analysis.samples;
    &samples[..samples.len().min(SAMPLE_PREVIEW_LEN)]
}
