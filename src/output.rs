use crate::analytics::{self, AnalyticsViewModel};
use crate::controller::{InteractionState, PredictionInteractionController};
use crate::history::HistoryViewModel;
use crate::models::{AnalyticsSummary, ClassCounts, HistoryRow, Label, PredictionResult};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Longest history text shown before truncation
const HISTORY_TEXT_WIDTH: usize = 60;

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    Plain,
    Json,
}

/// Print a value in the requested format, using `plain` for text output
pub fn print<T: Serialize>(value: &T, format: OutputFormat, plain: impl FnOnce(&T) -> String) {
    match format {
        OutputFormat::Plain => print!("{}", plain(value)),
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error serializing output to JSON: {}", e),
        },
    }
}

pub fn format_confidence(confidence: f64) -> String {
    format!("{:.1}%", confidence * 100.0)
}

pub fn format_latency(latency_ms: u64) -> String {
    format!("{} ms", latency_ms)
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let head: String = text.chars().take(width).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// The result card
pub fn render_prediction(result: &PredictionResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Result");
    if !result.expanded {
        let _ = writeln!(out, "  (collapsed)");
        return out;
    }
    let _ = writeln!(out, "  {}", result.label.headline());
    let _ = writeln!(out, "  Confidence: {}", format_confidence(result.confidence));
    let _ = writeln!(out, "  Language: {}", result.language);
    let _ = writeln!(out, "  Latency: {}", format_latency(result.latency_ms));
    out
}

/// Prediction panel with whatever status the controller is surfacing
pub fn render_controller(controller: &PredictionInteractionController) -> String {
    let mut out = String::new();
    if controller.is_loading() {
        let _ = writeln!(out, "Analyzing...");
    } else {
        match controller.result() {
            Some(result) if controller.state() != InteractionState::Idle => {
                out.push_str(&render_prediction(&result.prediction))
            }
            _ => {
                let _ = writeln!(out, "Result");
                let _ = writeln!(out, "  (nothing analyzed yet)");
            }
        }
    }

    if controller.is_feedback_pending() {
        let _ = writeln!(out, "Sending feedback...");
    } else if controller.state() == InteractionState::FeedbackOpen {
        let _ = writeln!(out, "Is the prediction correct? Select the correct label:");
        let _ = writeln!(out, "  label normal | label offensive | label hate | cancel");
    }
    if let Some(confirmation) = controller.confirmation() {
        let _ = writeln!(out, "{}", confirmation);
    }
    if let Some(err) = controller.last_error() {
        let _ = writeln!(out, "Error: {}", err);
    }
    out
}

fn render_rows(out: &mut String, rows: &[HistoryRow]) {
    let _ = writeln!(
        out,
        "{:<63} {:<10} {:<10} {:<8} {}",
        "Text", "Result", "Confidence", "Latency", "Timestamp"
    );
    let _ = writeln!(out, "{}", "-".repeat(110));
    for row in rows {
        let _ = writeln!(
            out,
            "{:<63} {:<10} {:<10} {:<8} {}",
            truncate(&row.text, HISTORY_TEXT_WIDTH),
            row.result,
            format_confidence(row.score),
            format_latency(row.latency_ms),
            row.created_at
        );
    }
}

/// Prediction history table with pagination controls
pub fn render_history(history: &HistoryViewModel) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Prediction History");
    if history.is_loading() {
        let _ = writeln!(out, "Loading...");
    }
    if history.is_stale() {
        let _ = writeln!(out, "(showing stale data)");
    }
    if let Some(err) = history.last_error() {
        let _ = writeln!(out, "Error: {}", err);
    }

    if history.page().is_none() {
        return out;
    }
    if history.rows().is_empty() {
        let _ = writeln!(out, "No history found.");
        return out;
    }

    render_rows(&mut out, history.rows());
    if history.total_pages() > 1 {
        let prev = if history.has_prev() { "[prev]" } else { " prev " };
        let next = if history.has_next() { "[next]" } else { " next " };
        let _ = writeln!(
            out,
            "{} Page {} of {} {}",
            prev,
            history.current_page(),
            history.total_pages(),
            next
        );
    }
    out
}

/// Counts behind the recent-predictions donut
pub fn render_breakdown(counts: &ClassCounts) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Recent Predictions");
    for label in Label::ALL {
        let _ = writeln!(out, "  {:<10} {}", label, counts.get(label));
    }
    let _ = writeln!(out, "  {:<10} {}", "Total", counts.total());
    out
}

fn section(out: &mut String, title: &str) {
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", title);
    let _ = writeln!(out, "{}", "-".repeat(title.len()));
}

/// Every analytics panel, derived from the snapshot on each call
pub fn render_summary(summary: &AnalyticsSummary, featured_model: &str) -> String {
    let mut out = String::new();
    let kpi = analytics::model_kpi(summary, featured_model);
    let latency = kpi
        .latency
        .map(format_latency)
        .unwrap_or_else(|| "n/a".to_string());

    let _ = writeln!(out, "Analytics Dashboard");
    let _ = writeln!(out, "  Total Predictions: {}", summary.total_predictions);
    let _ = writeln!(out, "  Accuracy ({}): {}%", kpi.model, kpi.accuracy_percent);
    let _ = writeln!(out, "  F1 Score: {:.2}", kpi.f1);
    let _ = writeln!(out, "  Latency: {}", latency);

    section(&mut out, "Class Distribution");
    for (label, count) in analytics::class_distribution(summary) {
        let _ = writeln!(out, "  {:<10} {}", label, count);
    }

    section(&mut out, "Prediction Trend");
    let trend = analytics::trend_series(summary);
    if trend.is_empty() {
        let _ = writeln!(out, "  No predictions in range.");
    }
    for point in trend {
        let _ = writeln!(out, "  {:<12} {}", point.date, point.count);
    }

    section(&mut out, "Model Comparison");
    let _ = writeln!(out, "  {:<15} {:<9} {}", "Model", "Accuracy", "Latency");
    for row in analytics::model_rows(summary) {
        let _ = writeln!(
            out,
            "  {:<15} {:<9} {}",
            row.model,
            format!("{}%", row.accuracy),
            format_latency(row.latency)
        );
    }

    section(&mut out, "Language Distribution");
    for slice in analytics::language_split(summary) {
        let _ = writeln!(out, "  {:<10} {}", slice.name, slice.count);
    }

    section(&mut out, "Language x Class");
    let _ = writeln!(out, "  {:<8} {:<8} {:<10} {}", "Lang", "Normal", "Offensive", "Hate");
    for row in analytics::language_class_rows(summary) {
        let _ = writeln!(
            out,
            "  {:<8} {:<8} {:<10} {}",
            row.language, row.counts.normal, row.counts.offensive, row.counts.hate
        );
    }

    section(&mut out, "Confusion Matrix (rows: actual, columns: predicted)");
    if summary.error_analysis.confusion.is_empty() {
        let _ = writeln!(out, "  No feedback yet.");
    }
    let _ = writeln!(out, "  {:<10} {:<8} {:<10} {}", "", "Normal", "Offensive", "Hate");
    for actual in Label::ALL {
        let _ = writeln!(
            out,
            "  {:<10} {:<8} {:<10} {}",
            actual,
            analytics::confusion_cell(summary, Label::Normal, actual),
            analytics::confusion_cell(summary, Label::Offensive, actual),
            analytics::confusion_cell(summary, Label::Hate, actual)
        );
    }

    section(&mut out, "Misclassified Samples");
    let preview = analytics::misclassified_preview(summary);
    if preview.is_empty() {
        let _ = writeln!(out, "  None yet.");
    }
    for sample in preview {
        let _ = writeln!(
            out,
            "  [{}] predicted {} / actual {}: {}",
            sample.language, sample.predicted, sample.actual, sample.text
        );
    }
    out
}

pub fn render_analytics(view: &AnalyticsViewModel, featured_model: &str) -> String {
    let mut out = String::new();
    if view.is_stale() {
        let _ = writeln!(out, "(showing stale data)");
    }
    if let Some(err) = view.last_error() {
        let _ = writeln!(out, "Error: {}", err);
    }
    match view.summary() {
        Some(summary) => out.push_str(&render_summary(summary, featured_model)),
        None if view.is_loading() => {
            let _ = writeln!(out, "Loading analytics...");
        }
        None => {
            let _ = writeln!(out, "Failed to load analytics.");
        }
    }
    out
}
