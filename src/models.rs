use crate::error::ClientError;
use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Classification outcome. The integer codes are fixed across the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Label {
    Normal,
    Offensive,
    Hate,
}

impl Label {
    pub const ALL: [Label; 3] = [Label::Normal, Label::Offensive, Label::Hate];

    pub fn code(self) -> u8 {
        match self {
            Label::Normal => 0,
            Label::Offensive => 1,
            Label::Hate => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Label::Normal),
            1 => Some(Label::Offensive),
            2 => Some(Label::Hate),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Normal => "Normal",
            Label::Offensive => "Offensive",
            Label::Hate => "Hate",
        }
    }

    /// Wording used on the result card
    pub fn headline(self) -> &'static str {
        match self {
            Label::Hate => "Hate Speech",
            other => other.as_str(),
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl TryFrom<u8> for Label {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Label::from_code(code).ok_or_else(|| format!("unknown label code {}", code))
    }
}

impl From<Label> for u8 {
    fn from(label: Label) -> Self {
        label.code()
    }
}

impl FromStr for Label {
    type Err = String;

    /// Accepts the integer code or the label name in any case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<u8>() {
            return Label::try_from(code);
        }
        match trimmed.to_ascii_lowercase().as_str() {
            "normal" => Ok(Label::Normal),
            "offensive" => Ok(Label::Offensive),
            "hate" | "hate speech" => Ok(Label::Hate),
            _ => Err(format!("unknown label '{}'", trimmed)),
        }
    }
}

/// Body of `POST /predict`
#[derive(Debug, Clone, Serialize)]
pub struct PredictRequest<'a> {
    pub text: &'a str,
}

/// Response of `POST /predict`
#[derive(Debug, Clone, Deserialize)]
pub struct PredictResponse {
    pub label: Label,
    pub confidence: f64,
    pub language: String,
    pub latency_ms: u64,
}

/// Body of `POST /feedback`
#[derive(Debug, Clone, Serialize)]
pub struct FeedbackRequest<'a> {
    pub text: &'a str,
    pub language: &'a str,
    pub correct_label: Label,
}

/// Outcome of the most recent successful classification
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub label: Label,
    pub confidence: f64,
    pub language: String,
    pub latency_ms: u64,
    /// UI flag: true right after classification, false once closed
    pub expanded: bool,
}

impl From<PredictResponse> for PredictionResult {
    fn from(response: PredictResponse) -> Self {
        Self {
            label: response.label,
            confidence: response.confidence,
            language: response.language,
            latency_ms: response.latency_ms,
            expanded: true,
        }
    }
}

/// A past prediction as listed by the history store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRow {
    pub text: String,
    #[serde(deserialize_with = "label_code_or_name")]
    pub result: Label,
    /// Confidence in [0, 1]
    #[serde(deserialize_with = "score_number_or_percent")]
    pub score: f64,
    #[serde(deserialize_with = "millis_number_or_text")]
    pub latency_ms: u64,
    pub created_at: String,
}

/// Response of `GET /history`
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryResponse {
    #[serde(default)]
    pub data: Vec<HistoryRow>,
    #[serde(default)]
    pub pages: u32,
}

/// One page of history, replaced wholesale on every fetch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPage {
    pub rows: Vec<HistoryRow>,
    pub current_page: u32,
    pub total_pages: u32,
}

impl HistoryPage {
    /// Build the page for `page`. An empty store reports zero pages and is
    /// shown as a single empty page; a page past the last one is refused so
    /// that `1 <= current_page <= total_pages` holds.
    pub fn from_response(response: HistoryResponse, page: u32) -> Result<Self, ClientError> {
        let total_pages = response.pages.max(1);
        if page == 0 || page > total_pages {
            return Err(ClientError::Validation(format!(
                "page {} is out of range, history has {} page(s)",
                page, total_pages
            )));
        }
        Ok(Self {
            rows: response.data,
            current_page: page,
            total_pages,
        })
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    pub fn has_prev(&self) -> bool {
        self.current_page > 1
    }
}

/// Per-label counts. Accepts both the lowercase keys of `class_counts` and the
/// capitalized keys of the language/class matrix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    #[serde(default, alias = "Normal")]
    pub normal: u64,
    #[serde(default, alias = "Offensive")]
    pub offensive: u64,
    #[serde(default, alias = "Hate")]
    pub hate: u64,
}

impl ClassCounts {
    pub fn get(&self, label: Label) -> u64 {
        match label {
            Label::Normal => self.normal,
            Label::Offensive => self.offensive,
            Label::Hate => self.hate,
        }
    }

    pub fn increment(&mut self, label: Label) {
        match label {
            Label::Normal => self.normal += 1,
            Label::Offensive => self.offensive += 1,
            Label::Hate => self.hate += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.normal + self.offensive + self.hate
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub date: String,
    pub count: u64,
}

/// Wire shape of the trend: parallel `dates` and `counts` arrays
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrendWire {
    #[serde(default)]
    pub dates: Vec<String>,
    #[serde(default)]
    pub counts: Vec<u64>,
}

/// Chronological prediction counts
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "TrendWire")]
pub struct Trend(pub Vec<TrendPoint>);

impl TryFrom<TrendWire> for Trend {
    type Error = String;

    fn try_from(wire: TrendWire) -> Result<Self, Self::Error> {
        if wire.dates.len() != wire.counts.len() {
            return Err(format!(
                "trend has {} dates but {} counts",
                wire.dates.len(),
                wire.counts.len()
            ));
        }
        let points = wire
            .dates
            .into_iter()
            .zip(wire.counts)
            .map(|(date, count)| TrendPoint { date, count })
            .collect();
        Ok(Trend(points))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    #[serde(default)]
    pub accuracy: f64,
    #[serde(default)]
    pub f1: f64,
    #[serde(default, deserialize_with = "millis_number_or_text")]
    pub latency: u64,
}

/// Model metrics keyed by model name, kept in the order the server sent them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelTable(pub Vec<(String, ModelMetrics)>);

impl ModelTable {
    pub fn get(&self, name: &str) -> Option<&ModelMetrics> {
        self.0
            .iter()
            .find(|(model, _)| model == name)
            .map(|(_, metrics)| metrics)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelMetrics)> {
        self.0.iter().map(|(name, metrics)| (name.as_str(), metrics))
    }
}

impl Serialize for ModelTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, metrics) in &self.0 {
            map.serialize_entry(name, metrics)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ModelTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct OrderedModels;

        impl<'de> Visitor<'de> for OrderedModels {
            type Value = ModelTable;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of model name to metrics")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, metrics)) = access.next_entry::<String, ModelMetrics>()? {
                    entries.push((name, metrics));
                }
                Ok(ModelTable(entries))
            }
        }

        deserializer.deserialize_map(OrderedModels)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LanguageStats {
    #[serde(rename = "language_distribution", default)]
    pub distribution: BTreeMap<String, u64>,
    #[serde(rename = "language_class_matrix", default)]
    pub class_by_language: BTreeMap<String, ClassCounts>,
}

/// Counts of (predicted, actual) label pairs derived from feedback.
/// Absent cells read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfusionMatrix {
    cells: HashMap<(Label, Label), u64>,
}

impl ConfusionMatrix {
    pub fn get(&self, predicted: Label, actual: Label) -> u64 {
        self.cells.get(&(predicted, actual)).copied().unwrap_or(0)
    }

    pub fn set(&mut self, predicted: Label, actual: Label, count: u64) {
        self.cells.insert((predicted, actual), count);
    }

    pub fn is_empty(&self) -> bool {
        self.cells.values().all(|&count| count == 0)
    }
}

/// Wire shape: `{ "<predicted>": { "<actual>": count } }`
type ConfusionWire = BTreeMap<String, BTreeMap<String, u64>>;

impl<'de> Deserialize<'de> for ConfusionMatrix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = ConfusionWire::deserialize(deserializer)?;
        let mut matrix = ConfusionMatrix::default();
        for (predicted, row) in wire {
            let predicted: Label = predicted.parse().map_err(de::Error::custom)?;
            for (actual, count) in row {
                let actual: Label = actual.parse().map_err(de::Error::custom)?;
                matrix.set(predicted, actual, count);
            }
        }
        Ok(matrix)
    }
}

impl Serialize for ConfusionMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut wire = ConfusionWire::new();
        for (&(predicted, actual), &count) in &self.cells {
            wire.entry(predicted.code().to_string())
                .or_default()
                .insert(actual.code().to_string(), count);
        }
        wire.serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MisclassifiedSample {
    pub text: String,
    pub language: String,
    pub predicted: Label,
    pub actual: Label,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorAnalysis {
    #[serde(default)]
    pub confusion: ConfusionMatrix,
    #[serde(default)]
    pub samples: Vec<MisclassifiedSample>,
}

/// Read-only snapshot returned by `GET /analytics`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsSummary {
    #[serde(default)]
    pub total_predictions: u64,
    #[serde(default)]
    pub class_counts: ClassCounts,
    #[serde(default)]
    pub trend: Trend,
    #[serde(default)]
    pub models: ModelTable,
    #[serde(default)]
    pub language: LanguageStats,
    #[serde(default)]
    pub error_analysis: ErrorAnalysis,
}

impl Serialize for Trend {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = TrendWire {
            dates: self.0.iter().map(|p| p.date.clone()).collect(),
            counts: self.0.iter().map(|p| p.count).collect(),
        };
        wire.serialize(serializer)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrText {
    Number(f64),
    Text(String),
}

fn label_code_or_name<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Label, D::Error> {
    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(code) if code.fract() == 0.0 && (0.0..=255.0).contains(&code) => {
            Label::try_from(code as u8).map_err(de::Error::custom)
        }
        NumberOrText::Number(code) => Err(de::Error::custom(format!("unknown label code {}", code))),
        NumberOrText::Text(name) => name.parse().map_err(de::Error::custom),
    }
}

/// Scores arrive either as a fraction or pre-formatted like `"87.0%"`
fn score_number_or_percent<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let score = match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(score) => score,
        NumberOrText::Text(text) => {
            let text = text.trim();
            match text.strip_suffix('%') {
                Some(percent) => percent.trim().parse::<f64>().map(|p| p / 100.0),
                None => text.parse::<f64>(),
            }
            .map_err(|_| de::Error::custom(format!("invalid score '{}'", text)))?
        }
    };
    if !score.is_finite() {
        return Err(de::Error::custom("score is not a finite number"));
    }
    Ok(score)
}

/// Latencies arrive either as a number or pre-formatted like `"42 ms"`
fn millis_number_or_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let millis = match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(millis) => millis,
        NumberOrText::Text(text) => text
            .trim()
            .trim_end_matches("ms")
            .trim()
            .parse::<f64>()
            .map_err(|_| de::Error::custom(format!("invalid latency '{}'", text)))?,
    };
    if !millis.is_finite() || millis < 0.0 {
        return Err(de::Error::custom(format!("invalid latency {}", millis)));
    }
    Ok(millis.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_label_codes_are_bijective() {
        for label in Label::ALL {
            assert_eq!(Label::from_code(label.code()), Some(label));
            let encoded = serde_json::to_value(label).unwrap();
            assert_eq!(encoded, json!(label.code()));
            let decoded: Label = serde_json::from_value(encoded).unwrap();
            assert_eq!(decoded, label);
        }
        assert_eq!(Label::from_code(3), None);
        assert!(serde_json::from_value::<Label>(json!(7)).is_err());
    }

    #[test]
    fn test_label_from_str() {
        assert_eq!("0".parse::<Label>().unwrap(), Label::Normal);
        assert_eq!("offensive".parse::<Label>().unwrap(), Label::Offensive);
        assert_eq!(" HATE ".parse::<Label>().unwrap(), Label::Hate);
        assert!("spam".parse::<Label>().is_err());
        assert!("9".parse::<Label>().is_err());
    }

    #[test]
    fn test_predict_response_becomes_expanded_result() {
        let response: PredictResponse = serde_json::from_value(json!({
            "label": 1,
            "confidence": 0.87,
            "language": "en",
            "latency_ms": 42,
            "prediction_id": 17
        }))
        .unwrap();
        let result = PredictionResult::from(response);
        assert_eq!(result.label, Label::Offensive);
        assert_eq!(result.language, "en");
        assert_eq!(result.latency_ms, 42);
        assert!(result.expanded);
    }

    #[test]
    fn test_feedback_request_wire_format() {
        let body = FeedbackRequest {
            text: "you are stupid",
            language: "en",
            correct_label: Label::Hate,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({"text": "you are stupid", "language": "en", "correct_label": 2})
        );
    }

    #[test]
    fn test_history_row_accepts_preformatted_fields() {
        let row: HistoryRow = serde_json::from_value(json!({
            "text": "hello",
            "result": "Hate",
            "predicted_label": 2,
            "score": "87.5%",
            "latency_ms": "42 ms",
            "created_at": "2026-01-02 10:00:00"
        }))
        .unwrap();
        assert_eq!(row.result, Label::Hate);
        assert!((row.score - 0.875).abs() < 1e-9);
        assert_eq!(row.latency_ms, 42);
    }

    #[test]
    fn test_history_row_accepts_numeric_fields() {
        let row: HistoryRow = serde_json::from_value(json!({
            "text": "hello",
            "result": 0,
            "score": 0.5,
            "latency_ms": 12,
            "created_at": "2026-01-02"
        }))
        .unwrap();
        assert_eq!(row.result, Label::Normal);
        assert_eq!(row.score, 0.5);
        assert_eq!(row.latency_ms, 12);
    }

    #[test]
    fn test_history_row_rejects_garbage_score() {
        let parsed = serde_json::from_value::<HistoryRow>(json!({
            "text": "hello",
            "result": "Normal",
            "score": "high",
            "latency_ms": 1,
            "created_at": ""
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_history_page_clamps_empty_store() {
        let response = HistoryResponse { data: vec![], pages: 0 };
        let page = HistoryPage::from_response(response, 1).unwrap();
        assert_eq!(page.current_page, 1);
        assert_eq!(page.total_pages, 1);
        assert!(!page.has_next());
        assert!(!page.has_prev());
    }

    #[test]
    fn test_history_page_past_the_end_is_refused() {
        let response = HistoryResponse { data: vec![], pages: 3 };
        let err = HistoryPage::from_response(response, 99).unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));

        let response = HistoryResponse { data: vec![], pages: 0 };
        assert!(HistoryPage::from_response(response, 2).is_err());

        let response = HistoryResponse { data: vec![], pages: 3 };
        let page = HistoryPage::from_response(response, 3).unwrap();
        assert_eq!(page.total_pages, 3);
        assert!(!page.has_next());
    }

    #[test]
    fn test_analytics_summary_parsing() {
        let summary: AnalyticsSummary = serde_json::from_value(json!({
            "total_predictions": 12,
            "class_counts": {"normal": 6, "offensive": 4, "hate": 2},
            "trend": {"dates": ["2026-01-01", "2026-01-02"], "counts": [5, 7]},
            "models": {
                "BiLSTM": {"f1": 0.87, "accuracy": 0.89, "latency": 120},
                "Baseline": {"f1": 0.78, "accuracy": 0.80, "latency": 45.4},
                "DistilBERT": {"f1": 0.90, "accuracy": 0.91, "latency": 850}
            },
            "language": {
                "language_distribution": {"en": 8, "hi-en": 4},
                "language_class_matrix": {"en": {"Normal": 5, "Offensive": 3}}
            },
            "error_analysis": {
                "confusion": {"1": {"2": 3, "1": 1}},
                "samples": [{"text": "x...", "language": "en", "predicted": 1, "actual": 2}]
            }
        }))
        .unwrap();

        assert_eq!(summary.total_predictions, 12);
        assert_eq!(summary.class_counts.get(Label::Offensive), 4);
        assert_eq!(summary.trend.0.len(), 2);
        assert_eq!(summary.trend.0[1].count, 7);
        let names: Vec<&str> = summary.models.iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["BiLSTM", "Baseline", "DistilBERT"]);
        assert_eq!(summary.models.get("Baseline").unwrap().latency, 45);
        assert_eq!(summary.language.class_by_language["en"].hate, 0);
        assert_eq!(summary.error_analysis.confusion.get(Label::Offensive, Label::Hate), 3);
        assert_eq!(summary.error_analysis.confusion.get(Label::Hate, Label::Normal), 0);
        assert_eq!(summary.error_analysis.samples[0].actual, Label::Hate);
    }

    #[test]
    fn test_analytics_summary_defaults_missing_sections() {
        let summary: AnalyticsSummary = serde_json::from_value(json!({
            "total_predictions": 0
        }))
        .unwrap();
        assert!(summary.trend.0.is_empty());
        assert!(summary.models.0.is_empty());
        assert!(summary.error_analysis.confusion.is_empty());
    }

    #[test]
    fn test_trend_length_mismatch_is_rejected() {
        let parsed = serde_json::from_value::<AnalyticsSummary>(json!({
            "trend": {"dates": ["2026-01-01"], "counts": []}
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_confusion_matrix_serializes_back_to_wire_shape() {
        let mut matrix = ConfusionMatrix::default();
        matrix.set(Label::Offensive, Label::Hate, 2);
        assert_eq!(
            serde_json::to_value(&matrix).unwrap(),
            json!({"1": {"2": 2}})
        );
    }
}
