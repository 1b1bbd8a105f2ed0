//! Defensive parsing of model output into a structured insight.
//!
//! The model is asked for a single JSON object but routinely wraps it in
//! Markdown fences or a sentence of prose. Anything that cannot be turned
//! into `{report, recommendations}` is an [`InsightParseError`]; there is no
//! partial recovery of a malformed payload.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::category::RecommendationCategory;
use crate::insights::{DEFAULT_RECOMMENDATION_TITLE, Priority, ReportData, Scorecard};

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```(?:json)?[ \t]*\r?\n?(.*?)```").expect("fence pattern is valid")
});

static OPENING_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^```(?:json)?[ \t]*\r?\n?").expect("fence pattern is valid")
});

/// Unparsed model output. Only [`parse_insight`] turns it into structured data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInsight(String);

impl RawInsight {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InsightParseError {
    #[error("model response contained no JSON object")]
    NoJsonObject,
    #[error("model response is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("model response is missing required key `{0}`")]
    MissingKey(&'static str),
    #[error("model response field `{field}` is invalid: {reason}")]
    InvalidField { field: String, reason: String },
}

/// A recommendation exactly as the model described it, after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRecommendation {
    pub category: String,
    pub title: Option<String>,
    pub advice: String,
    pub priority: Option<Priority>,
}

impl ModelRecommendation {
    pub fn normalized_category(&self) -> RecommendationCategory {
        RecommendationCategory::normalize(&self.category)
    }

    pub fn title_or_default(&self) -> &str {
        self.title.as_deref().unwrap_or(DEFAULT_RECOMMENDATION_TITLE)
    }

    pub fn priority_or_default(&self) -> Priority {
        self.priority.unwrap_or(Priority::Medium)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedInsight {
    pub report: ReportData,
    pub recommendations: Vec<ModelRecommendation>,
}

/// Parse raw model output into a validated insight.
pub fn parse_insight(raw: &RawInsight) -> Result<ParsedInsight, InsightParseError> {
    let root = extract_json_object(raw.as_str())?;

    let report = match root.get("report") {
        None | Some(Value::Null) => return Err(InsightParseError::MissingKey("report")),
        Some(Value::Object(report)) => parse_report(report),
        Some(_) => {
            return Err(invalid("report", "expected an object"));
        }
    };

    let items = match root.get("recommendations") {
        None | Some(Value::Null) => return Err(InsightParseError::MissingKey("recommendations")),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(invalid("recommendations", "expected an array")),
    };

    let recommendations = items
        .iter()
        .enumerate()
        .map(|(index, item)| parse_recommendation(index, item))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ParsedInsight {
        report,
        recommendations,
    })
}

/// Find the top-level object. The untouched text is tried first, then a
/// fence wrapping the whole response, then fenced blocks inside prose, then
/// the outermost brace span.
fn extract_json_object(text: &str) -> Result<Map<String, Value>, InsightParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(InsightParseError::NoJsonObject);
    }

    let candidates = std::iter::once(trimmed)
        .chain(strip_outer_fence(trimmed))
        .chain(
            FENCED_BLOCK
                .captures_iter(trimmed)
                .filter_map(|caps| caps.get(1))
                .map(|inner| inner.as_str().trim()),
        )
        .chain(outermost_object_span(trimmed));

    let mut first_error = None;
    for candidate in candidates {
        match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(map)) => return Ok(map),
            Ok(_) => {}
            Err(err) if candidate.contains('{') => {
                first_error.get_or_insert_with(|| err.to_string());
            }
            Err(_) => {}
        }
    }

    Err(first_error.map_or(InsightParseError::NoJsonObject, InsightParseError::InvalidJson))
}

/// Remove a fence that opens the response and, if present, the one closing
/// it. An unterminated fence is usually a truncated response.
fn strip_outer_fence(text: &str) -> Option<&str> {
    let fence = OPENING_FENCE.find(text)?;
    let inner = &text[fence.end()..];
    Some(inner.strip_suffix("```").unwrap_or(inner).trim())
}

fn outermost_object_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

fn parse_report(report: &Map<String, Value>) -> ReportData {
    let risk_summary = non_blank_string(report.get("riskSummary"))
        .or_else(|| non_blank_string(report.get("risk_summary")))
        .unwrap_or_default();

    let scorecards = report
        .get("scorecards")
        .and_then(Value::as_array)
        .map(|cards| cards.iter().filter_map(parse_scorecard).collect())
        .unwrap_or_default();

    let extra = report
        .iter()
        .filter(|(key, _)| !matches!(key.as_str(), "riskSummary" | "risk_summary" | "scorecards"))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    ReportData {
        risk_summary,
        scorecards,
        extra,
    }
}

fn parse_scorecard(value: &Value) -> Option<Scorecard> {
    let card = value.as_object()?;
    let score = match card.get("score") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').parse::<f64>().ok(),
        _ => None,
    };
    let details = match card.get("details") {
        Some(Value::String(s)) => Some(s.clone()),
        None | Some(Value::Null) => None,
        Some(other) => Some(other.to_string()),
    };

    Some(Scorecard {
        category: non_blank_string(card.get("category")).unwrap_or_default(),
        score,
        risk_level: non_blank_string(card.get("riskLevel"))
            .or_else(|| non_blank_string(card.get("risk_level"))),
        details,
    })
}

fn parse_recommendation(index: usize, item: &Value) -> Result<ModelRecommendation, InsightParseError> {
    let field = format!("recommendations[{index}]");
    let obj = item
        .as_object()
        .ok_or_else(|| invalid(&field, "expected an object"))?;

    let category = non_blank_string(obj.get("category"))
        .ok_or_else(|| invalid(&format!("{field}.category"), "expected a non-empty string"))?;

    let advice = non_blank_string(obj.get("advice"))
        .or_else(|| non_blank_string(obj.get("description")))
        .ok_or_else(|| {
            invalid(
                &format!("{field}.advice"),
                "expected a non-empty `advice` or `description` string",
            )
        })?;

    Ok(ModelRecommendation {
        category,
        title: non_blank_string(obj.get("title")),
        advice,
        priority: obj
            .get("priority")
            .and_then(Value::as_str)
            .and_then(Priority::parse_label),
    })
}

fn non_blank_string(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

fn invalid(field: &str, reason: &str) -> InsightParseError {
    InsightParseError::InvalidField {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
