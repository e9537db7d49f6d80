//! Evaluation response decoding.
//!
//! The canonical payload is `{ total_score, evaluations: [...] }`. Older
//! service revisions produced other shapes, all accepted here:
//! - `feedback` as one string instead of a line array
//! - `target_sentence` / `improvement_suggestions` field names
//! - only a `criteria_id`, with the category implied by the catalog
//! - a scope name (`"SUMMARY_ONLY"`) sitting in the `category` field
//! - `{ result: "<text>" }` carrying the line-oriented text format
//! - `{ error }` / `{ detail }` error payloads

use serde::Deserialize;
use serde_json::Value;
use storycheck_shared::{
    ApplicabilityScope, CATEGORIES, CategoryInfo, EvaluationResult, Result, StoryCheckError,
    category_for_criteria, lookup_category,
};
use tracing::{debug, warn};

use crate::EvaluationResponse;
use crate::text_format;

/// Priority assumed when neither the payload nor the catalog supplies one.
pub const DEFAULT_PRIORITY: u32 = 3;

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(default, alias = "totalScore")]
    total_score: Option<f64>,
    #[serde(default)]
    evaluations: Option<Vec<RawEvaluation>>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    detail: Option<Value>,
    #[serde(default)]
    result: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawEvaluation {
    #[serde(default)]
    category: Option<String>,
    #[serde(default, alias = "criteriaId")]
    criteria_id: Option<String>,
    #[serde(default)]
    score: Option<Value>,
    #[serde(default)]
    priority: Option<Value>,
    #[serde(
        default,
        alias = "targetExcerpt",
        alias = "target_sentence",
        alias = "targetSentence"
    )]
    target_excerpt: Option<String>,
    #[serde(default, alias = "applicabilityScope", alias = "applicable_to")]
    applicability_scope: Option<OneOrMany>,
    #[serde(default, alias = "feedbackLines", alias = "feedback")]
    feedback_lines: Option<OneOrMany>,
    #[serde(
        default,
        alias = "improvementLines",
        alias = "improvement_suggestions",
        alias = "improvementSuggestions"
    )]
    improvement_lines: Option<OneOrMany>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    /// Flatten into lines; a single string is split and stripped of bullets.
    fn into_lines(self) -> Vec<String> {
        match self {
            Self::Many(lines) => lines,
            Self::One(text) => text
                .lines()
                .map(|l| strip_bullet(l.trim()).to_string())
                .filter(|l| !l.is_empty())
                .collect(),
        }
    }

    fn first(&self) -> Option<&str> {
        match self {
            Self::One(s) => Some(s),
            Self::Many(v) => v.first().map(String::as_str),
        }
    }
}

fn strip_bullet(line: &str) -> &str {
    line.strip_prefix("- ")
        .or_else(|| line.strip_prefix('・'))
        .unwrap_or(line)
        .trim()
}

// ---------------------------------------------------------------------------
// Draft → EvaluationResult
// ---------------------------------------------------------------------------

/// An evaluation before category, priority and scope are resolved.
#[derive(Debug, Clone, Default)]
pub(crate) struct EvaluationDraft {
    pub category: Option<String>,
    pub criteria_id: Option<String>,
    pub score: f64,
    pub priority: Option<u32>,
    pub target_excerpt: Option<String>,
    pub scope: Option<ApplicabilityScope>,
    pub feedback_lines: Vec<String>,
    pub improvement_lines: Vec<String>,
}

impl EvaluationDraft {
    /// Resolve identity against the catalog. `None` when the draft names
    /// neither a category nor a criterion.
    pub(crate) fn resolve(self) -> Option<EvaluationResult> {
        let category = non_blank(self.category);
        let criteria = non_blank(self.criteria_id);
        let named = category.clone();

        // A scope name in the category slot is a scope, not a category.
        let (category, mut scope) = match category {
            Some(c) if lookup_category(&c).is_none() => match ApplicabilityScope::parse(&c) {
                Some(parsed) => (None, self.scope.or(Some(parsed))),
                None => (Some(c), self.scope),
            },
            other => (other, self.scope),
        };

        let info: Option<&CategoryInfo> = category
            .as_deref()
            .and_then(find_category)
            .or_else(|| criteria.as_deref().and_then(category_for_criteria));

        let category = match (info, category) {
            (Some(info), _) => info.id.to_string(),
            (None, Some(c)) => c,
            (None, None) => criteria.clone()?,
        };
        // Without an explicit criterion, the name the payload used stands in.
        let criteria_id = criteria
            .or(named.filter(|n| lookup_category(n).is_none() && ApplicabilityScope::parse(n).is_none()))
            .unwrap_or_else(|| category.clone());

        scope = scope.or(info.map(|i| i.scope));
        let priority = match self.priority {
            Some(p) if p >= 1 => p,
            _ => info.map_or(DEFAULT_PRIORITY, |i| i.priority),
        };

        Some(EvaluationResult {
            category,
            criteria_id,
            score: self.score.clamp(0.0, 1.0),
            priority,
            target_excerpt: non_blank(self.target_excerpt),
            applicability_scope: scope,
            feedback_lines: self.feedback_lines,
            improvement_lines: self.improvement_lines,
        })
    }
}

/// Match a category by id, display name, or criterion id.
fn find_category(name: &str) -> Option<&'static CategoryInfo> {
    lookup_category(name)
        .or_else(|| CATEGORIES.iter().find(|c| c.display_name == name))
        .or_else(|| category_for_criteria(name))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl RawEvaluation {
    fn into_draft(self, position: usize) -> Result<EvaluationDraft> {
        let score = match self.score {
            Some(value) => number(&value).ok_or_else(|| {
                StoryCheckError::malformed(format!(
                    "evaluation {position}: score is not a number: {value}"
                ))
            })?,
            None => {
                return Err(StoryCheckError::malformed(format!(
                    "evaluation {position}: missing score"
                )));
            }
        };

        let priority = self
            .priority
            .as_ref()
            .and_then(number)
            .filter(|p| *p >= 1.0)
            .map(|p| p as u32);

        let scope = match &self.applicability_scope {
            Some(raw) => {
                let name = raw.first().unwrap_or_default();
                let parsed = ApplicabilityScope::parse(name);
                if parsed.is_none() {
                    warn!(position, scope = name, "unknown applicability scope, ignoring");
                }
                parsed
            }
            None => None,
        };

        Ok(EvaluationDraft {
            category: self.category,
            criteria_id: self.criteria_id,
            score,
            priority,
            target_excerpt: self.target_excerpt,
            scope,
            feedback_lines: self.feedback_lines.map(OneOrMany::into_lines).unwrap_or_default(),
            improvement_lines: self
                .improvement_lines
                .map(OneOrMany::into_lines)
                .unwrap_or_default(),
        })
    }
}

/// Finite number from a JSON number or numeric string; `"NaN"` and `"inf"` are rejected.
fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

// ---------------------------------------------------------------------------
// Public decoding
// ---------------------------------------------------------------------------

/// Decode a service response body.
pub fn decode_response(body: &str) -> Result<EvaluationResponse> {
    let raw: RawResponse = serde_json::from_str(body)
        .map_err(|e| StoryCheckError::malformed(format!("invalid JSON: {e}")))?;

    if let Some(error) = raw.error {
        return Err(StoryCheckError::Service(error));
    }

    let evaluations = if let Some(entries) = raw.evaluations {
        decode_evaluations(entries)?
    } else if let Some(text) = raw.result {
        debug!(len = text.len(), "decoding text-format evaluation result");
        text_format::parse_evaluation_text(&text)
    } else if let Some(detail) = raw.detail {
        let message = match detail {
            Value::String(s) => s,
            other => other.to_string(),
        };
        return Err(StoryCheckError::Service(message));
    } else {
        return Err(StoryCheckError::malformed("missing `evaluations`"));
    };

    let total_score = raw
        .total_score
        .unwrap_or_else(|| weighted_score(&evaluations));

    Ok(EvaluationResponse {
        total_score,
        evaluations,
    })
}

/// Decode a bare evaluation list (legacy shapes included).
pub fn decode_evaluation_list(body: &str) -> Result<Vec<EvaluationResult>> {
    let entries: Vec<RawEvaluation> = serde_json::from_str(body)
        .map_err(|e| StoryCheckError::malformed(format!("invalid evaluation list: {e}")))?;
    decode_evaluations(entries)
}

fn decode_evaluations(entries: Vec<RawEvaluation>) -> Result<Vec<EvaluationResult>> {
    entries
        .into_iter()
        .enumerate()
        .map(|(position, raw)| {
            raw.into_draft(position)?.resolve().ok_or_else(|| {
                StoryCheckError::malformed(format!(
                    "evaluation {position}: neither category nor criteria_id present"
                ))
            })
        })
        .collect()
}

/// Priority-weighted mean score, used when a response omits `total_score`.
///
/// Weights: priority 1 → 1.0, 2 → 0.7, 3 → 0.3, anything else → 0.5.
pub fn weighted_score(evaluations: &[EvaluationResult]) -> f64 {
    fn weight(priority: u32) -> f64 {
        match priority {
            1 => 1.0,
            2 => 0.7,
            3 => 0.3,
            _ => 0.5,
        }
    }

    let total_weight: f64 = evaluations.iter().map(|e| weight(e.priority)).sum();
    if total_weight <= 0.0 {
        return 0.0;
    }
    evaluations
        .iter()
        .map(|e| e.score * weight(e.priority))
        .sum::<f64>()
        / total_weight
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_response() {
        let body = r#"{
            "total_score": 0.72,
            "evaluations": [{
                "category": "SUMMARY_LOGIC_FLOW",
                "criteria_id": "SCQA有無",
                "score": 0.6,
                "priority": 2,
                "target_excerpt": "Summary text",
                "applicability_scope": "SUMMARY_ONLY",
                "feedback_lines": ["issue found"],
                "improvement_lines": ["state the complication"]
            }]
        }"#;
        let response = decode_response(body).expect("decode");
        assert_eq!(response.total_score, 0.72);
        let e = &response.evaluations[0];
        assert_eq!(e.category, "SUMMARY_LOGIC_FLOW");
        assert_eq!(e.applicability_scope, Some(ApplicabilityScope::SummaryOnly));
        assert_eq!(e.target_excerpt.as_deref(), Some("Summary text"));
        assert_eq!(e.feedback_lines, vec!["issue found"]);
    }

    #[test]
    fn legacy_singular_feedback_and_criteria_only() {
        let body = r#"{
            "totalScore": 80,
            "evaluations": [{
                "criteria_id": "前回の振り返りの有無",
                "score": "0.8",
                "feedback": "- 前回討議の振り返りが不十分です。\n- 冒頭で要約してください。",
                "target_sentence": "本日の議題"
            }]
        }"#;
        let response = decode_response(body).expect("decode");
        assert_eq!(response.total_score, 80.0);
        let e = &response.evaluations[0];
        assert_eq!(e.category, "SUMMARY_LOGIC_FLOW");
        assert_eq!(e.criteria_id, "前回の振り返りの有無");
        assert_eq!(e.priority, 2);
        assert_eq!(e.applicability_scope, Some(ApplicabilityScope::SummaryOnly));
        assert_eq!(e.target_excerpt.as_deref(), Some("本日の議題"));
        assert_eq!(
            e.feedback_lines,
            vec!["前回討議の振り返りが不十分です。", "冒頭で要約してください。"]
        );
    }

    #[test]
    fn scope_name_in_category_slot() {
        let body = r#"{"evaluations": [{
            "criteria_id": "前回討議振り返り評価",
            "score": 0.8,
            "feedback": "前回討議の振り返りが不十分です。",
            "category": "SUMMARY_ONLY"
        }]}"#;
        let e = &decode_response(body).expect("decode").evaluations[0];
        assert_eq!(e.category, "前回討議振り返り評価");
        assert_eq!(e.applicability_scope, Some(ApplicabilityScope::SummaryOnly));
        assert_eq!(e.priority, DEFAULT_PRIORITY);
    }

    #[test]
    fn legacy_scope_list_field() {
        let body = r#"[{
            "category": "修辞表現",
            "score": 1.4,
            "applicable_to": ["FULL_SUMMARY_AND_STORY"],
            "improvement_suggestions": ["短くする"]
        }]"#;
        let e = &decode_evaluation_list(body).expect("decode")[0];
        assert_eq!(e.category, "FULL_TEXT_RHETORIC");
        assert_eq!(e.criteria_id, "修辞表現");
        assert_eq!(e.score, 1.0);
        assert_eq!(e.applicability_scope, Some(ApplicabilityScope::FullDocument));
        assert_eq!(e.improvement_lines, vec!["短くする"]);
    }

    #[test]
    fn error_payloads_become_service_errors() {
        let err = decode_response(r#"{"error": "model overloaded"}"#).unwrap_err();
        assert!(matches!(err, StoryCheckError::Service(ref m) if m == "model overloaded"));

        let err = decode_response(r#"{"detail": "文書本文とタイトルは必須です"}"#).unwrap_err();
        assert!(matches!(err, StoryCheckError::Service(_)));
    }

    #[test]
    fn malformed_payloads() {
        assert!(matches!(
            decode_response("not json").unwrap_err(),
            StoryCheckError::MalformedResponse { .. }
        ));
        assert!(matches!(
            decode_response(r#"{"total_score": 1}"#).unwrap_err(),
            StoryCheckError::MalformedResponse { .. }
        ));
        let missing_identity = r#"{"evaluations": [{"score": 0.5}]}"#;
        assert!(decode_response(missing_identity).unwrap_err().to_string().contains("evaluation 0"));
        let bad_score = r#"{"evaluations": [{"category": "X", "score": "high"}]}"#;
        assert!(decode_response(bad_score).unwrap_err().to_string().contains("not a number"));
        for non_finite in ["NaN", "inf", "-Infinity"] {
            let body = format!(r#"{{"evaluations": [{{"category": "X", "score": "{non_finite}"}}]}}"#);
            assert!(matches!(
                decode_response(&body).unwrap_err(),
                StoryCheckError::MalformedResponse { .. }
            ));
        }
        let no_score = r#"{"evaluations": [{"category": "X"}]}"#;
        assert!(decode_response(no_score).unwrap_err().to_string().contains("missing score"));
    }

    #[test]
    fn text_result_payload() {
        let body = serde_json::json!({
            "result": "カテゴリ: SCQA有無\nスコア: 0.4\n優先度: 1\n対象文: 本日の結論\nフィードバック:\n- 結論が先に来ていない\n",
            "usage": {"total_tokens": 120}
        })
        .to_string();
        let response = decode_response(&body).expect("decode");
        assert_eq!(response.evaluations.len(), 1);
        assert_eq!(response.evaluations[0].category, "SUMMARY_LOGIC_FLOW");
        assert_eq!(response.evaluations[0].priority, 1);
        // No total in payload: weighted mean of one evaluation is its score.
        assert!((response.total_score - 0.4).abs() < 1e-9);
    }

    #[test]
    fn fixture_response_decodes() {
        let body = std::fs::read_to_string("../../../fixtures/json/review-response.json")
            .expect("read fixture");
        let response = decode_response(&body).expect("decode fixture");
        assert_eq!(response.evaluations.len(), 4);
        assert!(response.evaluations.iter().all(|e| e.priority >= 1));
    }

    #[test]
    fn weighted_score_by_priority() {
        let make = |score: f64, priority: u32| EvaluationResult {
            category: "C".into(),
            criteria_id: "C".into(),
            score,
            priority,
            target_excerpt: None,
            applicability_scope: None,
            feedback_lines: vec![],
            improvement_lines: vec![],
        };
        assert_eq!(weighted_score(&[]), 0.0);
        let score = weighted_score(&[make(1.0, 1), make(0.0, 3)]);
        assert!((score - 1.0 / 1.3).abs() < 1e-9);
        let score = weighted_score(&[make(0.2, 9)]);
        assert!((score - 0.2).abs() < 1e-9);
    }
}
