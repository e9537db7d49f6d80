//! Per-category scores on a 100-point scale.

use serde::Serialize;
use storycheck_shared::{CATEGORIES, EvaluationResult, lookup_category};

/// Score of one catalog category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryScore {
    pub id: &'static str,
    pub display_name: &'static str,
    /// 0 to 100.
    pub score: u32,
    /// Evaluations that counted towards this category.
    pub evaluated: usize,
}

/// Whether `evaluation` is reported under `category`, either directly or
/// through one of the category's criteria.
pub fn belongs_to(evaluation: &EvaluationResult, category: &str) -> bool {
    if evaluation.category == category {
        return true;
    }
    lookup_category(category).is_some_and(|info| {
        info.criteria_ids.contains(&evaluation.criteria_id.as_str())
    })
}

/// One score per catalog category, in priority order.
///
/// A category with no evaluations, or whose evaluations report nothing to fix,
/// scores 100. Otherwise it is the mean evaluation score scaled to 100.
pub fn category_scores(evaluations: &[EvaluationResult], markers: &[String]) -> Vec<CategoryScore> {
    CATEGORIES
        .iter()
        .map(|info| {
            let relevant: Vec<&EvaluationResult> = evaluations
                .iter()
                .filter(|e| belongs_to(e, info.id))
                .collect();

            let score = if relevant.iter().any(|e| e.has_valid_feedback(markers)) {
                let mean = relevant.iter().map(|e| e.score).sum::<f64>() / relevant.len() as f64;
                (mean * 100.0).round() as u32
            } else {
                100
            };

            CategoryScore {
                id: info.id,
                display_name: info.display_name,
                score,
                evaluated: relevant.len(),
            }
        })
        .collect()
}

/// Rounded mean of the category scores; 100 when there are none.
pub fn total_score(scores: &[CategoryScore]) -> u32 {
    if scores.is_empty() {
        return 100;
    }
    let sum: u32 = scores.iter().map(|s| s.score).sum();
    (f64::from(sum) / scores.len() as f64).round() as u32
}
