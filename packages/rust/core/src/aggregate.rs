//! Category/priority aggregation.
//!
//! Only the most urgent tier with something to fix is shown. Within a tier,
//! each applicability scope is checked on its own so one clean scope does not
//! hide issues in another.

use std::collections::BTreeMap;

use serde::Serialize;
use storycheck_shared::{ApplicabilityScope, EvaluationResult};
use tracing::{debug, instrument};

use crate::score::belongs_to;

/// Evaluations chosen for display, with the score of exactly that subset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub evaluations: Vec<EvaluationResult>,
    /// Mean score of `evaluations`; 1.0 when nothing is selected.
    pub overall_score: f64,
    /// Priority of the selected tier.
    pub tier: Option<u32>,
}

impl Selection {
    fn empty() -> Self {
        Self {
            evaluations: Vec::new(),
            overall_score: 1.0,
            tier: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.evaluations.is_empty()
    }
}

/// Pick the evaluations to show.
///
/// With an `active_category`, only that category's evaluations take part.
/// Tiers are walked from priority 1 down; the first tier where any scope
/// partition has valid feedback is returned, in input order.
#[instrument(skip_all, fields(evaluations = evaluations.len(), category = active_category.unwrap_or("all")))]
pub fn select_for_display(
    evaluations: &[EvaluationResult],
    active_category: Option<&str>,
    markers: &[String],
) -> Selection {
    // priority -> scope -> positions in `evaluations`
    let mut tiers: BTreeMap<u32, BTreeMap<Option<ApplicabilityScope>, Vec<usize>>> =
        BTreeMap::new();
    for (position, evaluation) in evaluations.iter().enumerate() {
        if active_category.is_some_and(|c| !belongs_to(evaluation, c)) {
            continue;
        }
        tiers
            .entry(evaluation.priority)
            .or_default()
            .entry(evaluation.applicability_scope)
            .or_default()
            .push(position);
    }

    for (priority, partitions) in tiers {
        let mut positions: Vec<usize> = partitions
            .values()
            .flat_map(|members| {
                members
                    .iter()
                    .copied()
                    .filter(|&p| evaluations[p].has_valid_feedback(markers))
            })
            .collect();
        if positions.is_empty() {
            debug!(priority, scopes = partitions.len(), "tier has nothing to report");
            continue;
        }
        positions.sort_unstable();

        let selected: Vec<EvaluationResult> =
            positions.into_iter().map(|p| evaluations[p].clone()).collect();
        let overall_score =
            selected.iter().map(|e| e.score).sum::<f64>() / selected.len() as f64;
        debug!(priority, selected = selected.len(), overall_score, "tier selected");
        return Selection {
            evaluations: selected,
            overall_score,
            tier: Some(priority),
        };
    }

    Selection::empty()
}
