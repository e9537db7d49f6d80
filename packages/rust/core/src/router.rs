//! Evaluation router.
//!
//! Resolves an evaluation onto the paragraph(s) it talks about. The scope picks
//! a candidate set; the excerpt is then matched against it with three
//! strategies in order (exact, containment, similarity). When nothing matches,
//! a length heuristic picks a paragraph that fits the scope.

use std::cmp::Reverse;

use serde::Serialize;
use storycheck_shared::{
    AppConfig, ApplicabilityScope, DocumentTree, EvaluationResult, RoutedComment, RoutingSection,
    StructuralLevel, TreeNode,
};
use tracing::{debug, instrument};

use crate::matching::{normalize, similarity};
use crate::placement::{PlacementConfig, render_block};

/// Router thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct RouterConfig {
    pub similarity_threshold: f64,
}

impl From<&RoutingSection> for RouterConfig {
    fn from(section: &RoutingSection) -> Self {
        Self {
            similarity_threshold: section.similarity_threshold,
        }
    }
}

impl From<&AppConfig> for RouterConfig {
    fn from(config: &AppConfig) -> Self {
        Self::from(&config.routing)
    }
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self::from(&RoutingSection::default())
    }
}

/// How a route was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    /// No excerpt (or a whole-document scope): every candidate.
    Broadcast,
    Exact,
    Containment,
    Similarity,
    /// Excerpt matched nothing; picked by paragraph length.
    Heuristic,
    Miss,
}

/// Target paragraphs for one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub targets: Vec<usize>,
    pub kind: MatchKind,
}

impl Route {
    fn miss() -> Self {
        Self {
            targets: Vec::new(),
            kind: MatchKind::Miss,
        }
    }

    fn single(index: usize, kind: MatchKind) -> Self {
        Self {
            targets: vec![index],
            kind,
        }
    }
}

/// Result of routing a batch of evaluations.
#[derive(Debug, Clone, Default)]
pub struct RoutingOutcome {
    pub comments: Vec<RoutedComment>,
    /// Evaluations that resolved to no paragraph at all.
    pub misses: usize,
}

/// Routes evaluations onto tree nodes. Stateless apart from its config.
#[derive(Debug, Clone, Default)]
pub struct Router {
    config: RouterConfig,
}

impl Router {
    pub fn new(config: RouterConfig) -> Self {
        Self { config }
    }

    /// Target paragraph indices for `evaluation`; empty on a miss.
    pub fn route(&self, tree: &DocumentTree, evaluation: &EvaluationResult) -> Vec<usize> {
        self.resolve(tree, evaluation).targets
    }

    /// Like [`Router::route`], also reporting which strategy matched.
    pub fn resolve(&self, tree: &DocumentTree, evaluation: &EvaluationResult) -> Route {
        let scope = evaluation.applicability_scope;
        let candidates = candidates(tree, scope);
        if candidates.is_empty() {
            debug!(criteria = %evaluation.criteria_id, "no candidate paragraphs for scope");
            return Route::miss();
        }

        let excerpt = evaluation
            .target_excerpt
            .as_deref()
            .map(normalize)
            .unwrap_or_default();

        if excerpt.is_empty() || scope == Some(ApplicabilityScope::FullDocument) {
            return Route {
                targets: candidates.iter().map(|c| c.index).collect(),
                kind: MatchKind::Broadcast,
            };
        }

        if let Some(found) = self.match_excerpt(&excerpt, &candidates) {
            return found;
        }

        match heuristic(scope, &candidates) {
            Some(index) => {
                debug!(
                    criteria = %evaluation.criteria_id,
                    index,
                    "excerpt not found, routed by length heuristic"
                );
                Route::single(index, MatchKind::Heuristic)
            }
            None => {
                debug!(criteria = %evaluation.criteria_id, %excerpt, "routing miss");
                Route::miss()
            }
        }
    }

    fn match_excerpt(&self, excerpt: &str, candidates: &[Candidate]) -> Option<Route> {
        if let Some(c) = candidates.iter().find(|c| c.text == excerpt) {
            return Some(Route::single(c.index, MatchKind::Exact));
        }

        // Widest overlap wins; ties go to the earlier paragraph.
        let excerpt_len = excerpt.chars().count();
        if let Some(c) = candidates
            .iter()
            .filter(|c| c.text.contains(excerpt) || excerpt.contains(c.text.as_str()))
            .max_by_key(|c| (c.text.chars().count().min(excerpt_len), Reverse(c.index)))
        {
            return Some(Route::single(c.index, MatchKind::Containment));
        }

        let mut best: Option<(f64, usize)> = None;
        for c in candidates {
            let score = similarity(excerpt, &c.text);
            if score >= self.config.similarity_threshold
                && best.is_none_or(|(top, _)| score > top)
            {
                best = Some((score, c.index));
            }
        }
        best.map(|(_, index)| Route::single(index, MatchKind::Similarity))
    }

    /// Route every evaluation and render one comment per target.
    #[instrument(skip_all, fields(evaluations = evaluations.len()))]
    pub fn route_all(
        &self,
        tree: &DocumentTree,
        evaluations: &[EvaluationResult],
        placement: &PlacementConfig,
    ) -> RoutingOutcome {
        let mut outcome = RoutingOutcome::default();
        for evaluation in evaluations {
            let route = self.resolve(tree, evaluation);
            if route.targets.is_empty() {
                outcome.misses += 1;
                continue;
            }
            let rendered = render_block(evaluation, placement);
            outcome
                .comments
                .extend(route.targets.into_iter().map(|index| RoutedComment {
                    target_paragraph_index: index,
                    rendered_text: rendered.clone(),
                    source_evaluation: evaluation.clone(),
                }));
        }
        debug!(
            routed = outcome.comments.len(),
            misses = outcome.misses,
            "routing finished"
        );
        outcome
    }
}

/// Route with the default configuration.
pub fn route(tree: &DocumentTree, evaluation: &EvaluationResult) -> Vec<usize> {
    Router::default().route(tree, evaluation)
}

// ---------------------------------------------------------------------------
// Candidates
// ---------------------------------------------------------------------------

struct Candidate {
    index: usize,
    /// Normalized node text.
    text: String,
    /// Char count of the original text.
    len: usize,
}

impl Candidate {
    fn from_node(node: TreeNode<'_>) -> Option<Self> {
        Some(Self {
            index: node.source_paragraph_index?,
            text: normalize(node.text),
            len: node.text.chars().count(),
        })
    }
}

/// Real paragraphs the scope allows, in document order.
///
/// A whole-document scope targets the title; without a title paragraph it
/// falls back to the first summary.
fn candidates(tree: &DocumentTree, scope: Option<ApplicabilityScope>) -> Vec<Candidate> {
    let nodes = tree.sourced_nodes();
    match scope {
        Some(ApplicabilityScope::FullDocument) => {
            let title = nodes.iter().find(|n| n.level == StructuralLevel::Title);
            let first_summary = || nodes.iter().find(|n| n.level == StructuralLevel::Summary);
            title
                .or_else(first_summary)
                .and_then(|n| Candidate::from_node(*n))
                .into_iter()
                .collect()
        }
        Some(scope) => nodes
            .into_iter()
            .filter(|n| scope.includes(n.level))
            .filter_map(Candidate::from_node)
            .collect(),
        None => nodes.into_iter().filter_map(Candidate::from_node).collect(),
    }
}

/// Shortest candidate for summary scopes, the lower median for summary+story,
/// the longest for story+body. Ties go to the earlier paragraph.
fn heuristic(scope: Option<ApplicabilityScope>, candidates: &[Candidate]) -> Option<usize> {
    let mut by_len: Vec<&Candidate> = candidates.iter().collect();
    by_len.sort_by_key(|c| (c.len, c.index));

    let pick = match scope? {
        ApplicabilityScope::SummaryOnly => by_len.first().copied(),
        ApplicabilityScope::SummaryAndStory => by_len.get(by_len.len().saturating_sub(1) / 2).copied(),
        ApplicabilityScope::StoryAndBody => by_len
            .iter()
            .copied()
            .max_by_key(|c| (c.len, Reverse(c.index))),
        ApplicabilityScope::FullDocument | ApplicabilityScope::Unscoped => None,
    };
    pick.map(|c| c.index)
}
