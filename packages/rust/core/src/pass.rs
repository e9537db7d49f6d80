//! End-to-end check pass: read → build → evaluate → select → route → place.

use chrono::{DateTime, Utc};
use serde::Serialize;
use storycheck_evaluator::{EvaluationRequest, EvaluationSource};
use storycheck_shared::{AppConfig, DocumentTree, EvaluationResult, Result, TreeCounts};
use storycheck_structure::{ClassifierConfig, build_with};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::aggregate::select_for_display;
use crate::document::DocumentAccessor;
use crate::placement::{PlacementConfig, place};
use crate::router::{Router, RouterConfig};
use crate::score::{CategoryScore, category_scores, total_score};

/// Everything a pass needs besides its collaborators.
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    pub classifier: ClassifierConfig,
    pub router: RouterConfig,
    pub placement: PlacementConfig,
    /// Restrict display and annotations to one category.
    pub active_category: Option<String>,
}

impl From<&AppConfig> for CheckOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            classifier: ClassifierConfig::from(config),
            router: RouterConfig::from(config),
            placement: PlacementConfig::from(config),
            active_category: None,
        }
    }
}

impl CheckOptions {
    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.active_category = category;
        self
    }
}

/// Outcome of selecting, routing and placing one set of evaluations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DisplayReport {
    pub active_category: Option<String>,
    /// Mean score of the selected evaluations.
    pub overall_score: f64,
    pub selected: usize,
    /// Comments produced by routing, one per (evaluation, paragraph) pair.
    pub routed: usize,
    /// Selected evaluations that matched no paragraph.
    pub routing_misses: usize,
    pub annotations_written: usize,
    pub annotations_suppressed: usize,
    /// Paragraphs whose annotation write failed.
    pub write_failures: Vec<usize>,
}

/// Summary of a full check pass.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub pass_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub title: String,
    pub tree_counts: TreeCounts,
    /// Score reported by the evaluation service.
    pub service_score: f64,
    pub category_scores: Vec<CategoryScore>,
    /// Mean of the category scores, 0 to 100.
    pub total_score: u32,
    pub evaluations: usize,
    #[serde(flatten)]
    pub display: DisplayReport,
    /// The tree the pass ran against, for a later [`toggle_category`].
    #[serde(skip)]
    pub tree: DocumentTree,
    #[serde(skip)]
    pub all_evaluations: Vec<EvaluationResult>,
}

/// Progress callback for reporting pass status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the pass completes.
    fn done(&self, report: &CheckReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _report: &CheckReport) {}
}

/// Run one full check pass.
///
/// Collaborator failures and undecodable responses abort the pass before any
/// annotation is touched. Annotation write failures only show up in the report.
#[instrument(skip_all, fields(category = options.active_category.as_deref().unwrap_or("all")))]
pub async fn run_check<D, S>(
    document: &D,
    source: &S,
    options: &CheckOptions,
    progress: &dyn ProgressReporter,
) -> Result<CheckReport>
where
    D: DocumentAccessor,
    S: EvaluationSource,
{
    let pass_id = Uuid::now_v7();
    let started_at = Utc::now();
    info!(%pass_id, "starting check pass");

    progress.phase("Reading document");
    let paragraphs = document.list_paragraphs().await?;
    let mut tree = build_with(&paragraphs, &options.classifier);
    if tree.title_paragraph_index.is_none() {
        tree.title = document.read_title().await?;
    }

    progress.phase("Requesting evaluation");
    let request = EvaluationRequest::from_tree(&tree);
    let response = source.evaluate(&request).await?;

    let markers = &options.placement.no_issue_markers;
    let scores = category_scores(&response.evaluations, markers);
    let total = total_score(&scores);

    progress.phase("Placing annotations");
    let display = display(
        document,
        &tree,
        &response.evaluations,
        options,
        options.active_category.as_deref(),
    )
    .await?;

    let report = CheckReport {
        pass_id,
        started_at,
        title: tree.title.clone(),
        tree_counts: tree.counts(),
        service_score: response.total_score,
        category_scores: scores,
        total_score: total,
        evaluations: response.evaluations.len(),
        display,
        tree,
        all_evaluations: response.evaluations,
    };

    info!(
        %pass_id,
        evaluations = report.evaluations,
        selected = report.display.selected,
        written = report.display.annotations_written,
        misses = report.display.routing_misses,
        total_score = report.total_score,
        "check pass complete"
    );
    progress.done(&report);
    Ok(report)
}

/// Switch the displayed category without contacting the evaluation service.
///
/// Annotations are replaced in full, exactly as in a check pass.
#[instrument(skip_all, fields(category = active_category.unwrap_or("all")))]
pub async fn toggle_category<D: DocumentAccessor>(
    document: &D,
    tree: &DocumentTree,
    evaluations: &[EvaluationResult],
    options: &CheckOptions,
    active_category: Option<&str>,
) -> Result<DisplayReport> {
    display(document, tree, evaluations, options, active_category).await
}

async fn display<D: DocumentAccessor>(
    document: &D,
    tree: &DocumentTree,
    evaluations: &[EvaluationResult],
    options: &CheckOptions,
    active_category: Option<&str>,
) -> Result<DisplayReport> {
    let selection = select_for_display(
        evaluations,
        active_category,
        &options.placement.no_issue_markers,
    );

    let router = Router::new(options.router.clone());
    let routing = router.route_all(tree, &selection.evaluations, &options.placement);
    let placement = place(document, &routing.comments, active_category, &options.placement).await?;

    Ok(DisplayReport {
        active_category: active_category.map(str::to_string),
        overall_score: selection.overall_score,
        selected: selection.evaluations.len(),
        routed: routing.comments.len(),
        routing_misses: routing.misses,
        annotations_written: placement.written,
        annotations_suppressed: placement.suppressed,
        write_failures: placement.failed,
    })
}
