//! Comment placement.
//!
//! Routed comments are grouped per paragraph, comments with nothing to report
//! ("no issue" markers only, no suggestion) and exact duplicates are dropped, and the rest are concatenated into a single
//! annotation per paragraph. Placing always clears the document's annotations
//! first, so running the same pass twice leaves the same state.

use std::collections::BTreeMap;

use serde::Serialize;
use storycheck_shared::{
    AnnotationsSection, AppConfig, EvaluationResult, Result, RoutedComment, display_name,
};
use tracing::{debug, info, instrument, warn};

use crate::document::DocumentAccessor;
use crate::score::belongs_to;

/// Labels and markers used when rendering annotations.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementConfig {
    pub no_issue_markers: Vec<String>,
    pub feedback_label: String,
    pub improvement_label: String,
}

impl From<&AnnotationsSection> for PlacementConfig {
    fn from(section: &AnnotationsSection) -> Self {
        Self {
            no_issue_markers: section.no_issue_markers.clone(),
            feedback_label: section.feedback_label.clone(),
            improvement_label: section.improvement_label.clone(),
        }
    }
}

impl From<&AppConfig> for PlacementConfig {
    fn from(config: &AppConfig) -> Self {
        Self::from(&config.annotations)
    }
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self::from(&AnnotationsSection::default())
    }
}

/// One annotation ready to be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Annotation {
    pub paragraph_index: usize,
    pub text: String,
}

/// What a placement run did.
#[derive(Debug, Default, Serialize)]
pub struct PlacementReport {
    pub written: usize,
    /// Comments dropped because they carried neither an issue nor a suggestion.
    pub suppressed: usize,
    /// Paragraphs whose annotation could not be written.
    pub failed: Vec<usize>,
}

/// Render one evaluation as a comment block.
///
/// ```text
/// [サマリーの論理展開] SCQA有無
/// フィードバック:
/// - 結論が後回しになっている
/// 改善提案:
/// - 冒頭で結論を述べる
/// ```
///
/// Sections without lines are left out.
pub fn render_block(evaluation: &EvaluationResult, config: &PlacementConfig) -> String {
    let name = display_name(&evaluation.category);
    let mut out = if evaluation.criteria_id.is_empty()
        || evaluation.criteria_id == evaluation.category
        || evaluation.criteria_id == name
    {
        format!("[{name}]")
    } else {
        format!("[{name}] {}", evaluation.criteria_id)
    };

    let feedback: Vec<&str> = evaluation.negative_feedback(&config.no_issue_markers).collect();
    if !feedback.is_empty() {
        out.push('\n');
        out.push_str(&config.feedback_label);
        out.push(':');
        for line in feedback {
            out.push_str("\n- ");
            out.push_str(line);
        }
    }

    let suggestions: Vec<&str> = evaluation.suggestions().collect();
    if !suggestions.is_empty() {
        out.push('\n');
        out.push_str(&config.improvement_label);
        out.push(':');
        for line in suggestions {
            out.push_str("\n- ");
            out.push_str(line);
        }
    }

    out
}

/// Group comments per paragraph and build the annotation texts, in paragraph
/// order. Returns the annotations and the number of suppressed comments.
pub fn plan(
    comments: &[RoutedComment],
    active_category: Option<&str>,
    config: &PlacementConfig,
) -> (Vec<Annotation>, usize) {
    let mut groups: BTreeMap<usize, Vec<&RoutedComment>> = BTreeMap::new();
    let mut suppressed = 0;

    for comment in comments {
        if active_category.is_some_and(|c| !belongs_to(&comment.source_evaluation, c)) {
            continue;
        }
        if !comment.source_evaluation.has_valid_feedback(&config.no_issue_markers) {
            suppressed += 1;
            continue;
        }

        let group = groups.entry(comment.target_paragraph_index).or_default();
        if group
            .iter()
            .any(|c| c.source_evaluation == comment.source_evaluation)
        {
            continue;
        }
        group.push(comment);
    }

    let annotations = groups
        .into_iter()
        .map(|(paragraph_index, group)| Annotation {
            paragraph_index,
            text: group
                .iter()
                .map(|c| c.rendered_text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n"),
        })
        .collect();

    (annotations, suppressed)
}

/// Replace the document's annotations with the ones planned from `comments`.
///
/// A failing clear aborts before anything is written. A paragraph-level write
/// failure is logged and recorded, and the remaining paragraphs are still
/// annotated. Any other write error aborts the run.
#[instrument(skip_all, fields(comments = comments.len(), category = active_category.unwrap_or("all")))]
pub async fn place<D: DocumentAccessor>(
    document: &D,
    comments: &[RoutedComment],
    active_category: Option<&str>,
    config: &PlacementConfig,
) -> Result<PlacementReport> {
    let (annotations, suppressed) = plan(comments, active_category, config);
    debug!(annotations = annotations.len(), suppressed, "annotation plan ready");

    document.clear_all_annotations().await?;

    let mut report = PlacementReport {
        suppressed,
        ..PlacementReport::default()
    };
    for annotation in &annotations {
        match document
            .write_annotation(annotation.paragraph_index, &annotation.text)
            .await
        {
            Ok(()) => report.written += 1,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                warn!(
                    paragraph = annotation.paragraph_index,
                    error = %e,
                    "annotation write failed, skipping"
                );
                report.failed.push(annotation.paragraph_index);
            }
        }
    }

    info!(
        written = report.written,
        failed = report.failed.len(),
        suppressed = report.suppressed,
        "annotations placed"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemoryDocument;
    use storycheck_shared::{DEFAULT_NO_ISSUE_MARKER, Paragraph, StoryCheckError};

    fn evaluation(category: &str, criteria: &str, feedback: &[&str], improvements: &[&str]) -> EvaluationResult {
        EvaluationResult {
            category: category.into(),
            criteria_id: criteria.into(),
            score: 0.5,
            priority: 2,
            target_excerpt: None,
            applicability_scope: None,
            feedback_lines: feedback.iter().map(|s| s.to_string()).collect(),
            improvement_lines: improvements.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn comment(index: usize, evaluation: EvaluationResult) -> RoutedComment {
        RoutedComment {
            target_paragraph_index: index,
            rendered_text: render_block(&evaluation, &PlacementConfig::default()),
            source_evaluation: evaluation,
        }
    }

    fn document() -> MemoryDocument {
        MemoryDocument::new(
            "Title",
            vec![
                Paragraph::plain("Title"),
                Paragraph::list_item("Summary text", 0),
                Paragraph::list_item("Story text", 1),
                Paragraph::list_item("Body text", 2),
            ],
        )
    }

    #[test]
    fn render_has_header_and_sections_in_order() {
        let e = evaluation(
            "SUMMARY_LOGIC_FLOW",
            "SCQA有無",
            &["結論が後回し", DEFAULT_NO_ISSUE_MARKER],
            &["冒頭で結論を述べる"],
        );
        let text = render_block(&e, &PlacementConfig::default());
        assert_eq!(
            text,
            "[サマリーの論理展開] SCQA有無\nフィードバック:\n- 結論が後回し\n改善提案:\n- 冒頭で結論を述べる"
        );
    }

    #[test]
    fn render_omits_empty_sections() {
        let e = evaluation("CUSTOM", "CUSTOM", &[], &["言い換える"]);
        let text = render_block(&e, &PlacementConfig::default());
        assert_eq!(text, "[CUSTOM]\n改善提案:\n- 言い換える");
        assert!(!text.contains("フィードバック"));
    }

    #[test]
    fn labels_come_from_config() {
        let config = PlacementConfig {
            feedback_label: "Feedback".into(),
            improvement_label: "Suggestions".into(),
            ..PlacementConfig::default()
        };
        let e = evaluation("X", "Y", &["issue found"], &["fix it"]);
        let text = render_block(&e, &config);
        assert!(text.contains("Feedback:\n- issue found"));
        assert!(text.contains("Suggestions:\n- fix it"));
    }

    #[test]
    fn plan_groups_per_paragraph_and_drops_duplicates() {
        let a = evaluation("SUMMARY_LOGIC_FLOW", "SCQA有無", &["issue A"], &[]);
        let b = evaluation("DETAIL_RHETORIC", "メッセージとボディの論理的整合性", &["issue B"], &[]);
        let comments = vec![
            comment(3, b.clone()),
            comment(1, a.clone()),
            comment(1, b.clone()),
            comment(1, a.clone()),
        ];
        let (annotations, suppressed) = plan(&comments, None, &PlacementConfig::default());
        assert_eq!(suppressed, 0);
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].paragraph_index, 1);
        assert_eq!(annotations[0].text.matches("issue A").count(), 1);
        assert!(annotations[0].text.contains("\n\n[細部の修辞表現]"));
        assert_eq!(annotations[1].paragraph_index, 3);
    }

    #[test]
    fn plan_filters_by_active_category() {
        let comments = vec![
            comment(1, evaluation("SUMMARY_LOGIC_FLOW", "SCQA有無", &["a"], &[])),
            comment(2, evaluation("STORY_INTERNAL_LOGIC", "接続詞の適切性", &["b"], &[])),
        ];
        let (annotations, _) = plan(&comments, Some("STORY_INTERNAL_LOGIC"), &PlacementConfig::default());
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[0].paragraph_index, 2);
    }

    #[tokio::test]
    async fn issue_is_annotated() {
        let doc = document();
        let comments = vec![comment(1, evaluation("SUMMARY_LOGIC_FLOW", "SCQA有無", &["issue found"], &[]))];
        let report = place(&doc, &comments, None, &PlacementConfig::default())
            .await
            .unwrap();
        assert_eq!(report.written, 1);
        let annotations = doc.annotations().await;
        assert_eq!(annotations.len(), 1);
        assert!(annotations[&1][0].contains("issue found"));
    }

    #[tokio::test]
    async fn no_issue_verdict_is_not_annotated() {
        let doc = document();
        let comments = vec![comment(
            1,
            evaluation("SUMMARY_LOGIC_FLOW", "SCQA有無", &[DEFAULT_NO_ISSUE_MARKER], &[]),
        )];
        let report = place(&doc, &comments, None, &PlacementConfig::default())
            .await
            .unwrap();
        assert_eq!(report.written, 0);
        assert_eq!(report.suppressed, 1);
        assert_eq!(doc.annotation_count().await, 0);
    }

    /// Accepts the clear, then loses its connection.
    struct DisconnectedDocument;

    impl DocumentAccessor for DisconnectedDocument {
        async fn list_paragraphs(&self) -> Result<Vec<Paragraph>> {
            Ok(Vec::new())
        }

        async fn read_title(&self) -> Result<String> {
            Ok(String::new())
        }

        async fn clear_all_annotations(&self) -> Result<()> {
            Ok(())
        }

        async fn write_annotation(&self, _paragraph_index: usize, _text: &str) -> Result<()> {
            Err(StoryCheckError::unavailable("document", "connection closed"))
        }
    }

    #[tokio::test]
    async fn unavailable_document_aborts_placement() {
        let comments = vec![comment(1, evaluation("SUMMARY_LOGIC_FLOW", "SCQA有無", &["a"], &[]))];
        let err = place(&DisconnectedDocument, &comments, None, &PlacementConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoryCheckError::Unavailable { collaborator: "document", .. }));
    }

    #[tokio::test]
    async fn suggestion_under_no_issue_marker_is_annotated() {
        let doc = document();
        let comments = vec![comment(
            1,
            evaluation("SUMMARY_LOGIC_FLOW", "SCQA有無", &[DEFAULT_NO_ISSUE_MARKER], &["冒頭で結論を述べる"]),
        )];
        let report = place(&doc, &comments, None, &PlacementConfig::default())
            .await
            .unwrap();
        assert_eq!(report.written, 1);
        assert_eq!(report.suppressed, 0);
        assert_eq!(
            doc.annotations().await[&1],
            vec!["[サマリーの論理展開] SCQA有無\n改善提案:\n- 冒頭で結論を述べる".to_string()]
        );
    }

    #[tokio::test]
    async fn placing_twice_does_not_accumulate() {
        let doc = document()
            .with_annotations(BTreeMap::from([(2, vec!["stale comment".to_string()])]));
        let comments = vec![
            comment(1, evaluation("SUMMARY_LOGIC_FLOW", "SCQA有無", &["a"], &[])),
            comment(3, evaluation("DETAIL_RHETORIC", "メッセージとボディの論理的整合性", &["b"], &[])),
        ];
        let config = PlacementConfig::default();

        place(&doc, &comments, None, &config).await.unwrap();
        let first = doc.annotations().await;
        place(&doc, &comments, None, &config).await.unwrap();
        let second = doc.annotations().await;

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert!(!second.contains_key(&2));
    }

    #[tokio::test]
    async fn failed_write_does_not_abort() {
        let doc = document().with_failing_writes([1]);
        let comments = vec![
            comment(1, evaluation("SUMMARY_LOGIC_FLOW", "SCQA有無", &["a"], &[])),
            comment(2, evaluation("STORY_INTERNAL_LOGIC", "接続詞の適切性", &["b"], &[])),
        ];
        let report = place(&doc, &comments, None, &PlacementConfig::default())
            .await
            .unwrap();
        assert_eq!(report.written, 1);
        assert_eq!(report.failed, vec![1]);
        assert!(doc.annotations().await.contains_key(&2));
    }
}
