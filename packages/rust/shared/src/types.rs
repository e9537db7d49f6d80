//! Core domain types for StoryCheck documents and evaluations.

use serde::{Deserialize, Serialize};

/// Text substituted for nodes the source document never supplied.
pub const PLACEHOLDER_TEXT: &str = "no content";

/// Feedback line the evaluation service emits when a criterion found nothing.
pub const DEFAULT_NO_ISSUE_MARKER: &str = "問題なし";

// ---------------------------------------------------------------------------
// Paragraph
// ---------------------------------------------------------------------------

/// One paragraph as read from the live document, with its structural signals.
///
/// The paragraph's index is its zero-based position in the sequence returned
/// by the document accessor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    /// Raw paragraph text.
    pub text: String,
    /// First-line indent in points (negative for hanging indents).
    #[serde(default)]
    pub first_line_indent_pt: f64,
    /// Left indent in points.
    #[serde(default)]
    pub left_indent_pt: f64,
    /// Explicit list nesting level, when the paragraph is a list item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list_level: Option<u32>,
}

impl Paragraph {
    /// A plain paragraph with no indentation and no list nesting.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            first_line_indent_pt: 0.0,
            left_indent_pt: 0.0,
            list_level: None,
        }
    }

    /// A list item at the given nesting level.
    pub fn list_item(text: impl Into<String>, level: u32) -> Self {
        Self {
            list_level: Some(level),
            ..Self::plain(text)
        }
    }

    /// A paragraph carrying only indentation signals.
    pub fn indented(text: impl Into<String>, first_line_indent_pt: f64, left_indent_pt: f64) -> Self {
        Self {
            first_line_indent_pt,
            left_indent_pt,
            ..Self::plain(text)
        }
    }

    /// Whether the paragraph has no visible text.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

// ---------------------------------------------------------------------------
// StructuralLevel
// ---------------------------------------------------------------------------

/// Discrete structural level of a paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StructuralLevel {
    Title,
    Summary,
    Story,
    Body,
    Unknown,
}

impl StructuralLevel {
    /// Map an explicit list nesting level. Levels deeper than 2 are body detail.
    pub fn from_list_level(level: u32) -> Self {
        match level {
            0 => Self::Summary,
            1 => Self::Story,
            _ => Self::Body,
        }
    }

    /// One step down the hierarchy, never skipping a level.
    pub fn demoted(self) -> Self {
        match self {
            Self::Title => Self::Summary,
            Self::Summary => Self::Story,
            Self::Story | Self::Body | Self::Unknown => Self::Body,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "TITLE",
            Self::Summary => "SUMMARY",
            Self::Story => "STORY",
            Self::Body => "BODY",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for StructuralLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ApplicabilityScope
// ---------------------------------------------------------------------------

/// The subset of structural levels an evaluation criterion judges.
///
/// Aliases accept the block names older service revisions emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ApplicabilityScope {
    #[serde(rename = "FULL_DOCUMENT", alias = "FULL_SUMMARY_AND_STORY")]
    FullDocument,
    #[serde(
        rename = "SUMMARY_ONLY",
        alias = "FULL_SUMMARY",
        alias = "CONSECUTIVE_SUMMARY"
    )]
    SummaryOnly,
    #[serde(rename = "SUMMARY_AND_STORY", alias = "SUMMARY_STORY_BLOCK")]
    SummaryAndStory,
    #[serde(
        rename = "STORY_AND_BODY",
        alias = "SUMMARY_WISE_STORY_BLOCK",
        alias = "STORY_WISE_BODY_BLOCK"
    )]
    StoryAndBody,
    #[serde(rename = "NONE")]
    Unscoped,
}

impl ApplicabilityScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FullDocument => "FULL_DOCUMENT",
            Self::SummaryOnly => "SUMMARY_ONLY",
            Self::SummaryAndStory => "SUMMARY_AND_STORY",
            Self::StoryAndBody => "STORY_AND_BODY",
            Self::Unscoped => "NONE",
        }
    }

    /// Whether nodes at `level` belong to this scope's candidate set.
    pub fn includes(&self, level: StructuralLevel) -> bool {
        use StructuralLevel as L;
        match self {
            Self::FullDocument => level == L::Title,
            Self::SummaryOnly => level == L::Summary,
            Self::SummaryAndStory => matches!(level, L::Summary | L::Story),
            Self::StoryAndBody => matches!(level, L::Story | L::Body),
            Self::Unscoped => true,
        }
    }

    /// Parse a scope name, accepting the legacy block names too.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "FULL_DOCUMENT" | "FULL_SUMMARY_AND_STORY" => Some(Self::FullDocument),
            "SUMMARY_ONLY" | "FULL_SUMMARY" | "CONSECUTIVE_SUMMARY" => Some(Self::SummaryOnly),
            "SUMMARY_AND_STORY" | "SUMMARY_STORY_BLOCK" => Some(Self::SummaryAndStory),
            "STORY_AND_BODY" | "SUMMARY_WISE_STORY_BLOCK" | "STORY_WISE_BODY_BLOCK" => {
                Some(Self::StoryAndBody)
            }
            "NONE" => Some(Self::Unscoped),
            _ => None,
        }
    }
}

impl std::fmt::Display for ApplicabilityScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// DocumentTree
// ---------------------------------------------------------------------------

/// Title → Summary → Story → Body hierarchy built fresh on every check pass.
///
/// Placeholder nodes carry [`PLACEHOLDER_TEXT`] and no source paragraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentTree {
    /// Document title (empty when the document has none).
    pub title: String,
    /// Paragraph the title was read from, if it came from the paragraph list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_paragraph_index: Option<usize>,
    /// Always non-empty.
    pub summaries: Vec<SummaryNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryNode {
    pub text: String,
    pub source_paragraph_index: Option<usize>,
    /// Always non-empty.
    pub stories: Vec<StoryNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryNode {
    pub text: String,
    pub source_paragraph_index: Option<usize>,
    /// Always non-empty.
    pub bodies: Vec<BodyNode>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BodyNode {
    pub text: String,
    pub source_paragraph_index: Option<usize>,
}

impl BodyNode {
    pub fn placeholder() -> Self {
        Self {
            text: PLACEHOLDER_TEXT.into(),
            source_paragraph_index: None,
        }
    }
}

impl StoryNode {
    pub fn placeholder() -> Self {
        Self {
            text: PLACEHOLDER_TEXT.into(),
            source_paragraph_index: None,
            bodies: vec![BodyNode::placeholder()],
        }
    }
}

impl SummaryNode {
    pub fn placeholder() -> Self {
        Self {
            text: PLACEHOLDER_TEXT.into(),
            source_paragraph_index: None,
            stories: vec![StoryNode::placeholder()],
        }
    }
}

/// Borrowed view of one node during a pre-order walk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeNode<'a> {
    pub level: StructuralLevel,
    pub text: &'a str,
    pub source_paragraph_index: Option<usize>,
}

/// Node counts per level, placeholders included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TreeCounts {
    pub summaries: usize,
    pub stories: usize,
    pub bodies: usize,
    pub placeholders: usize,
}

impl DocumentTree {
    /// A tree holding a single placeholder Summary/Story/Body triple.
    pub fn empty(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            title_paragraph_index: None,
            summaries: vec![SummaryNode::placeholder()],
        }
    }

    /// Pre-order walk: title (when it has a source paragraph), then each
    /// summary followed by its stories and their bodies.
    pub fn nodes(&self) -> Vec<TreeNode<'_>> {
        let mut out = Vec::new();
        if self.title_paragraph_index.is_some() {
            out.push(TreeNode {
                level: StructuralLevel::Title,
                text: &self.title,
                source_paragraph_index: self.title_paragraph_index,
            });
        }
        for summary in &self.summaries {
            out.push(TreeNode {
                level: StructuralLevel::Summary,
                text: &summary.text,
                source_paragraph_index: summary.source_paragraph_index,
            });
            for story in &summary.stories {
                out.push(TreeNode {
                    level: StructuralLevel::Story,
                    text: &story.text,
                    source_paragraph_index: story.source_paragraph_index,
                });
                for body in &story.bodies {
                    out.push(TreeNode {
                        level: StructuralLevel::Body,
                        text: &body.text,
                        source_paragraph_index: body.source_paragraph_index,
                    });
                }
            }
        }
        out
    }

    /// Nodes backed by a real paragraph, in document order.
    pub fn sourced_nodes(&self) -> Vec<TreeNode<'_>> {
        self.nodes()
            .into_iter()
            .filter(|n| n.source_paragraph_index.is_some())
            .collect()
    }

    pub fn counts(&self) -> TreeCounts {
        let mut counts = TreeCounts::default();
        for node in self.nodes() {
            match node.level {
                StructuralLevel::Summary => counts.summaries += 1,
                StructuralLevel::Story => counts.stories += 1,
                StructuralLevel::Body => counts.bodies += 1,
                _ => continue,
            }
            if node.source_paragraph_index.is_none() {
                counts.placeholders += 1;
            }
        }
        counts
    }

    /// Summary texts backed by real paragraphs.
    pub fn summary_texts(&self) -> Vec<&str> {
        self.summaries
            .iter()
            .filter(|s| s.source_paragraph_index.is_some())
            .map(|s| s.text.as_str())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// EvaluationResult
// ---------------------------------------------------------------------------

/// One criterion's verdict from the evaluation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub category: String,
    pub criteria_id: String,
    /// In `[0, 1]`.
    pub score: f64,
    /// 1 is the highest priority.
    pub priority: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicability_scope: Option<ApplicabilityScope>,
    #[serde(default)]
    pub feedback_lines: Vec<String>,
    #[serde(default)]
    pub improvement_lines: Vec<String>,
}

impl EvaluationResult {
    /// Feedback lines that actually report something.
    pub fn negative_feedback<'a>(&'a self, markers: &'a [String]) -> impl Iterator<Item = &'a str> {
        self.feedback_lines
            .iter()
            .map(|l| l.trim())
            .filter(move |l| !l.is_empty() && !is_marker(l, markers))
    }

    /// Non-empty improvement suggestions.
    pub fn suggestions(&self) -> impl Iterator<Item = &str> {
        self.improvement_lines
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
    }

    /// At least one real feedback line or at least one suggestion.
    pub fn has_valid_feedback(&self, markers: &[String]) -> bool {
        self.negative_feedback(markers).next().is_some() || self.suggestions().next().is_some()
    }
}

fn is_marker(line: &str, markers: &[String]) -> bool {
    let line = line.trim();
    markers.iter().any(|m| m.trim() == line)
}

// ---------------------------------------------------------------------------
// RoutedComment
// ---------------------------------------------------------------------------

/// An evaluation resolved onto one paragraph, with its rendered comment block.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedComment {
    pub target_paragraph_index: usize,
    pub rendered_text: String,
    pub source_evaluation: EvaluationResult,
}
