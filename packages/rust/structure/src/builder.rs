//! Structure builder.
//!
//! Single forward pass over the paragraphs with three open cursors (summary,
//! story, bodies of the open story). Whenever a level is missing from the
//! source, a placeholder node is inserted so every summary has a story and
//! every story has a body.

use storycheck_shared::{
    BodyNode, DocumentTree, Paragraph, StoryNode, StructuralLevel, SummaryNode,
};
use tracing::{debug, instrument};

use crate::classifier::{Classifier, ClassifierConfig, Signal};

/// Build a tree with the default classifier thresholds.
pub fn build(paragraphs: &[Paragraph]) -> DocumentTree {
    build_with(paragraphs, &ClassifierConfig::default())
}

/// Build a tree from the document's paragraphs.
///
/// The first non-blank paragraph is taken as the title when it is neither a
/// list item nor indented. Never fails: an empty or structureless document
/// yields a placeholder Summary/Story/Body triple.
#[instrument(skip_all, fields(paragraphs = paragraphs.len()))]
pub fn build_with(paragraphs: &[Paragraph], config: &ClassifierConfig) -> DocumentTree {
    let classifier = Classifier::new(config.clone());
    let mut cursor = Cursor::default();

    let mut title = String::new();
    let mut title_paragraph_index = None;
    let mut prior_level = StructuralLevel::Title;
    let mut seen_structure = false;

    for (index, paragraph) in paragraphs.iter().enumerate() {
        if paragraph.is_blank() {
            continue;
        }

        if !seen_structure && title_paragraph_index.is_none() && looks_like_title(paragraph, config) {
            title = paragraph.text.trim().to_string();
            title_paragraph_index = Some(index);
            seen_structure = true;
            continue;
        }

        let is_first = cursor.is_empty();
        let classification = classifier.classify(paragraph, is_first, prior_level);
        if matches!(
            classification.signal,
            Signal::OpeningFallback | Signal::DemotionFallback
        ) {
            debug!(
                index,
                level = %classification.level,
                signal = ?classification.signal,
                "no structural signal, using positional fallback"
            );
        }
        seen_structure = true;

        let text = paragraph.text.trim().to_string();
        match classification.level {
            StructuralLevel::Summary => cursor.open_summary(text, index),
            StructuralLevel::Story => cursor.open_story(text, index),
            StructuralLevel::Body => cursor.push_body(text, index),
            // Classify only yields these for blank paragraphs, skipped above.
            StructuralLevel::Title | StructuralLevel::Unknown => continue,
        }
        prior_level = classification.level;
    }

    let summaries = cursor.finish();
    debug!(
        summaries = summaries.len(),
        has_title = title_paragraph_index.is_some(),
        "document tree built"
    );

    DocumentTree {
        title,
        title_paragraph_index,
        summaries,
    }
}

/// A flush, non-list opening paragraph reads as the document title.
fn looks_like_title(paragraph: &Paragraph, config: &ClassifierConfig) -> bool {
    paragraph.list_level.is_none()
        && paragraph.first_line_indent_pt.abs() <= config.flat_tolerance_pt
        && paragraph.left_indent_pt.abs() <= config.flat_tolerance_pt
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Cursor {
    closed: Vec<SummaryNode>,
    summary: Option<SummaryNode>,
    story: Option<StoryNode>,
}

impl Cursor {
    fn is_empty(&self) -> bool {
        self.closed.is_empty() && self.summary.is_none() && self.story.is_none()
    }

    fn open_summary(&mut self, text: String, index: usize) {
        self.close_summary();
        self.summary = Some(SummaryNode {
            text,
            source_paragraph_index: Some(index),
            stories: Vec::new(),
        });
    }

    fn open_story(&mut self, text: String, index: usize) {
        self.close_story();
        self.ensure_summary(index);
        self.story = Some(StoryNode {
            text,
            source_paragraph_index: Some(index),
            bodies: Vec::new(),
        });
    }

    fn push_body(&mut self, text: String, index: usize) {
        if self.story.is_none() {
            self.ensure_summary(index);
            debug!(index, "body without an open story, inserting placeholder story");
            self.story = Some(StoryNode {
                bodies: Vec::new(),
                ..StoryNode::placeholder()
            });
        }
        if let Some(story) = self.story.as_mut() {
            story.bodies.push(BodyNode {
                text,
                source_paragraph_index: Some(index),
            });
        }
    }

    fn ensure_summary(&mut self, index: usize) {
        if self.summary.is_none() {
            debug!(index, "no open summary, inserting placeholder summary");
            self.summary = Some(SummaryNode {
                stories: Vec::new(),
                ..SummaryNode::placeholder()
            });
        }
    }

    fn close_story(&mut self) {
        let Some(mut story) = self.story.take() else {
            return;
        };
        if story.bodies.is_empty() {
            story.bodies.push(BodyNode::placeholder());
        }
        // A story is only ever opened under an open summary.
        if let Some(summary) = self.summary.as_mut() {
            summary.stories.push(story);
        }
    }

    fn close_summary(&mut self) {
        self.close_story();
        if let Some(mut summary) = self.summary.take() {
            if summary.stories.is_empty() {
                summary.stories.push(StoryNode::placeholder());
            }
            self.closed.push(summary);
        }
    }

    fn finish(mut self) -> Vec<SummaryNode> {
        self.close_summary();
        if self.closed.is_empty() {
            self.closed.push(SummaryNode::placeholder());
        }
        self.closed
    }
}
