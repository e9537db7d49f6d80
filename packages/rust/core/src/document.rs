//! Access to the live document: paragraphs in, annotations out.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;

use storycheck_shared::{Paragraph, Result, StoryCheckError};
use tokio::sync::Mutex;
use tracing::debug;

/// The document a check pass reads from and annotates.
///
/// Every method may suspend. `write_annotation` can fail for one paragraph
/// without affecting the others.
pub trait DocumentAccessor: Send + Sync {
    fn list_paragraphs(&self) -> impl Future<Output = Result<Vec<Paragraph>>> + Send;

    fn read_title(&self) -> impl Future<Output = Result<String>> + Send;

    fn clear_all_annotations(&self) -> impl Future<Output = Result<()>> + Send;

    fn write_annotation(
        &self,
        paragraph_index: usize,
        text: &str,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// In-memory document.
///
/// Annotations accumulate per paragraph until cleared, the same way comments
/// pile up in a real editor.
#[derive(Debug, Default)]
pub struct MemoryDocument {
    title: String,
    paragraphs: Vec<Paragraph>,
    annotations: Mutex<BTreeMap<usize, Vec<String>>>,
    failing: BTreeSet<usize>,
}

impl MemoryDocument {
    pub fn new(title: impl Into<String>, paragraphs: Vec<Paragraph>) -> Self {
        Self {
            title: title.into(),
            paragraphs,
            ..Self::default()
        }
    }

    /// Start from existing annotations, e.g. left over from an earlier pass.
    pub fn with_annotations(mut self, annotations: BTreeMap<usize, Vec<String>>) -> Self {
        self.annotations = Mutex::new(annotations);
        self
    }

    /// Writes to these paragraphs fail as if the paragraph were locked.
    pub fn with_failing_writes(mut self, indices: impl IntoIterator<Item = usize>) -> Self {
        self.failing.extend(indices);
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn paragraphs(&self) -> &[Paragraph] {
        &self.paragraphs
    }

    /// Snapshot of the current annotations.
    pub async fn annotations(&self) -> BTreeMap<usize, Vec<String>> {
        self.annotations.lock().await.clone()
    }

    /// Total number of annotations across all paragraphs.
    pub async fn annotation_count(&self) -> usize {
        self.annotations.lock().await.values().map(Vec::len).sum()
    }
}

impl DocumentAccessor for MemoryDocument {
    async fn list_paragraphs(&self) -> Result<Vec<Paragraph>> {
        Ok(self.paragraphs.clone())
    }

    async fn read_title(&self) -> Result<String> {
        Ok(self.title.clone())
    }

    async fn clear_all_annotations(&self) -> Result<()> {
        let mut annotations = self.annotations.lock().await;
        debug!(cleared = annotations.len(), "annotations cleared");
        annotations.clear();
        Ok(())
    }

    async fn write_annotation(&self, paragraph_index: usize, text: &str) -> Result<()> {
        if paragraph_index >= self.paragraphs.len() {
            return Err(StoryCheckError::annotation(
                paragraph_index,
                format!("document has {} paragraphs", self.paragraphs.len()),
            ));
        }
        if self.failing.contains(&paragraph_index) {
            return Err(StoryCheckError::annotation(paragraph_index, "paragraph is locked"));
        }
        self.annotations
            .lock()
            .await
            .entry(paragraph_index)
            .or_default()
            .push(text.to_string());
        Ok(())
    }
}
