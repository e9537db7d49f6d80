//! JSON-file document for the CLI.
//!
//! ```json
//! { "title": "…", "paragraphs": [{ "text": "…", "list_level": 0 }], "annotations": { "1": ["…"] } }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use storycheck_core::{DocumentAccessor, MemoryDocument};
use storycheck_shared::{Paragraph, Result, StoryCheckError};
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
struct DocumentFile {
    #[serde(default)]
    title: String,
    paragraphs: Vec<Paragraph>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    annotations: BTreeMap<usize, Vec<String>>,
}

/// A document loaded from disk and held in memory until saved.
#[derive(Debug)]
pub(crate) struct JsonDocument {
    path: PathBuf,
    inner: MemoryDocument,
}

impl JsonDocument {
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| StoryCheckError::io(path, e))?;
        let file: DocumentFile = serde_json::from_str(&raw)
            .map_err(|e| StoryCheckError::parse(format!("{}: {e}", path.display())))?;
        debug!(path = %path.display(), paragraphs = file.paragraphs.len(), "document loaded");

        Ok(Self {
            path: path.to_path_buf(),
            inner: MemoryDocument::new(file.title, file.paragraphs)
                .with_annotations(file.annotations),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn paragraphs(&self) -> &[Paragraph] {
        self.inner.paragraphs()
    }

    /// Write the document, annotations included, to `out`.
    pub(crate) async fn save(&self, out: &Path) -> Result<()> {
        let file = DocumentFile {
            title: self.inner.title().to_string(),
            paragraphs: self.inner.paragraphs().to_vec(),
            annotations: self.inner.annotations().await,
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| StoryCheckError::validation(format!("cannot serialize document: {e}")))?;
        std::fs::write(out, json).map_err(|e| StoryCheckError::io(out, e))?;
        debug!(path = %out.display(), "document saved");
        Ok(())
    }
}

impl DocumentAccessor for JsonDocument {
    async fn list_paragraphs(&self) -> Result<Vec<Paragraph>> {
        self.inner.list_paragraphs().await
    }

    async fn read_title(&self) -> Result<String> {
        self.inner.read_title().await
    }

    async fn clear_all_annotations(&self) -> Result<()> {
        self.inner.clear_all_annotations().await
    }

    async fn write_annotation(&self, paragraph_index: usize, text: &str) -> Result<()> {
        self.inner.write_annotation(paragraph_index, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "../../fixtures/json/sample-document.json";

    #[tokio::test]
    async fn loads_sample_document() {
        let doc = JsonDocument::load(Path::new(SAMPLE)).unwrap();
        assert_eq!(doc.read_title().await.unwrap(), "Quarterly business review");
        assert_eq!(doc.paragraphs().len(), 8);
        assert_eq!(doc.paragraphs()[1].list_level, Some(0));
        assert_eq!(doc.paragraphs()[5].first_line_indent_pt, -21.0);
        assert!(doc.inner.annotations().await.is_empty());
    }

    #[tokio::test]
    async fn save_round_trips_annotations() {
        let doc = JsonDocument::load(Path::new(SAMPLE)).unwrap();
        doc.write_annotation(1, "[サマリーの論理展開] SCQA有無").await.unwrap();

        let out = std::env::temp_dir().join(format!("storycheck-doc-{}.json", std::process::id()));
        doc.save(&out).await.unwrap();
        let reloaded = JsonDocument::load(&out).unwrap();
        std::fs::remove_file(&out).ok();

        let annotations = reloaded.inner.annotations().await;
        assert_eq!(annotations.len(), 1);
        assert_eq!(annotations[&1], vec!["[サマリーの論理展開] SCQA有無"]);
        assert_eq!(reloaded.paragraphs(), doc.paragraphs());
    }

    #[test]
    fn missing_and_invalid_files() {
        let err = JsonDocument::load(Path::new("../../fixtures/json/nope.json")).unwrap_err();
        assert!(matches!(err, StoryCheckError::Io { .. }));

        let err = JsonDocument::load(Path::new("../../fixtures/text/evaluation.txt")).unwrap_err();
        assert!(matches!(err, StoryCheckError::Parse { .. }));
    }
}
