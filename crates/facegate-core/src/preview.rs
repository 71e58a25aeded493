//! Local file selections and their thumbnail previews.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinSet;

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("no file at index {index} (selection has {len})")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("files can only be removed from a multi-file selection")]
    NotMultiple,
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A file picked by the operator, held in memory until upload.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub name: String,
    pub mime: String,
    pub bytes: Arc<[u8]>,
}

impl SelectedFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, PreviewError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|source| PreviewError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let mime = mime_for(&name);
        Ok(Self::new(name, mime, bytes))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lowercased extension, if any.
    pub fn extension(&self) -> Option<String> {
        let (_, ext) = self.name.rsplit_once('.')?;
        Some(ext.to_ascii_lowercase())
    }
}

/// MIME type for a file name, by extension.
pub fn mime_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, e)| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

/// Encode bytes as a `data:` URL.
pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// One rendered preview.
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    /// Position of the file in the selection at render time.
    pub index: usize,
    pub name: String,
    pub data_url: String,
    pub removable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Single,
    Multiple,
}

/// A file input and its current selection.
#[derive(Debug, Clone)]
pub struct FileInput {
    kind: InputKind,
    files: Vec<SelectedFile>,
}

impl FileInput {
    pub fn single() -> Self {
        Self {
            kind: InputKind::Single,
            files: Vec::new(),
        }
    }

    pub fn multiple() -> Self {
        Self {
            kind: InputKind::Multiple,
            files: Vec::new(),
        }
    }

    pub fn kind(&self) -> InputKind {
        self.kind
    }

    pub fn files(&self) -> &[SelectedFile] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Replace the selection. A single input keeps only the first file.
    pub fn select(&mut self, mut files: Vec<SelectedFile>) {
        if self.kind == InputKind::Single {
            files.truncate(1);
        }
        self.files = files;
    }

    pub fn clear(&mut self) {
        self.files.clear();
    }

    /// Rebuild the selection without the file at `index`.
    pub fn remove(&mut self, index: usize) -> Result<SelectedFile, PreviewError> {
        if self.kind != InputKind::Multiple {
            return Err(PreviewError::NotMultiple);
        }
        if index >= self.files.len() {
            return Err(PreviewError::IndexOutOfRange {
                index,
                len: self.files.len(),
            });
        }
        let removed = self.files.remove(index);
        tracing::debug!(index, name = %removed.name, remaining = self.files.len(), "removed file from selection");
        Ok(removed)
    }

    /// Render thumbnails for the current selection.
    ///
    /// Every file of a multi-file input is encoded independently and
    /// thumbnails are returned in completion order, which need not match
    /// selection order.
    pub async fn previews(&self) -> Vec<Thumbnail> {
        match self.kind {
            InputKind::Single => self
                .files
                .first()
                .map(|f| Thumbnail {
                    index: 0,
                    name: f.name.clone(),
                    data_url: data_url(&f.mime, &f.bytes),
                    removable: false,
                })
                .into_iter()
                .collect(),
            InputKind::Multiple => {
                let mut set = JoinSet::new();
                for (index, file) in self.files.iter().cloned().enumerate() {
                    set.spawn_blocking(move || Thumbnail {
                        index,
                        data_url: data_url(&file.mime, &file.bytes),
                        name: file.name,
                        removable: true,
                    });
                }
                let mut out = Vec::with_capacity(self.files.len());
                while let Some(res) = set.join_next().await {
                    match res {
                        Ok(thumb) => out.push(thumb),
                        Err(e) => tracing::warn!(error = %e, "thumbnail task failed"),
                    }
                }
                out
            }
        }
    }

    /// Remove a file and re-render every remaining preview.
    pub async fn remove_and_preview(
        &mut self,
        index: usize,
    ) -> Result<Vec<Thumbnail>, PreviewError> {
        self.remove(index)?;
        Ok(self.previews().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str) -> SelectedFile {
        SelectedFile::new(name, mime_for(name), name.as_bytes().to_vec())
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for("a.JPG"), "image/jpeg");
        assert_eq!(mime_for("b.png"), "image/png");
        assert_eq!(mime_for("noext"), "application/octet-stream");
    }

    #[test]
    fn test_data_url() {
        assert_eq!(data_url("image/png", b"hi"), "data:image/png;base64,aGk=");
    }

    #[test]
    fn test_single_keeps_first_file() {
        let mut input = FileInput::single();
        input.select(vec![file("a.png"), file("b.png")]);
        assert_eq!(input.files().len(), 1);
        assert_eq!(input.files()[0].name, "a.png");
    }

    #[tokio::test]
    async fn test_single_preview_not_removable() {
        let mut input = FileInput::single();
        input.select(vec![file("a.png")]);
        let thumbs = input.previews().await;
        assert_eq!(thumbs.len(), 1);
        assert!(!thumbs[0].removable);
        assert!(matches!(input.remove(0), Err(PreviewError::NotMultiple)));
    }

    #[tokio::test]
    async fn test_remove_excludes_exactly_that_entry() {
        let mut input = FileInput::multiple();
        input.select(vec![file("a.png"), file("b.png"), file("c.png"), file("d.png")]);

        let thumbs = input.remove_and_preview(1).await.unwrap();

        let names: Vec<&str> = input.files().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "c.png", "d.png"]);
        assert_eq!(thumbs.len(), 3);
        let mut indices: Vec<usize> = thumbs.iter().map(|t| t.index).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(thumbs.iter().all(|t| t.removable && t.name != "b.png"));
    }

    #[test]
    fn test_remove_out_of_range() {
        let mut input = FileInput::multiple();
        input.select(vec![file("a.png")]);
        let err = input.remove(3).unwrap_err();
        assert!(matches!(err, PreviewError::IndexOutOfRange { index: 3, len: 1 }));
        assert_eq!(input.files().len(), 1);
    }

    #[tokio::test]
    async fn test_from_path_missing_file() {
        let err = SelectedFile::from_path("/nonexistent/facegate/x.png")
            .await
            .unwrap_err();
        assert!(matches!(err, PreviewError::Read { .. }));
    }
}
