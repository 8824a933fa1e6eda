use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub path: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentIndex {
    #[serde(default)]
    pub items: Vec<CatalogEntry>,
}

impl DocumentIndex {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch_index(&self) -> Result<DocumentIndex>;
    async fn fetch_document(&self, path: &str) -> Result<Vec<u8>>;
}

/// Fetches the document index for the picker. Any failure leaves the picker
/// empty.
pub async fn load_catalog(source: &dyn DocumentSource) -> DocumentIndex {
    match source.fetch_index().await {
        Ok(index) => index,
        Err(err) => {
            debug!(?err, "document index unavailable");
            DocumentIndex::default()
        }
    }
}

/// Serves documents from a local directory laid out like the `documents/`
/// route: an optional `index.json` next to the PDF files.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn scan(&self) -> Result<DocumentIndex> {
        let mut items = Vec::new();
        for entry in fs::read_dir(&self.root)
            .with_context(|| format!("failed to list {:?}", self.root))?
        {
            let path = entry?.path();
            let is_pdf = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map_or(false, |ext| ext.eq_ignore_ascii_case("pdf"));
            if !is_pdf {
                continue;
            }
            if let Some(file_name) = path.file_name().and_then(|name| name.to_str()) {
                items.push(CatalogEntry {
                    path: file_name.to_string(),
                    name: file_name.to_string(),
                });
            }
        }
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(DocumentIndex { items })
    }
}

#[async_trait]
impl DocumentSource for DirectorySource {
    async fn fetch_index(&self) -> Result<DocumentIndex> {
        let index_path = self.root.join("index.json");
        if !index_path.exists() {
            return self.scan();
        }
        let raw = fs::read_to_string(&index_path)
            .with_context(|| format!("failed to read {:?}", index_path))?;
        let index = serde_json::from_str(&raw)
            .with_context(|| format!("failed to decode {:?}", index_path))?;
        Ok(index)
    }

    async fn fetch_document(&self, path: &str) -> Result<Vec<u8>> {
        let relative = sanitize_relative(path)?;
        let full = self.root.join(relative);
        fs::read(&full).with_context(|| format!("failed to read document {:?}", full))
    }
}

/// Rejects paths that would escape the documents root.
pub fn sanitize_relative(path: &str) -> Result<&Path> {
    let candidate = Path::new(path);
    let escapes = candidate.components().any(|component| {
        !matches!(component, Component::Normal(_) | Component::CurDir)
    });
    if path.is_empty() || escapes {
        return Err(anyhow!("invalid document path {path:?}"));
    }
    Ok(candidate)
}
