use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{CancellationToken, PageViewport, PixelRect, RenderImage};

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("render task was cancelled")]
    Cancelled,
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Text run extracted from a page, positioned in PDF points with a top-left
/// origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextItem {
    pub text: String,
    pub bounds: PixelRect,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub items: Vec<TextItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExplicitDestination {
    pub page_index: usize,
    pub top: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Destination {
    Named(String),
    Explicit(ExplicitDestination),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineNode {
    pub title: String,
    pub destination: Option<Destination>,
    pub children: Vec<OutlineNode>,
}

#[async_trait]
pub trait DocumentProvider: Send + Sync {
    async fn open(&self, name: &str) -> Result<Arc<dyn DocumentHandle>>;
}

#[async_trait]
pub trait DocumentHandle: Send + Sync {
    fn name(&self) -> &str;
    fn page_count(&self) -> usize;
    /// Fetches a page by its 1-based number.
    async fn page(&self, number: usize) -> Result<Arc<dyn PageHandle>>;
    async fn outline(&self) -> Result<Vec<OutlineNode>>;
    async fn resolve_named_destination(&self, name: &str) -> Result<Option<ExplicitDestination>>;
    async fn page_index(&self, destination: &ExplicitDestination) -> Result<Option<usize>>;
    /// Frees library-side resources. The handle must not be used afterwards.
    fn release(&self);
}

#[async_trait]
pub trait PageHandle: Send + Sync {
    fn viewport(&self, scale: f32) -> PageViewport;
    async fn render(&self, scale: f32, token: &CancellationToken)
        -> Result<RenderImage, RenderError>;
    async fn text_content(&self, token: &CancellationToken) -> Result<TextContent, RenderError>;
}

/// Resolves a destination to a 0-based page index. Failures and unknown
/// destinations both yield `None`.
pub async fn resolve_page_index(
    document: &dyn DocumentHandle,
    destination: &Destination,
) -> Option<usize> {
    let explicit = match destination {
        Destination::Explicit(explicit) => *explicit,
        Destination::Named(name) => match document.resolve_named_destination(name).await {
            Ok(Some(explicit)) => explicit,
            Ok(None) => return None,
            Err(err) => {
                debug!(?err, name = %name, "named destination lookup failed");
                return None;
            }
        },
    };

    match document.page_index(&explicit).await {
        Ok(index) => index.filter(|&index| index < document.page_count()),
        Err(err) => {
            debug!(?err, page = explicit.page_index, "destination lookup failed");
            None
        }
    }
}
