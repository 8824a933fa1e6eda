use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::{
    CancellationToken, Destination, DocumentHandle, DocumentProvider, ExplicitDestination,
    OutlineNode, PageHandle, PageViewport, PixelRect, RenderError, RenderImage, TextContent,
    TextItem,
};

#[derive(Clone, Default)]
pub struct Gate {
    inner: Arc<GateInner>,
}

#[derive(Default)]
struct GateInner {
    open: AtomicBool,
    notify: Notify,
}

impl Gate {
    pub fn open(&self) {
        self.inner.open.store(true, Ordering::Release);
        self.inner.notify.notify_waiters();
    }

    async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.open.load(Ordering::Acquire) {
                return;
            }
            notified.await;
        }
    }
}

struct Shared {
    name: String,
    page_count: usize,
    named: HashMap<String, usize>,
    outline: Vec<OutlineNode>,
    gate: Option<Gate>,
    text_gate: Option<Gate>,
    completed: Mutex<Vec<(usize, f32)>>,
    released: AtomicBool,
    log: Arc<Mutex<Vec<String>>>,
}

#[derive(Clone)]
pub struct FakeDocument {
    shared: Arc<Shared>,
}

pub struct FakeDocumentBuilder {
    name: String,
    page_count: usize,
    named: HashMap<String, usize>,
    outline: Vec<OutlineNode>,
    gated: bool,
    text_gated: bool,
    log: Arc<Mutex<Vec<String>>>,
}

impl FakeDocumentBuilder {
    pub fn name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn named_destination(mut self, name: &str, page_index: usize) -> Self {
        self.named.insert(name.to_string(), page_index);
        self
    }

    pub fn outline(mut self, outline: Vec<OutlineNode>) -> Self {
        self.outline = outline;
        self
    }

    pub fn gated(mut self) -> Self {
        self.gated = true;
        self
    }

    /// Holds text extraction, after the raster commit, until opened.
    pub fn text_gated(mut self) -> Self {
        self.text_gated = true;
        self
    }

    fn log(mut self, log: Arc<Mutex<Vec<String>>>) -> Self {
        self.log = log;
        self
    }

    pub fn build(self) -> FakeDocument {
        FakeDocument {
            shared: Arc::new(Shared {
                name: self.name,
                page_count: self.page_count,
                named: self.named,
                outline: self.outline,
                gate: self.gated.then(Gate::default),
                text_gate: self.text_gated.then(Gate::default),
                completed: Mutex::new(Vec::new()),
                released: AtomicBool::new(false),
                log: self.log,
            }),
        }
    }
}

impl FakeDocument {
    pub const GLYPHS_PER_PAGE: usize = 20;
    pub const WIDTH_PTS: f32 = 612.0;
    pub const HEIGHT_PTS: f32 = 792.0;

    pub fn builder(page_count: usize) -> FakeDocumentBuilder {
        FakeDocumentBuilder {
            name: "fake.pdf".to_string(),
            page_count,
            named: HashMap::new(),
            outline: Vec::new(),
            gated: false,
            text_gated: false,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Gate holding every render until opened. Panics unless built `gated()`.
    pub fn gate(&self) -> Gate {
        self.shared.gate.clone().expect("document built without a gate")
    }

    pub fn text_gate(&self) -> Gate {
        self.shared
            .text_gate
            .clone()
            .expect("document built without a text gate")
    }

    /// `(page_index, scale)` of every render that ran to completion.
    pub fn completed_renders(&self) -> Vec<(usize, f32)> {
        self.shared.completed.lock().clone()
    }

    pub fn is_released(&self) -> bool {
        self.shared.released.load(Ordering::Acquire)
    }
}

#[async_trait]
impl DocumentHandle for FakeDocument {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn page_count(&self) -> usize {
        self.shared.page_count
    }

    async fn page(&self, number: usize) -> Result<Arc<dyn PageHandle>> {
        if number == 0 || number > self.shared.page_count {
            return Err(anyhow!("page {} out of range", number));
        }
        Ok(Arc::new(FakePage {
            index: number - 1,
            shared: Arc::clone(&self.shared),
        }))
    }

    async fn outline(&self) -> Result<Vec<OutlineNode>> {
        Ok(self.shared.outline.clone())
    }

    async fn resolve_named_destination(&self, name: &str) -> Result<Option<ExplicitDestination>> {
        if name == "broken" {
            return Err(anyhow!("destination table is corrupt"));
        }
        Ok(self
            .shared
            .named
            .get(name)
            .map(|&page_index| ExplicitDestination {
                page_index,
                top: None,
            }))
    }

    async fn page_index(&self, destination: &ExplicitDestination) -> Result<Option<usize>> {
        Ok(Some(destination.page_index))
    }

    fn release(&self) {
        self.shared.released.store(true, Ordering::Release);
        self.shared
            .log
            .lock()
            .push(format!("release:{}", self.shared.name));
    }
}

struct FakePage {
    index: usize,
    shared: Arc<Shared>,
}

#[async_trait]
impl PageHandle for FakePage {
    fn viewport(&self, scale: f32) -> PageViewport {
        PageViewport::from_points(FakeDocument::WIDTH_PTS, FakeDocument::HEIGHT_PTS, scale)
    }

    async fn render(
        &self,
        scale: f32,
        token: &CancellationToken,
    ) -> Result<RenderImage, RenderError> {
        if let Some(gate) = &self.shared.gate {
            gate.wait().await;
        }
        token.check()?;
        let viewport = self.viewport(scale);
        self.shared.completed.lock().push((self.index, scale));
        Ok(RenderImage::blank(
            viewport.pixel_width(),
            viewport.pixel_height(),
        ))
    }

    async fn text_content(&self, token: &CancellationToken) -> Result<TextContent, RenderError> {
        if let Some(gate) = &self.shared.text_gate {
            gate.wait().await;
        }
        token.check()?;
        let items = (0..FakeDocument::GLYPHS_PER_PAGE)
            .map(|glyph| TextItem {
                text: format!("p{}g{}", self.index, glyph),
                bounds: PixelRect::new(10.0 + glyph as f32 * 25.0, 50.0, 20.0, 12.0),
            })
            .collect();
        Ok(TextContent { items })
    }
}

/// Provider serving fake documents by name; unknown names fail to load.
#[derive(Clone, Default)]
pub struct FakeProvider {
    documents: Arc<Mutex<HashMap<String, (usize, Vec<OutlineNode>)>>>,
    log: Arc<Mutex<Vec<String>>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, name: &str, page_count: usize) -> Self {
        self.with_outline(name, page_count, Vec::new())
    }

    pub fn with_outline(self, name: &str, page_count: usize, outline: Vec<OutlineNode>) -> Self {
        self.documents
            .lock()
            .insert(name.to_string(), (page_count, outline));
        self
    }

    /// Ordered `open:<name>` / `release:<name>` entries.
    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

#[async_trait]
impl DocumentProvider for FakeProvider {
    async fn open(&self, name: &str) -> Result<Arc<dyn DocumentHandle>> {
        let entry = self.documents.lock().get(name).cloned();
        let (page_count, outline) = entry.ok_or_else(|| anyhow!("no such document {name}"))?;
        self.log.lock().push(format!("open:{name}"));
        let document = FakeDocument::builder(page_count)
            .name(name)
            .outline(outline)
            .named_destination("intro", 0)
            .log(Arc::clone(&self.log))
            .build();
        Ok(Arc::new(document))
    }
}

pub fn outline_node(
    title: &str,
    destination: Option<Destination>,
    children: Vec<OutlineNode>,
) -> OutlineNode {
    OutlineNode {
        title: title.to_string(),
        destination,
        children,
    }
}

pub fn explicit(page_index: usize) -> Option<Destination> {
    Some(Destination::Explicit(ExplicitDestination {
        page_index,
        top: None,
    }))
}
