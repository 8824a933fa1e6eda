//! Per-page render orchestration.
//!
//! A `PageView` owns the page handle, the raster surface and the text layer of
//! one page. At most one render task runs per page; starting a new one cancels
//! the previous task before anything else happens, and a cancelled task never
//! commits output.

use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::{
    CancellationToken, ContainerId, DocumentHandle, GlyphSpan, PageHandle, PageSurface,
    PageViewport, PixelRect, RenderError, TextContent, TextLayer, TextNode,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageEvent {
    Rendered { page: usize, scale: f32 },
    TextLayerReady { page: usize, nodes: usize },
}

struct RenderTask {
    token: CancellationToken,
    scale: f32,
    join: JoinHandle<()>,
}

pub struct PageView {
    index: usize,
    container: ContainerId,
    handle: Arc<dyn PageHandle>,
    surface: Arc<Mutex<PageSurface>>,
    text_layer: Arc<Mutex<TextLayer>>,
    task: Option<RenderTask>,
    events: Option<UnboundedSender<PageEvent>>,
}

impl PageView {
    /// Fetches and caches the page handle for 0-based `index`.
    pub async fn mount(document: &dyn DocumentHandle, index: usize) -> Result<Self> {
        let handle = document
            .page(index + 1)
            .await
            .with_context(|| format!("failed to fetch page {}", index + 1))?;
        Ok(Self::from_handle(index, handle))
    }

    pub fn from_handle(index: usize, handle: Arc<dyn PageHandle>) -> Self {
        Self {
            index,
            container: ContainerId::new(),
            handle,
            surface: Arc::new(Mutex::new(PageSurface::new())),
            text_layer: Arc::new(Mutex::new(TextLayer::new())),
            task: None,
            events: None,
        }
    }

    pub fn with_events(mut self, events: UnboundedSender<PageEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn container(&self) -> ContainerId {
        self.container
    }

    pub fn viewport(&self, scale: f32) -> PageViewport {
        self.handle.viewport(scale)
    }

    pub fn surface(&self) -> Arc<Mutex<PageSurface>> {
        Arc::clone(&self.surface)
    }

    pub fn text_layer(&self) -> Arc<Mutex<TextLayer>> {
        Arc::clone(&self.text_layer)
    }

    /// Scale of the in-flight render, if one is running.
    pub fn pending_scale(&self) -> Option<f32> {
        self.task
            .as_ref()
            .filter(|task| !task.join.is_finished())
            .map(|task| task.scale)
    }

    /// Whether the page still lacks output for `scale`.
    pub fn needs_render(&self, scale: f32) -> bool {
        if self.pending_scale() == Some(scale) {
            return false;
        }
        self.surface.lock().scale() != Some(scale)
    }

    /// Starts rendering at `scale`, cancelling any in-flight render first.
    pub fn render(&mut self, scale: f32) {
        self.cancel();

        let viewport = self.handle.viewport(scale);
        self.surface.lock().resize_to(&viewport);
        self.text_layer.lock().set_frame(PixelRect::new(
            0.0,
            0.0,
            viewport.pixel_width() as f32,
            viewport.pixel_height() as f32,
        ));

        let token = CancellationToken::new();
        let job = RenderJob {
            page: self.index,
            scale,
            handle: Arc::clone(&self.handle),
            surface: Arc::clone(&self.surface),
            text_layer: Arc::clone(&self.text_layer),
            token: token.clone(),
            events: self.events.clone(),
        };
        let join = tokio::spawn(async move {
            let page = job.page;
            match job.run().await {
                Ok(()) => {}
                Err(RenderError::Cancelled) => debug!(page, "render cancelled"),
                Err(RenderError::Failed(err)) => warn!(?err, page, "render failed"),
            }
        });

        self.task = Some(RenderTask { token, scale, join });
    }

    /// Cancels the in-flight render, if any.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.token.cancel();
        }
    }

    /// Cancels rendering and drops the committed image. Used when the page
    /// scrolls out of view.
    pub fn suspend(&mut self) {
        self.cancel();
        self.surface.lock().release();
    }

    pub fn set_selection_span(&self, span: Option<GlyphSpan>) {
        self.text_layer.lock().set_marked(span);
    }

    /// Waits for the in-flight render to finish or observe its cancellation.
    pub async fn settle(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(err) = task.join.await {
                warn!(?err, page = self.index, "render task aborted");
            }
        }
    }
}

impl Drop for PageView {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct RenderJob {
    page: usize,
    scale: f32,
    handle: Arc<dyn PageHandle>,
    surface: Arc<Mutex<PageSurface>>,
    text_layer: Arc<Mutex<TextLayer>>,
    token: CancellationToken,
    events: Option<UnboundedSender<PageEvent>>,
}

impl RenderJob {
    #[instrument(skip(self), fields(page = self.page, scale = self.scale))]
    async fn run(self) -> Result<(), RenderError> {
        tokio::task::yield_now().await;

        let image = self
            .token
            .run(self.handle.render(self.scale, &self.token))
            .await?;
        {
            let mut surface = self.surface.lock();
            self.token.check()?;
            surface.commit(image, self.scale);
        }
        self.emit(PageEvent::Rendered {
            page: self.page,
            scale: self.scale,
        });

        let content = self
            .token
            .run(self.handle.text_content(&self.token))
            .await?;
        let nodes = text_nodes(&content, self.scale);
        let count = nodes.len();
        {
            let mut layer = self.text_layer.lock();
            self.token.check()?;
            layer.clear();
            layer.replace_nodes(nodes);
        }
        self.emit(PageEvent::TextLayerReady {
            page: self.page,
            nodes: count,
        });
        Ok(())
    }

    fn emit(&self, event: PageEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

fn text_nodes(content: &TextContent, scale: f32) -> Vec<TextNode> {
    content
        .items
        .iter()
        .map(|item| TextNode {
            text: item.text.clone(),
            frame: item.bounds.scaled(scale),
            marked: false,
        })
        .collect()
}
