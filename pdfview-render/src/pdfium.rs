use std::mem;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use pdfium_render::prelude::*;
use pdfview_core::{
    CancellationToken, Destination, DocumentHandle, DocumentProvider, DocumentSource,
    ExplicitDestination, OutlineNode, PageHandle, PageViewport, RenderError, RenderImage,
    TextContent, TextItem,
};
use tracing::{debug, info, instrument, warn};

use crate::{checked_page_index, flip_bounds};

/// Opens documents by name, fetching their bytes from a `DocumentSource`.
pub struct PdfiumProvider {
    pdfium: Arc<Pdfium>,
    source: Arc<dyn DocumentSource>,
}

impl PdfiumProvider {
    pub fn new(source: Arc<dyn DocumentSource>) -> Result<Self> {
        let pdfium = match bind_pdfium_from_build_hint() {
            Some(pdfium) => pdfium,
            None => bind_pdfium_default()?,
        };
        Ok(Self {
            pdfium: Arc::new(pdfium),
            source,
        })
    }
}

#[async_trait]
impl DocumentProvider for PdfiumProvider {
    #[instrument(skip(self))]
    async fn open(&self, name: &str) -> Result<Arc<dyn DocumentHandle>> {
        let bytes = self
            .source
            .fetch_document(name)
            .await
            .with_context(|| format!("failed to fetch {name}"))?;
        let document = PdfiumDocument::load(Arc::clone(&self.pdfium), name, bytes)?;
        info!(name, pages = document.page_count(), "loaded document");
        Ok(Arc::new(document))
    }
}

struct Loaded {
    // Declared before `pdfium` so the document drops first.
    document: Mutex<Option<PdfDocument<'static>>>,
    _pdfium: Arc<Pdfium>,
}

impl Loaded {
    fn with_document<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&PdfDocument<'static>) -> Result<R>,
    {
        let guard = self.document.lock();
        let Some(document) = guard.as_ref() else {
            bail!("document has been released");
        };
        f(document)
    }

    fn with_page<R, F>(&self, index: usize, f: F) -> Result<R>
    where
        F: FnOnce(&PdfPage<'_>) -> Result<R>,
    {
        self.with_document(|document| {
            let page_index: PdfPageIndex = index
                .try_into()
                .map_err(|_| anyhow!("page {} is out of supported range", index))?;
            let page = document
                .pages()
                .get(page_index)
                .with_context(|| format!("page {} out of range", index))?;
            f(&page)
        })
    }
}

pub struct PdfiumDocument {
    name: String,
    page_sizes: Vec<(f32, f32)>,
    loaded: Arc<Loaded>,
}

impl PdfiumDocument {
    fn load(pdfium: Arc<Pdfium>, name: &str, bytes: Vec<u8>) -> Result<Self> {
        let document = pdfium
            .load_pdf_from_byte_vec(bytes, None)
            .with_context(|| format!("failed to parse {name}"))?;
        // SAFETY: the document borrows the bindings owned by `pdfium`. Both are
        // kept in `Loaded`, where the document field is dropped first, and the
        // document is never handed out beyond a `with_document` call.
        let document = unsafe { mem::transmute::<PdfDocument<'_>, PdfDocument<'static>>(document) };

        let page_sizes = document
            .pages()
            .iter()
            .map(|page| (page.width().value, page.height().value))
            .collect();

        Ok(Self {
            name: name.to_string(),
            page_sizes,
            loaded: Arc::new(Loaded {
                document: Mutex::new(Some(document)),
                _pdfium: pdfium,
            }),
        })
    }
}

#[async_trait]
impl DocumentHandle for PdfiumDocument {
    fn name(&self) -> &str {
        &self.name
    }

    fn page_count(&self) -> usize {
        self.page_sizes.len()
    }

    async fn page(&self, number: usize) -> Result<Arc<dyn PageHandle>> {
        let index = number
            .checked_sub(1)
            .ok_or_else(|| anyhow!("page numbers start at 1"))?;
        let &(width_pts, height_pts) = self
            .page_sizes
            .get(index)
            .ok_or_else(|| anyhow!("page {} out of range", number))?;
        Ok(Arc::new(PdfiumPage {
            index,
            width_pts,
            height_pts,
            loaded: Arc::clone(&self.loaded),
        }))
    }

    async fn outline(&self) -> Result<Vec<OutlineNode>> {
        self.loaded.with_document(|document| {
            let mut nodes = Vec::new();
            if let Some(root) = document.bookmarks().root() {
                collect_outline(root, &mut nodes);
            }
            Ok(nodes)
        })
    }

    async fn resolve_named_destination(&self, name: &str) -> Result<Option<ExplicitDestination>> {
        // Pdfium's name tree is not exposed through the bindings.
        debug!(name, "named destinations are not supported by this backend");
        Ok(None)
    }

    async fn page_index(&self, destination: &ExplicitDestination) -> Result<Option<usize>> {
        Ok(checked_page_index(destination.page_index, self.page_count()))
    }

    fn release(&self) {
        if self.loaded.document.lock().take().is_some() {
            debug!(name = %self.name, "released pdfium document");
        }
    }
}

struct PdfiumPage {
    index: usize,
    width_pts: f32,
    height_pts: f32,
    loaded: Arc<Loaded>,
}

#[async_trait]
impl PageHandle for PdfiumPage {
    fn viewport(&self, scale: f32) -> PageViewport {
        PageViewport::from_points(self.width_pts, self.height_pts, scale)
    }

    #[instrument(skip(self, token), fields(page = self.index))]
    async fn render(
        &self,
        scale: f32,
        token: &CancellationToken,
    ) -> Result<RenderImage, RenderError> {
        token.check()?;
        let viewport = self.viewport(scale);
        let width = i32::try_from(viewport.pixel_width())
            .map_err(|_| anyhow!("page {} is too wide to render", self.index))?;
        let height = i32::try_from(viewport.pixel_height())
            .map_err(|_| anyhow!("page {} is too tall to render", self.index))?;

        let image = self.loaded.with_page(self.index, |page| {
            let config = PdfRenderConfig::new()
                .set_target_width(width)
                .set_maximum_height(height);
            let bitmap = page
                .render_with_config(&config)
                .with_context(|| format!("failed to render page {}", self.index))?;
            let pixels = bitmap.as_image().to_rgba8().into_raw();
            Ok(RenderImage {
                width: u32::try_from(bitmap.width()).unwrap_or_default(),
                height: u32::try_from(bitmap.height()).unwrap_or_default(),
                pixels,
            })
        })?;
        token.check()?;
        Ok(image)
    }

    async fn text_content(&self, token: &CancellationToken) -> Result<TextContent, RenderError> {
        token.check()?;
        let height_pts = self.height_pts;
        let items = self.loaded.with_page(self.index, |page| {
            let text = page
                .text()
                .with_context(|| format!("failed to extract text for page {}", self.index))?;
            let items = text
                .segments()
                .iter()
                .filter_map(|segment| {
                    let text = segment.text();
                    if text.trim().is_empty() {
                        return None;
                    }
                    let bounds = segment.bounds();
                    Some(TextItem {
                        text,
                        bounds: flip_bounds(
                            bounds.left().value,
                            bounds.bottom().value,
                            bounds.right().value,
                            bounds.top().value,
                            height_pts,
                        ),
                    })
                })
                .collect();
            Ok(items)
        })?;
        Ok(TextContent { items })
    }
}

fn collect_outline(mut bookmark: PdfBookmark<'_>, out: &mut Vec<OutlineNode>) {
    loop {
        let mut children = Vec::new();
        if let Some(child) = bookmark.first_child() {
            collect_outline(child, &mut children);
        }
        out.push(OutlineNode {
            title: bookmark.title().unwrap_or_default(),
            destination: bookmark_destination(&bookmark),
            children,
        });

        match bookmark.next_sibling() {
            Some(next) => bookmark = next,
            None => break,
        }
    }
}

fn bookmark_destination(bookmark: &PdfBookmark<'_>) -> Option<Destination> {
    let from_action = bookmark.action().and_then(|action| {
        let local = action.as_local_destination_action()?;
        local.destination().ok()?.page_index().ok()
    });
    let page_index = match from_action {
        Some(index) => index,
        None => bookmark.destination()?.page_index().ok()?,
    };
    Some(Destination::Explicit(ExplicitDestination {
        page_index: page_index as usize,
        top: None,
    }))
}

fn bind_pdfium_from_build_hint() -> Option<Pdfium> {
    match option_env!("PDFVIEW_PDFIUM_LIBRARY_PATH") {
        Some(path) if !path.is_empty() => match Pdfium::bind_to_library(path) {
            Ok(bindings) => Some(Pdfium::new(bindings)),
            Err(err) => {
                warn!(%err, path, "failed to load Pdfium from build-provided path");
                None
            }
        },
        _ => None,
    }
}

fn bind_pdfium_default() -> Result<Pdfium> {
    let mut errors = Vec::new();

    let cwd_path = Pdfium::pdfium_platform_library_name_at_path("./");
    match Pdfium::bind_to_library(&cwd_path) {
        Ok(bindings) => return Ok(Pdfium::new(bindings)),
        Err(err) => errors.push(format!("{}: {}", cwd_path.display(), err)),
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(err) => {
            errors.push(format!("system: {err}"));
            Err(anyhow!(
                "failed to bind to a pdfium library; ensure it is installed ({})",
                errors.join(", ")
            ))
        }
    }
}
