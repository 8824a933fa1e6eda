use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, instrument, warn};

use crate::visibility::is_visible;
use crate::{
    current_page_after, decode_fragment, encode_fragment, load_catalog, map_selection,
    resolve_page_index, ContainerId, Destination, DocumentHandle, DocumentIndex, DocumentLayout,
    DocumentProvider, DocumentSource, LocationStore, OutlinePath, OutlineTree, PageEvent,
    PageView, RawSelection, SelectionOutcome, SelectionPoint, SelectionRange, SelectionTarget,
    StateChange, StateContainer, Transition, ViewLocation, ViewerConfig, ViewerState,
    VisibilityDispatcher,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Idle,
    Loading(String),
    Ready,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ScrollBy { delta: f32 },
    ScrollTo { offset: f32 },
    GotoPage { page: usize },
    NextPage { count: usize },
    PrevPage { count: usize },
    /// Positive steps zoom in.
    Zoom { steps: i32 },
    ResetScale,
    Resize { width: f32, height: f32 },
    OpenDocument { name: String },
    ClearSelection,
}

pub struct Viewer {
    config: ViewerConfig,
    provider: Arc<dyn DocumentProvider>,
    state: StateContainer,
    status: LoadStatus,
    document: Option<Arc<dyn DocumentHandle>>,
    pages: Vec<PageView>,
    layout: DocumentLayout,
    dispatcher: VisibilityDispatcher,
    outline: OutlineTree,
    catalog: DocumentIndex,
    scroll_top: f32,
    viewport_width: f32,
    viewport_height: f32,
    events_tx: UnboundedSender<PageEvent>,
    events_rx: Option<UnboundedReceiver<PageEvent>>,
}

impl Viewer {
    pub fn new(
        config: ViewerConfig,
        provider: Arc<dyn DocumentProvider>,
        store: Arc<dyn LocationStore>,
        viewport_width: f32,
        viewport_height: f32,
    ) -> Self {
        let config = config.sanitized();
        let mut state = StateContainer::new(ViewerState::new(config.initial_scale));
        state.subscribe(move |state, change| {
            if change == StateChange::Scale {
                return;
            }
            if let Some(location) = state.location() {
                if let Err(err) = store.save(&encode_fragment(&location)) {
                    warn!(?err, "failed to persist location");
                }
            }
        });
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            dispatcher: VisibilityDispatcher::new(config.presumed_visible_pages),
            config,
            provider,
            state,
            status: LoadStatus::Idle,
            document: None,
            pages: Vec::new(),
            layout: DocumentLayout::default(),
            outline: OutlineTree::default(),
            catalog: DocumentIndex::default(),
            scroll_top: 0.0,
            viewport_width: viewport_width.max(1.0),
            viewport_height: viewport_height.max(1.0),
            events_tx,
            events_rx: Some(events_rx),
        }
    }

    /// Receiver for render completions. Can be taken once.
    pub fn take_page_events(&mut self) -> Option<UnboundedReceiver<PageEvent>> {
        self.events_rx.take()
    }

    pub fn state(&self) -> &ViewerState {
        self.state.get()
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn status(&self) -> &LoadStatus {
        &self.status
    }

    pub fn document(&self) -> Option<&Arc<dyn DocumentHandle>> {
        self.document.as_ref()
    }

    pub fn pages(&self) -> &[PageView] {
        &self.pages
    }

    pub fn layout(&self) -> &DocumentLayout {
        &self.layout
    }

    pub fn outline(&self) -> &OutlineTree {
        &self.outline
    }

    pub fn catalog(&self) -> &DocumentIndex {
        &self.catalog
    }

    pub fn scroll_top(&self) -> f32 {
        self.scroll_top
    }

    pub fn viewport_size(&self) -> (f32, f32) {
        (self.viewport_width, self.viewport_height)
    }

    pub fn visible_pages(&self) -> Vec<usize> {
        self.dispatcher.visible_pages()
    }

    pub fn location(&self) -> Option<ViewLocation> {
        self.state.get().location()
    }

    /// "page N of M" indicator, e.g. `5/10`.
    pub fn page_indicator(&self) -> Option<String> {
        let document = self.document.as_ref()?;
        Some(format!(
            "{}/{}",
            self.state.get().current_page_index + 1,
            document.page_count()
        ))
    }

    pub async fn refresh_catalog(&mut self, source: &dyn DocumentSource) {
        self.catalog = load_catalog(source).await;
        debug!(items = self.catalog.items.len(), "document index loaded");
    }

    /// Restores a deep link. Malformed fragments are logged and ignored.
    /// Returns whether the linked document is open afterwards.
    pub async fn restore(&mut self, fragment: &str) -> bool {
        match decode_fragment(fragment) {
            Ok(location) => {
                self.open_location(location).await;
                self.status == LoadStatus::Ready
            }
            Err(err) => {
                warn!(%err, "ignoring malformed location fragment");
                false
            }
        }
    }

    pub async fn open_location(&mut self, location: ViewLocation) {
        self.open_document(&location.document_name).await;
        self.set_selection(location.selection);
        self.goto_page(location.page_index);
    }

    /// Switches to `name`, releasing the current document first. A load
    /// failure is logged and leaves the viewer in the loading state.
    #[instrument(skip(self))]
    pub async fn open_document(&mut self, name: &str) {
        let already_open = self.state.get().document_name.as_deref() == Some(name)
            && self.status == LoadStatus::Ready;
        if already_open {
            return;
        }

        self.unload();
        self.state.set_document_name(Some(name.to_string()));
        self.state.set_current_page(0);
        self.set_selection(None);
        self.status = LoadStatus::Loading(name.to_string());

        let document = match self.provider.open(name).await {
            Ok(document) => document,
            Err(err) => {
                warn!(?err, name, "document failed to load");
                return;
            }
        };

        let mut pages = Vec::with_capacity(document.page_count());
        for index in 0..document.page_count() {
            match PageView::mount(document.as_ref(), index).await {
                Ok(page) => pages.push(page.with_events(self.events_tx.clone())),
                Err(err) => {
                    warn!(?err, name, page = index, "page failed to load");
                    document.release();
                    return;
                }
            }
        }

        let outline = match document.outline().await {
            Ok(outline) => outline,
            Err(err) => {
                debug!(?err, name, "outline unavailable");
                Vec::new()
            }
        };

        info!(name, pages = pages.len(), "document opened");
        self.document = Some(document);
        self.pages = pages;
        self.outline = OutlineTree::new(outline);
        self.status = LoadStatus::Ready;
        self.scroll_top = 0.0;
        self.relayout();
        self.mount_pages();
    }

    fn unload(&mut self) {
        for page in self.pages.iter_mut() {
            page.cancel();
        }
        self.pages.clear();
        self.dispatcher.clear();
        self.outline = OutlineTree::default();
        self.layout = DocumentLayout::default();
        if let Some(document) = self.document.take() {
            debug!(name = document.name(), "releasing document");
            document.release();
        }
        self.status = LoadStatus::Idle;
    }

    fn relayout(&mut self) {
        let scale = self.state.get().scale;
        let viewports: Vec<_> = self.pages.iter().map(|page| page.viewport(scale)).collect();
        self.layout = DocumentLayout::new(&viewports, self.config.page_gap);
    }

    fn mount_pages(&mut self) {
        let mut transitions = Vec::new();
        for page in 0..self.pages.len() {
            let Some(rect) = self
                .layout
                .page_rect(page, self.scroll_top, self.viewport_width)
            else {
                continue;
            };
            if let Some(transition) = self.dispatcher.register(page, &rect, self.viewport_height)
            {
                transitions.push((page, transition));
            }
        }
        self.apply_transitions(transitions);
        self.render_visible();
    }

    fn render_visible(&mut self) {
        let scale = self.state.get().scale;
        for index in self.dispatcher.visible_pages() {
            if let Some(page) = self.pages.get_mut(index) {
                if page.needs_render(scale) {
                    page.render(scale);
                }
            }
        }
    }

    fn apply_transitions(&mut self, transitions: Vec<(usize, Transition)>) {
        if transitions.is_empty() {
            return;
        }
        let scale = self.state.get().scale;
        let mut current = self.state.get().current_page_index;
        for (index, transition) in transitions {
            debug!(page = index, ?transition, "visibility changed");
            current = current_page_after(current, index, transition);
            let Some(page) = self.pages.get_mut(index) else {
                continue;
            };
            if transition.is_enter() {
                if page.needs_render(scale) {
                    page.render(scale);
                }
            } else {
                page.suspend();
            }
        }
        let last = self.pages.len().saturating_sub(1);
        self.state.set_current_page(current.min(last));
    }

    fn dispatch_scroll(&mut self) {
        let layout = &self.layout;
        let scroll_top = self.scroll_top;
        let viewport_width = self.viewport_width;
        let transitions = self.dispatcher.dispatch(
            |page| layout.page_rect(page, scroll_top, viewport_width),
            self.viewport_height,
        );
        self.apply_transitions(transitions);
    }

    pub fn scroll_to(&mut self, offset: f32) {
        self.scroll_top = self.layout.clamp_scroll(offset, self.viewport_height);
        self.dispatch_scroll();
    }

    pub fn scroll_by(&mut self, delta: f32) {
        self.scroll_to(self.scroll_top + delta);
    }

    /// Makes `page` current and scrolls its top edge into view.
    pub fn goto_page(&mut self, page: usize) {
        if self.pages.is_empty() {
            return;
        }
        let page = page.min(self.pages.len() - 1);
        if let Some(top) = self.layout.top_of(page) {
            self.scroll_to(top);
        }
        self.state.set_current_page(page);
    }

    /// Applies wheel input. Positive ticks scroll down; with `ctrl` held the
    /// wheel zooms instead, wheel-up zooming in.
    pub fn on_wheel(&mut self, ticks: i32, ctrl: bool) {
        if ctrl {
            self.zoom(-ticks);
        } else {
            self.scroll_by(ticks as f32 * self.config.scroll_step);
        }
    }

    /// Multiplies the scale by `1 ± zoom_step` per step.
    pub fn zoom(&mut self, steps: i32) {
        if steps == 0 {
            return;
        }
        let factor = if steps > 0 {
            1.0 + self.config.zoom_step
        } else {
            1.0 - self.config.zoom_step
        };
        let scale = self.state.get().scale * factor.powi(steps.abs());
        self.set_scale(scale);
    }

    pub fn set_scale(&mut self, scale: f32) {
        let scale = self.config.clamp_scale(scale);
        let previous = self.state.get().scale;
        if (previous - scale).abs() <= f32::EPSILON {
            return;
        }

        let anchor = self.state.get().current_page_index;
        let offset_in_page = self
            .layout
            .top_of(anchor)
            .map(|top| self.scroll_top - top)
            .unwrap_or(0.0);

        self.state.set_scale(scale);
        self.relayout();

        let ratio = scale / previous;
        let target = self
            .layout
            .top_of(anchor)
            .map(|top| top + offset_in_page * ratio)
            .unwrap_or(0.0);
        self.scroll_top = self.layout.clamp_scroll(target, self.viewport_height);
        self.dispatch_scroll();
        self.render_visible();
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.viewport_width = width.max(1.0);
        self.viewport_height = height.max(1.0);
        self.scroll_top = self.layout.clamp_scroll(self.scroll_top, self.viewport_height);
        self.dispatch_scroll();
        self.render_visible();
    }

    /// Translates a viewport point into a selection endpoint.
    pub fn selection_point_at(&self, x: f32, y: f32) -> SelectionPoint {
        let outside = SelectionPoint {
            target: SelectionTarget::Outside,
            offset: 0,
        };
        let Some((index, local_x, local_y)) =
            self.layout.hit(x, y, self.scroll_top, self.viewport_width)
        else {
            return outside;
        };
        let Some(page) = self.pages.get(index) else {
            return outside;
        };
        let layer = page.text_layer();
        let layer = layer.lock();
        match layer.hit_test(local_x, local_y) {
            Some((node, offset)) => SelectionPoint {
                target: SelectionTarget::TextNode {
                    container: page.container(),
                    node,
                },
                offset,
            },
            None => outside,
        }
    }

    /// Handles the end of a pointer selection.
    pub fn on_mouseup(&mut self, selection: &RawSelection) {
        let containers: Vec<ContainerId> = self.pages.iter().map(PageView::container).collect();
        match map_selection(selection, &containers) {
            SelectionOutcome::Ignore => {}
            SelectionOutcome::Clear => self.set_selection(None),
            SelectionOutcome::Select(range) => self.set_selection(Some(range)),
        }
    }

    pub fn set_selection(&mut self, selection: Option<SelectionRange>) {
        self.state.set_selection(selection);
        for page in &self.pages {
            let span = selection.and_then(|range| range.span_for_page(page.index()));
            page.set_selection_span(span);
        }
    }

    /// Text of the marked glyphs on pages whose text layer is populated.
    pub fn selected_text(&self) -> Option<String> {
        self.state.get().selection?;
        let mut pages = Vec::new();
        for page in &self.pages {
            let layer = page.text_layer();
            let layer = layer.lock();
            let words: Vec<&str> = layer
                .nodes()
                .iter()
                .filter(|node| node.marked)
                .map(|node| node.text.as_str())
                .collect();
            if !words.is_empty() {
                pages.push(words.join(" "));
            }
        }
        (!pages.is_empty()).then(|| pages.join("\n"))
    }

    /// Looks up page labels for the outline rows currently displayed.
    pub async fn resolve_outline_labels(&mut self) {
        let Some(document) = self.document.clone() else {
            return;
        };
        for (path, destination) in self.outline.pending_resolutions() {
            let page = resolve_page_index(document.as_ref(), &destination).await;
            self.outline.set_resolution(&path, page);
        }
    }

    /// Toggles an outline entry and navigates to its destination. Returns
    /// whether navigation happened.
    pub async fn activate_outline(&mut self, path: &OutlinePath) -> bool {
        if self.outline.toggle(path).is_none() {
            return false;
        }
        let Some(destination) = self
            .outline
            .entry(path)
            .and_then(|entry| entry.destination.clone())
        else {
            return false;
        };
        self.navigate_to(&destination).await
    }

    pub async fn navigate_to(&mut self, destination: &Destination) -> bool {
        let Some(document) = self.document.clone() else {
            return false;
        };
        match resolve_page_index(document.as_ref(), destination).await {
            Some(page) => {
                self.goto_page(page);
                true
            }
            None => false,
        }
    }

    pub async fn apply(&mut self, command: Command) {
        match command {
            Command::ScrollBy { delta } => self.scroll_by(delta),
            Command::ScrollTo { offset } => self.scroll_to(offset),
            Command::GotoPage { page } => self.goto_page(page),
            Command::NextPage { count } => {
                let next = self.state.get().current_page_index.saturating_add(count);
                self.goto_page(next);
            }
            Command::PrevPage { count } => {
                let prev = self.state.get().current_page_index.saturating_sub(count);
                self.goto_page(prev);
            }
            Command::Zoom { steps } => self.zoom(steps),
            Command::ResetScale => self.set_scale(self.config.initial_scale),
            Command::Resize { width, height } => self.resize(width, height),
            Command::OpenDocument { name } => self.open_document(&name).await,
            Command::ClearSelection => self.set_selection(None),
        }
    }

    /// Whether `page` currently intersects the viewport.
    pub fn is_page_on_screen(&self, page: usize) -> bool {
        self.layout
            .page_rect(page, self.scroll_top, self.viewport_width)
            .map_or(false, |rect| is_visible(&rect, self.viewport_height))
    }

    /// Waits for every in-flight page render.
    pub async fn settle(&mut self) {
        for page in self.pages.iter_mut() {
            page.settle().await;
        }
    }
}

impl Drop for Viewer {
    fn drop(&mut self) {
        self.unload();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{explicit, outline_node, FakeDocument, FakeProvider};
    use crate::{GlyphSpan, MemoryLocationStore};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    const WIDTH: f32 = 1000.0;
    const HEIGHT: f32 = 800.0;

    fn viewer(provider: FakeProvider) -> (Viewer, Arc<MemoryLocationStore>) {
        let store = Arc::new(MemoryLocationStore::new());
        let viewer = Viewer::new(
            ViewerConfig::default(),
            Arc::new(provider),
            store.clone(),
            WIDTH,
            HEIGHT,
        );
        (viewer, store)
    }

    fn glyph(page: &PageView, node: usize, offset: usize) -> SelectionPoint {
        SelectionPoint {
            target: SelectionTarget::TextNode {
                container: page.container(),
                node,
            },
            offset,
        }
    }

    #[tokio::test]
    async fn switching_documents_releases_previous_handle_first() {
        let provider = FakeProvider::new()
            .with_document("a.pdf", 2)
            .with_document("b.pdf", 3);
        let (mut viewer, _) = viewer(provider.clone());

        viewer.open_document("a.pdf").await;
        viewer.open_document("a.pdf").await;
        viewer.open_document("b.pdf").await;

        assert_eq!(provider.log(), vec!["open:a.pdf", "release:a.pdf", "open:b.pdf"]);
        assert_eq!(viewer.page_indicator().as_deref(), Some("1/3"));
        assert_eq!(viewer.status(), &LoadStatus::Ready);
    }

    #[tokio::test]
    async fn failed_load_keeps_loading_indicator() {
        let provider = FakeProvider::new().with_document("a.pdf", 2);
        let (mut viewer, _) = viewer(provider.clone());
        viewer.open_document("a.pdf").await;
        viewer.open_document("missing.pdf").await;

        assert_eq!(viewer.status(), &LoadStatus::Loading("missing.pdf".into()));
        assert!(viewer.document().is_none());
        assert!(viewer.pages().is_empty());
        assert_eq!(provider.log(), vec!["open:a.pdf", "release:a.pdf"]);
    }

    #[tokio::test]
    async fn initial_mount_renders_only_pages_on_screen() {
        let provider = FakeProvider::new().with_document("doc.pdf", 10);
        let (mut viewer, _) = viewer(provider);
        viewer.open_document("doc.pdf").await;
        viewer.settle().await;

        assert_eq!(viewer.visible_pages(), vec![0]);
        assert!(viewer.pages()[0].surface().lock().image().is_some());
        assert!(viewer.pages()[1].surface().lock().image().is_none());
    }

    #[tokio::test]
    async fn scrolling_tracks_current_page() {
        let provider = FakeProvider::new().with_document("doc.pdf", 10);
        let (mut viewer, store) = viewer(provider);
        viewer.open_document("doc.pdf").await;

        let second_top = viewer.layout().top_of(2).unwrap();
        viewer.scroll_to(second_top + 10.0);
        assert_eq!(viewer.state().current_page_index, 2);
        assert_eq!(viewer.page_indicator().as_deref(), Some("3/10"));

        let first_top = viewer.layout().top_of(1).unwrap();
        viewer.scroll_to(first_top + 100.0);
        assert_eq!(viewer.state().current_page_index, 1);

        let persisted = decode_fragment(&store.load().unwrap().unwrap()).unwrap();
        assert_eq!(persisted.document_name, "doc.pdf");
        assert_eq!(persisted.page_index, 1);
    }

    #[tokio::test]
    async fn ctrl_wheel_zoom_rerenders_current_page_and_keeps_indicator() {
        let provider = FakeProvider::new().with_document("doc.pdf", 10);
        let (mut viewer, _) = viewer(provider);
        viewer.open_document("doc.pdf").await;
        viewer.goto_page(4);
        viewer.settle().await;
        assert_eq!(viewer.page_indicator().as_deref(), Some("5/10"));

        viewer.on_wheel(-1, true);
        viewer.on_wheel(-1, true);
        viewer.settle().await;

        let scale = viewer.state().scale;
        assert!((scale - 1.2 * 1.05 * 1.05).abs() < 1e-4);
        assert!((scale - 1.323).abs() < 1e-3);

        let page = &viewer.pages()[4];
        let surface = page.surface();
        let surface = surface.lock();
        assert_eq!(surface.scale(), Some(scale));
        assert_eq!(surface.width(), page.viewport(scale).pixel_width());
        assert_eq!(surface.image().unwrap().width, surface.width());
        assert_eq!(viewer.page_indicator().as_deref(), Some("5/10"));
    }

    #[tokio::test]
    async fn plain_wheel_scrolls_by_configured_step() {
        let provider = FakeProvider::new().with_document("doc.pdf", 3);
        let (mut viewer, _) = viewer(provider);
        viewer.open_document("doc.pdf").await;

        viewer.on_wheel(2, false);
        assert_eq!(viewer.scroll_top(), 2.0 * viewer.config().scroll_step);
        assert_eq!(viewer.state().scale, 1.2);

        viewer.on_wheel(-10, false);
        assert_eq!(viewer.scroll_top(), 0.0);
    }

    #[tokio::test]
    async fn restoring_fragment_opens_document_and_marks_selection() {
        let provider = FakeProvider::new().with_document("amd64volume2.pdf", 8);
        let (mut viewer, _) = viewer(provider);
        let fragment = STANDARD.encode(r#"[0,"amd64volume2.pdf",3,[2,10,3,15]]"#);

        assert!(viewer.restore(&fragment).await);
        viewer.settle().await;

        assert_eq!(
            viewer.state().document_name.as_deref(),
            Some("amd64volume2.pdf")
        );
        assert_eq!(viewer.state().current_page_index, 3);
        assert_eq!(
            viewer.state().selection,
            Some(SelectionRange::new(2, 10, 3, 15))
        );

        let page_three = viewer.pages()[3].text_layer();
        assert_eq!(
            page_three.lock().marked_indices(),
            (0..=15).collect::<Vec<_>>()
        );
        assert_eq!(
            viewer.pages()[2].text_layer().lock().marked_span(),
            Some(GlyphSpan::new(10, GlyphSpan::UNBOUNDED))
        );

        viewer.scroll_by(-300.0);
        viewer.settle().await;
        assert_eq!(viewer.state().current_page_index, 2);
        assert_eq!(
            viewer.pages()[2].text_layer().lock().marked_indices(),
            (10..FakeDocument::GLYPHS_PER_PAGE).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn restore_of_missing_document_reports_failure() {
        let provider = FakeProvider::new().with_document("a.pdf", 2);
        let (mut viewer, _) = viewer(provider);
        let fragment = STANDARD.encode(r#"[0,"gone.pdf",1]"#);

        assert!(!viewer.restore(&fragment).await);
        assert_eq!(
            *viewer.status(),
            LoadStatus::Loading("gone.pdf".to_string())
        );

        viewer.open_document("a.pdf").await;
        assert_eq!(*viewer.status(), LoadStatus::Ready);
    }

    #[tokio::test]
    async fn malformed_fragment_keeps_defaults() {
        let provider = FakeProvider::new().with_document("a.pdf", 2);
        let (mut viewer, store) = viewer(provider);

        assert!(!viewer.restore("not base64 at all!").await);
        assert_eq!(viewer.state().document_name, None);
        assert_eq!(viewer.state().current_page_index, 0);
        assert_eq!(viewer.state().scale, 1.2);
        assert_eq!(store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn mouseup_maps_selection_and_degenerate_selection_clears() {
        let provider = FakeProvider::new().with_document("doc.pdf", 3);
        let (mut viewer, store) = viewer(provider);
        viewer.open_document("doc.pdf").await;
        viewer.settle().await;

        let selection = RawSelection {
            anchor: glyph(&viewer.pages()[0], 2, 0),
            focus: glyph(&viewer.pages()[0], 6, 3),
        };
        viewer.on_mouseup(&selection);
        assert_eq!(
            viewer.state().selection,
            Some(SelectionRange::new(0, 2, 0, 6))
        );
        assert_eq!(
            viewer.pages()[0].text_layer().lock().marked_indices(),
            vec![2, 3, 4, 5, 6]
        );
        assert_eq!(
            viewer.selected_text().as_deref(),
            Some("p0g2 p0g3 p0g4 p0g5 p0g6")
        );
        let persisted = decode_fragment(&store.load().unwrap().unwrap()).unwrap();
        assert_eq!(persisted.selection, Some(SelectionRange::new(0, 2, 0, 6)));

        let outside = RawSelection {
            anchor: glyph(&viewer.pages()[0], 1, 0),
            focus: SelectionPoint {
                target: SelectionTarget::Outside,
                offset: 9,
            },
        };
        viewer.on_mouseup(&outside);
        assert_eq!(
            viewer.state().selection,
            Some(SelectionRange::new(0, 2, 0, 6))
        );

        let click = RawSelection {
            anchor: glyph(&viewer.pages()[0], 4, 2),
            focus: glyph(&viewer.pages()[0], 4, 3),
        };
        viewer.on_mouseup(&click);
        assert_eq!(viewer.state().selection, None);
        assert!(viewer.pages()[0]
            .text_layer()
            .lock()
            .marked_indices()
            .is_empty());
        assert_eq!(viewer.selected_text(), None);
    }

    #[tokio::test]
    async fn selection_point_hits_rendered_text() {
        let provider = FakeProvider::new().with_document("doc.pdf", 2);
        let (mut viewer, _) = viewer(provider);
        viewer.open_document("doc.pdf").await;
        viewer.settle().await;

        let rect = viewer.layout().page_rect(0, 0.0, WIDTH).unwrap();
        let scale = viewer.state().scale;
        let x = rect.left + (10.0 + 25.0 * 3.0 + 1.0) * scale;
        let y = rect.top + 55.0 * scale;
        let point = viewer.selection_point_at(x, y);
        assert_eq!(
            point.target,
            SelectionTarget::TextNode {
                container: viewer.pages()[0].container(),
                node: 3
            }
        );

        let miss = viewer.selection_point_at(1.0, 1.0);
        assert_eq!(miss.target, SelectionTarget::Outside);
    }

    #[tokio::test]
    async fn outline_click_navigates_to_resolved_page() {
        let outline = vec![
            outline_node(
                "Part I",
                explicit(6),
                vec![outline_node("Chapter 1", explicit(7), Vec::new())],
            ),
            outline_node("Missing", Some(Destination::Named("nowhere".into())), Vec::new()),
            outline_node("Untitled", None, Vec::new()),
        ];
        let provider = FakeProvider::new().with_outline("doc.pdf", 10, outline);
        let (mut viewer, _) = viewer(provider);
        viewer.open_document("doc.pdf").await;

        assert!(viewer.activate_outline(&OutlinePath(vec![0])).await);
        assert_eq!(viewer.state().current_page_index, 6);
        assert_eq!(Some(viewer.scroll_top()), viewer.layout().top_of(6));
        assert!(viewer.is_page_on_screen(6));
        assert_eq!(viewer.outline().rows().len(), 4);

        assert!(!viewer.activate_outline(&OutlinePath(vec![1])).await);
        assert!(!viewer.activate_outline(&OutlinePath(vec![2])).await);
        assert_eq!(viewer.state().current_page_index, 6);

        assert!(viewer.activate_outline(&OutlinePath(vec![0, 0])).await);
        assert_eq!(viewer.state().current_page_index, 7);
    }

    #[tokio::test]
    async fn outline_labels_resolve_lazily_and_failures_stay_blank() {
        let outline = vec![
            outline_node("Intro", Some(Destination::Named("intro".into())), Vec::new()),
            outline_node("Broken", Some(Destination::Named("broken".into())), Vec::new()),
            outline_node(
                "Appendix",
                explicit(3),
                vec![outline_node("A.1", explicit(4), Vec::new())],
            ),
        ];
        let provider = FakeProvider::new().with_outline("doc.pdf", 5, outline);
        let (mut viewer, _) = viewer(provider);
        viewer.open_document("doc.pdf").await;

        viewer.resolve_outline_labels().await;
        let labels: Vec<_> = viewer
            .outline()
            .rows()
            .into_iter()
            .map(|row| row.page_number)
            .collect();
        assert_eq!(labels, vec![Some(1), None, Some(4)]);
        assert!(viewer
            .outline()
            .entry(&OutlinePath(vec![2, 0]))
            .map_or(false, |entry| !entry.is_resolved()));

        viewer.activate_outline(&OutlinePath(vec![2])).await;
        viewer.resolve_outline_labels().await;
        assert_eq!(viewer.outline().rows()[3].page_number, Some(5));
    }

    #[tokio::test]
    async fn commands_drive_navigation_and_zoom() {
        let provider = FakeProvider::new().with_document("doc.pdf", 10);
        let (mut viewer, _) = viewer(provider);
        viewer
            .apply(Command::OpenDocument {
                name: "doc.pdf".into(),
            })
            .await;

        viewer.apply(Command::NextPage { count: 3 }).await;
        assert_eq!(viewer.state().current_page_index, 3);
        viewer.apply(Command::PrevPage { count: 5 }).await;
        assert_eq!(viewer.state().current_page_index, 0);
        viewer.apply(Command::GotoPage { page: 99 }).await;
        assert_eq!(viewer.page_indicator().as_deref(), Some("10/10"));

        viewer.apply(Command::Zoom { steps: -2 }).await;
        assert!((viewer.state().scale - 1.2 * 0.95 * 0.95).abs() < 1e-4);
        viewer.apply(Command::ResetScale).await;
        assert_eq!(viewer.state().scale, 1.2);
        viewer.apply(Command::Zoom { steps: 200 }).await;
        assert_eq!(viewer.state().scale, viewer.config().max_scale);
    }
}
