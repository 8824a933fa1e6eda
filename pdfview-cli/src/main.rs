use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use crossterm::cursor;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event};
use crossterm::terminal;
use directories::ProjectDirs;
use pdfview_core::{
    DirectorySource, DocumentProvider, DocumentSource, FileLocationStore, LoadStatus,
    LocationStore, PageEvent, RawSelection, SelectionPoint, Viewer, ViewerConfig,
};
use pdfview_render::PdfiumProvider;
use pdfview_tty::{write_status_line, DrawParams, EventMapper, InputMode, KittyRenderer, UiEvent};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

mod compose;
mod overlay;
mod source;

use compose::{compose_frame, Screen};
use overlay::{outline_items, picker_items, ListWindow, Overlay};
use source::HttpSource;

#[derive(Debug, Parser)]
#[command(
    name = "pdfview",
    version,
    about = "Continuous-scroll PDF viewer for kitty-compatible terminals"
)]
struct Args {
    /// Config file (defaults to the platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Server hosting documents/index.json and the documents
    #[arg(long)]
    base_url: Option<String>,

    /// Local directory to serve documents from instead of a server
    #[arg(long)]
    documents_dir: Option<PathBuf>,

    /// Deep link to restore (document, page and selection)
    #[arg(long)]
    location: Option<String>,

    /// Document to open, as named in the document index
    document: Option<String>,
}

struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self> {
        terminal::enable_raw_mode()?;
        crossterm::execute!(io::stdout(), EnableMouseCapture, cursor::Hide)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = crossterm::execute!(
            io::stdout(),
            DisableMouseCapture,
            terminal::Clear(terminal::ClearType::All),
            cursor::MoveTo(0, 0),
            cursor::Show
        );
        let _ = terminal::disable_raw_mode();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let project_dirs = ProjectDirs::from("org", "pdfview", "pdfview")
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let _log_guard = init_logging(&project_dirs)?;
    let config = load_config(&args, &project_dirs)?;

    let source = document_source(&config)?;
    let provider: Arc<dyn DocumentProvider> = Arc::new(PdfiumProvider::new(Arc::clone(&source))?);
    let store = Arc::new(FileLocationStore::new(
        project_dirs.data_local_dir().join("state"),
    )?);
    let stored = store.load().unwrap_or_else(|err| {
        warn!(?err, "failed to read stored location");
        None
    });

    let screen = current_screen()?;
    let (width, height) = screen.viewport();
    let mut viewer = Viewer::new(config, provider, store, width, height);
    let page_events = viewer
        .take_page_events()
        .ok_or_else(|| anyhow!("page event channel already taken"))?;
    viewer.refresh_catalog(source.as_ref()).await;
    restore_startup(&mut viewer, &args, stored).await;

    let _terminal = TerminalGuard::new()?;
    let mut app = App {
        viewer,
        screen,
        renderer: KittyRenderer::new(io::stdout()),
        mapper: EventMapper::new(),
        overlay: Overlay::None,
        selection_anchor: None,
    };
    if *app.viewer.status() == LoadStatus::Idle {
        app.open_picker();
    }
    app.run(page_events).await
}

fn load_config(args: &Args, project_dirs: &ProjectDirs) -> Result<ViewerConfig> {
    let path = args
        .config
        .clone()
        .unwrap_or_else(|| ViewerConfig::default_path(project_dirs));
    let mut config = ViewerConfig::load(&path)?;
    if let Some(base_url) = &args.base_url {
        config.base_url = Some(base_url.clone());
    }
    if let Some(dir) = &args.documents_dir {
        config.documents_dir = Some(dir.clone());
    }
    Ok(config)
}

fn document_source(config: &ViewerConfig) -> Result<Arc<dyn DocumentSource>> {
    if let Some(dir) = &config.documents_dir {
        let dir = dir
            .canonicalize()
            .with_context(|| format!("failed to resolve documents directory {:?}", dir))?;
        info!(dir = %dir.display(), "serving documents from directory");
        return Ok(Arc::new(DirectorySource::new(dir)));
    }
    if let Some(base_url) = &config.base_url {
        info!(base_url, "serving documents over http");
        return Ok(Arc::new(HttpSource::new(base_url)?));
    }
    Err(anyhow!(
        "no document source configured; pass --base-url or --documents-dir"
    ))
}

async fn restore_startup(viewer: &mut Viewer, args: &Args, stored: Option<String>) {
    if let Some(fragment) = &args.location {
        if viewer.restore(fragment).await {
            return;
        }
    }
    if let Some(name) = &args.document {
        viewer.open_document(name).await;
        return;
    }
    if let Some(fragment) = stored {
        viewer.restore(&fragment).await;
    }
}

fn current_screen() -> Result<Screen> {
    match terminal::window_size() {
        Ok(size) => Ok(Screen::new(size.columns, size.rows, size.width, size.height)),
        Err(err) => {
            debug!(?err, "terminal pixel size unavailable");
            let (columns, rows) = terminal::size()?;
            Ok(Screen::new(columns, rows, 0, 0))
        }
    }
}

fn spawn_input_reader() -> UnboundedReceiver<Event> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || loop {
        match event::read() {
            Ok(event) => {
                if tx.send(event).is_err() {
                    break;
                }
            }
            Err(err) => {
                warn!(?err, "terminal input failed");
                break;
            }
        }
    });
    rx
}

enum LoopAction {
    Continue,
    StatusOnly,
    ContinueRedraw,
    Quit,
}

struct App {
    viewer: Viewer,
    screen: Screen,
    renderer: KittyRenderer<io::Stdout>,
    mapper: EventMapper,
    overlay: Overlay,
    selection_anchor: Option<SelectionPoint>,
}

impl App {
    async fn run(&mut self, mut page_events: UnboundedReceiver<PageEvent>) -> Result<()> {
        let mut input = spawn_input_reader();
        self.redraw()?;

        loop {
            let action = tokio::select! {
                event = input.recv() => match event {
                    Some(event) => self.handle_event(event).await?,
                    None => LoopAction::Quit,
                },
                Some(event) = page_events.recv() => {
                    let mut dirty = self.affects_screen(event);
                    while let Ok(event) = page_events.try_recv() {
                        dirty |= self.affects_screen(event);
                    }
                    if dirty { LoopAction::ContinueRedraw } else { LoopAction::Continue }
                }
            };

            self.sync_mode();
            match action {
                LoopAction::Quit => break,
                LoopAction::ContinueRedraw => self.redraw()?,
                LoopAction::StatusOnly => self.draw_status()?,
                LoopAction::Continue => {}
            }
        }
        Ok(())
    }

    fn affects_screen(&self, event: PageEvent) -> bool {
        if self.overlay.is_active() {
            return false;
        }
        match event {
            PageEvent::Rendered { page, .. } => self.viewer.is_page_on_screen(page),
            PageEvent::TextLayerReady { page, .. } => {
                self.viewer.state().selection.is_some() && self.viewer.is_page_on_screen(page)
            }
        }
    }

    fn sync_mode(&mut self) {
        let mode = match self.overlay {
            Overlay::None => InputMode::Normal,
            Overlay::Outline(_) => InputMode::Outline,
            Overlay::Picker(_) => InputMode::Picker,
        };
        self.mapper.set_mode(mode);
    }

    async fn handle_event(&mut self, event: Event) -> Result<LoopAction> {
        let action = match self.mapper.map_event(event) {
            UiEvent::Command(command) => {
                self.viewer.apply(command).await;
                LoopAction::ContinueRedraw
            }
            UiEvent::Wheel { ticks, ctrl } => {
                self.viewer.on_wheel(ticks, ctrl);
                LoopAction::ContinueRedraw
            }
            UiEvent::SelectionStart { column, row } => {
                self.selection_anchor = self.point_at(column, row);
                LoopAction::Continue
            }
            UiEvent::SelectionExtend { .. } => LoopAction::Continue,
            UiEvent::SelectionEnd { column, row } => {
                let anchor = self.selection_anchor.take();
                match (anchor, self.point_at(column, row)) {
                    (Some(anchor), Some(focus)) => {
                        self.viewer.on_mouseup(&RawSelection { anchor, focus });
                        LoopAction::ContinueRedraw
                    }
                    _ => LoopAction::Continue,
                }
            }
            UiEvent::YankSelection => {
                copy_selection(&self.viewer);
                LoopAction::Continue
            }
            UiEvent::OpenOutline => {
                self.open_outline().await;
                LoopAction::ContinueRedraw
            }
            UiEvent::OpenPicker => {
                self.open_picker();
                LoopAction::ContinueRedraw
            }
            UiEvent::CloseOverlay => {
                self.overlay.deactivate();
                LoopAction::ContinueRedraw
            }
            UiEvent::ListMove { delta } => {
                let moved = match &mut self.overlay {
                    Overlay::Outline(list) => list.move_selection(delta),
                    Overlay::Picker(list) => list.move_selection(delta),
                    Overlay::None => false,
                };
                if moved {
                    LoopAction::ContinueRedraw
                } else {
                    LoopAction::Continue
                }
            }
            UiEvent::ListActivate => {
                self.activate_list_entry().await;
                LoopAction::ContinueRedraw
            }
            UiEvent::Resize { .. } => {
                self.screen = current_screen()?;
                let (width, height) = self.screen.viewport();
                self.viewer.resize(width, height);
                LoopAction::ContinueRedraw
            }
            UiEvent::Quit => LoopAction::Quit,
            UiEvent::None => LoopAction::StatusOnly,
        };
        Ok(action)
    }

    fn point_at(&self, column: u16, row: u16) -> Option<SelectionPoint> {
        if row >= self.screen.image_rows() {
            return None;
        }
        let (x, y) = self.screen.cell_center(column, row);
        Some(self.viewer.selection_point_at(x, y))
    }

    async fn open_outline(&mut self) {
        self.viewer.resolve_outline_labels().await;
        let rows = self.viewer.outline().rows();
        let current = self.viewer.state().current_page_index + 1;
        let mut list = ListWindow::new(
            "Table of Contents",
            "No table of contents available",
            outline_items(&rows),
        );
        if let Some(index) = rows
            .iter()
            .rposition(|row| row.page_number.map_or(false, |page| page <= current))
        {
            list.select(index);
        }
        self.overlay = Overlay::Outline(list);
    }

    fn open_picker(&mut self) {
        let catalog = self.viewer.catalog();
        let mut list = ListWindow::new(
            "Documents",
            "No documents available",
            picker_items(&catalog.items),
        );
        let current = self.viewer.state().document_name.as_deref();
        if let Some(index) = catalog
            .items
            .iter()
            .position(|entry| Some(entry.path.as_str()) == current)
        {
            list.select(index);
        }
        self.overlay = Overlay::Picker(list);
    }

    async fn activate_list_entry(&mut self) {
        match &mut self.overlay {
            Overlay::Outline(list) => {
                let Some(path) = list.selected().cloned() else {
                    return;
                };
                if self.viewer.activate_outline(&path).await {
                    self.overlay.deactivate();
                    return;
                }
                self.viewer.resolve_outline_labels().await;
                if let Overlay::Outline(list) = &mut self.overlay {
                    list.replace_items(outline_items(&self.viewer.outline().rows()));
                }
            }
            Overlay::Picker(list) => {
                let Some(path) = list.selected().cloned() else {
                    return;
                };
                self.overlay.deactivate();
                self.viewer.open_document(&path).await;
            }
            Overlay::None => {}
        }
    }

    fn redraw(&mut self) -> Result<()> {
        let columns = self.screen.columns;
        let rows = self.screen.image_rows();
        self.renderer.begin_sync_update()?;
        self.renderer.clear_all()?;
        match &mut self.overlay {
            Overlay::None => {
                let frame = compose_frame(&self.viewer);
                self.renderer.draw(
                    &frame,
                    DrawParams::clamped(0, 0, u32::from(columns), u32::from(rows)),
                )?;
            }
            Overlay::Outline(list) => {
                self.renderer.delete_all()?;
                list.draw(self.renderer.writer(), columns, rows)?;
            }
            Overlay::Picker(list) => {
                self.renderer.delete_all()?;
                list.draw(self.renderer.writer(), columns, rows)?;
            }
        }
        self.draw_status()?;
        self.renderer.end_sync_update()?;
        Ok(())
    }

    fn draw_status(&mut self) -> Result<()> {
        let state = self.viewer.state();
        let status = format_status(
            self.viewer.status(),
            state.document_name.as_deref(),
            self.viewer.page_indicator().as_deref(),
            state.scale,
            state.selection.is_some(),
            self.mapper.pending_input(),
        );
        write_status_line(
            self.renderer.writer(),
            self.screen.status_row(),
            self.screen.columns,
            &status,
        )?;
        Ok(())
    }
}

fn format_status(
    status: &LoadStatus,
    document: Option<&str>,
    indicator: Option<&str>,
    scale: f32,
    has_selection: bool,
    pending_input: Option<&str>,
) -> String {
    let mut line = match status {
        LoadStatus::Idle => "No document open, press o to choose one".to_string(),
        LoadStatus::Loading(name) => format!("Loading {name}..."),
        LoadStatus::Ready => format!(
            "{}  {}  {:.0}%",
            document.unwrap_or_default(),
            indicator.unwrap_or_default(),
            scale * 100.0
        ),
    };
    if has_selection {
        line.push_str("  [y: copy selection]");
    }
    if let Some(pending) = pending_input {
        line.push_str(" | ");
        line.push_str(pending);
    }
    line
}

fn copy_selection(viewer: &Viewer) {
    let Some(text) = viewer.selected_text() else {
        return;
    };
    match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text)) {
        Ok(()) => info!("copied selection to clipboard"),
        Err(err) => warn!(?err, "failed to copy selection"),
    }
}

fn init_logging(project_dirs: &ProjectDirs) -> Result<WorkerGuard> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "pdfview.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // The terminal is in raw mode and owned by the frame renderer, so logs
    // only go to the file.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}
