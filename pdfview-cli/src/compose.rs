use pdfview_core::{PageRect, PixelRect, RenderImage, Viewer};

const BACKGROUND: [u8; 3] = [82, 86, 89];
const PLACEHOLDER: [u8; 3] = [255, 255, 255];
const SELECTION: [u8; 3] = [0, 100, 255];
const SELECTION_ALPHA: f32 = 0.3;

/// Terminal size in cells and pixels. The last row is kept for the status
/// line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Screen {
    pub columns: u16,
    pub rows: u16,
    pub cell_width: f32,
    pub cell_height: f32,
}

impl Screen {
    const FALLBACK_CELL: (f32, f32) = (8.0, 16.0);

    pub fn new(columns: u16, rows: u16, pixel_width: u16, pixel_height: u16) -> Self {
        let columns = columns.max(1);
        let rows = rows.max(2);
        let (cell_width, cell_height) = if pixel_width == 0 || pixel_height == 0 {
            Self::FALLBACK_CELL
        } else {
            (
                pixel_width as f32 / columns as f32,
                pixel_height as f32 / rows as f32,
            )
        };
        Self {
            columns,
            rows,
            cell_width,
            cell_height,
        }
    }

    pub fn status_row(&self) -> u16 {
        self.rows - 1
    }

    pub fn image_rows(&self) -> u16 {
        self.rows - 1
    }

    /// Pixel size of the page area.
    pub fn viewport(&self) -> (f32, f32) {
        (
            (self.columns as f32 * self.cell_width).floor(),
            (self.image_rows() as f32 * self.cell_height).floor(),
        )
    }

    /// Centre of a cell in viewport pixels.
    pub fn cell_center(&self, column: u16, row: u16) -> (f32, f32) {
        (
            (column as f32 + 0.5) * self.cell_width,
            (row as f32 + 0.5) * self.cell_height,
        )
    }
}

/// Composites every on-screen page into one RGBA frame of the viewport size.
pub fn compose_frame(viewer: &Viewer) -> RenderImage {
    let (width, height) = viewer.viewport_size();
    let mut frame = solid(width as u32, height as u32, BACKGROUND);
    let scroll_top = viewer.scroll_top();

    for page in viewer.pages() {
        let Some(rect) = viewer.layout().page_rect(page.index(), scroll_top, width) else {
            continue;
        };
        if rect.bottom < 0.0 || rect.top >= height {
            continue;
        }

        let surface = page.surface();
        let surface = surface.lock();
        match surface.image() {
            Some(image) => blit(&mut frame, image, rect.left as i64, rect.top as i64),
            None => fill_rect(&mut frame, &placeholder(&rect), PLACEHOLDER, 1.0),
        }
        drop(surface);

        let layer = page.text_layer();
        let layer = layer.lock();
        for node in layer.nodes().iter().filter(|node| node.marked) {
            let target = PixelRect::new(
                rect.left + node.frame.x,
                rect.top + node.frame.y,
                node.frame.width,
                node.frame.height,
            );
            fill_rect(&mut frame, &target, SELECTION, SELECTION_ALPHA);
        }
    }
    frame
}

fn placeholder(rect: &PageRect) -> PixelRect {
    PixelRect::new(rect.left, rect.top, rect.width, rect.height())
}

fn solid(width: u32, height: u32, color: [u8; 3]) -> RenderImage {
    let width = width.max(1);
    let height = height.max(1);
    let pixels = std::iter::repeat([color[0], color[1], color[2], 255])
        .take(width as usize * height as usize)
        .flatten()
        .collect();
    RenderImage {
        width,
        height,
        pixels,
    }
}

/// Copies `image` onto `frame` with its top-left corner at `(x, y)`, clipping
/// whatever falls outside.
pub fn blit(frame: &mut RenderImage, image: &RenderImage, x: i64, y: i64) {
    let frame_width = frame.width as i64;
    let frame_height = frame.height as i64;
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + image.width as i64).min(frame_width);
    let y1 = (y + image.height as i64).min(frame_height);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let span = (x1 - x0) as usize * 4;
    for row in y0..y1 {
        let src_x = (x0 - x) as usize;
        let src_y = (row - y) as usize;
        let src = (src_y * image.width as usize + src_x) * 4;
        let dst = (row as usize * frame.width as usize + x0 as usize) * 4;
        frame.pixels[dst..dst + span].copy_from_slice(&image.pixels[src..src + span]);
    }
}

pub fn fill_rect(image: &mut RenderImage, rect: &PixelRect, color: [u8; 3], alpha: f32) {
    let x0 = rect.x.floor().max(0.0) as u32;
    let y0 = rect.y.floor().max(0.0) as u32;
    let x1 = (rect.right().ceil().max(0.0) as u32).min(image.width);
    let y1 = (rect.bottom().ceil().max(0.0) as u32).min(image.height);
    if x0 >= x1 || y0 >= y1 {
        return;
    }

    let width = image.width as usize;
    for y in y0..y1 {
        let row_start = y as usize * width * 4;
        for x in x0..x1 {
            let idx = row_start + x as usize * 4;
            blend_pixel(&mut image.pixels[idx..idx + 4], color, alpha);
        }
    }
}

fn blend_pixel(pixel: &mut [u8], color: [u8; 3], alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    let inv = 1.0 - alpha;
    for (channel, target) in pixel.iter_mut().zip(color) {
        *channel = (*channel as f32 * inv + target as f32 * alpha)
            .round()
            .clamp(0.0, 255.0) as u8;
    }
}
