use pdfview_core::PixelRect;

#[cfg(feature = "pdf")]
mod pdfium;

#[cfg(feature = "pdf")]
pub use pdfium::{PdfiumDocument, PdfiumProvider};

/// Converts a PDF rectangle (bottom-left origin, points) into a top-left
/// origin rectangle on a page `page_height` points tall.
pub fn flip_bounds(left: f32, bottom: f32, right: f32, top: f32, page_height: f32) -> PixelRect {
    let (left, right) = if left <= right { (left, right) } else { (right, left) };
    let (bottom, top) = if bottom <= top { (bottom, top) } else { (top, bottom) };
    PixelRect::new(left, page_height - top, right - left, top - bottom)
}

/// Page index from a destination, if it names a page inside the document.
pub fn checked_page_index(page_index: usize, page_count: usize) -> Option<usize> {
    (page_index < page_count).then_some(page_index)
}
