use crate::PageViewport;

/// A page's rectangle relative to the top-left corner of the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRect {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub width: f32,
}

impl PageRect {
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

#[derive(Debug, Clone, Default)]
pub struct DocumentLayout {
    slots: Vec<Slot>,
    total_height: f32,
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    top: f32,
    width: f32,
    height: f32,
}

impl DocumentLayout {
    /// Stacks pages top to bottom with `gap` pixels before, between and after them.
    pub fn new(viewports: &[PageViewport], gap: f32) -> Self {
        let gap = gap.max(0.0);
        let mut slots = Vec::with_capacity(viewports.len());
        let mut cursor = gap;
        for viewport in viewports {
            slots.push(Slot {
                top: cursor,
                width: viewport.pixel_width() as f32,
                height: viewport.pixel_height() as f32,
            });
            cursor += viewport.pixel_height() as f32 + gap;
        }
        Self {
            slots,
            total_height: cursor,
        }
    }

    pub fn total_height(&self) -> f32 {
        self.total_height
    }

    /// Document-space offset of a page's top edge.
    pub fn top_of(&self, page: usize) -> Option<f32> {
        self.slots.get(page).map(|slot| slot.top)
    }

    pub fn max_scroll(&self, viewport_height: f32) -> f32 {
        (self.total_height - viewport_height).max(0.0)
    }

    pub fn clamp_scroll(&self, scroll_top: f32, viewport_height: f32) -> f32 {
        if !scroll_top.is_finite() {
            return 0.0;
        }
        scroll_top.clamp(0.0, self.max_scroll(viewport_height))
    }

    /// Screen rectangle of `page` for the given scroll position; pages are
    /// centered horizontally in a viewport `viewport_width` pixels wide.
    pub fn page_rect(&self, page: usize, scroll_top: f32, viewport_width: f32) -> Option<PageRect> {
        let slot = self.slots.get(page)?;
        let top = slot.top - scroll_top;
        Some(PageRect {
            top,
            bottom: top + slot.height,
            left: ((viewport_width - slot.width) / 2.0).floor(),
            width: slot.width,
        })
    }

    /// Page under a screen point, with the point translated into page pixels.
    pub fn hit(
        &self,
        x: f32,
        y: f32,
        scroll_top: f32,
        viewport_width: f32,
    ) -> Option<(usize, f32, f32)> {
        (0..self.slots.len()).find_map(|page| {
            let rect = self.page_rect(page, scroll_top, viewport_width)?;
            let inside = y >= rect.top
                && y < rect.bottom
                && x >= rect.left
                && x < rect.left + rect.width;
            inside.then(|| (page, x - rect.left, y - rect.top))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(pages: usize) -> DocumentLayout {
        let viewports = vec![PageViewport::from_points(100.0, 200.0, 1.0); pages];
        DocumentLayout::new(&viewports, 10.0)
    }

    #[test]
    fn stacks_pages_with_gaps() {
        let layout = layout(3);
        assert_eq!(layout.top_of(0), Some(10.0));
        assert_eq!(layout.top_of(1), Some(220.0));
        assert_eq!(layout.top_of(2), Some(430.0));
        assert_eq!(layout.top_of(3), None);
        assert_eq!(layout.total_height(), 640.0);
    }

    #[test]
    fn page_rect_follows_scroll_and_centers_horizontally() {
        let layout = layout(2);
        let rect = layout.page_rect(1, 300.0, 300.0).unwrap();
        assert_eq!(rect.top, -80.0);
        assert_eq!(rect.bottom, 120.0);
        assert_eq!(rect.left, 100.0);
        assert_eq!(rect.height(), 200.0);
    }

    #[test]
    fn clamps_scroll_to_document_extent() {
        let layout = layout(3);
        assert_eq!(layout.clamp_scroll(-5.0, 100.0), 0.0);
        assert_eq!(layout.clamp_scroll(1000.0, 100.0), 540.0);
        assert_eq!(layout.clamp_scroll(1000.0, 1000.0), 0.0);
        assert_eq!(layout.clamp_scroll(f32::NAN, 100.0), 0.0);
    }

    #[test]
    fn hit_translates_into_page_coordinates() {
        let layout = layout(2);
        assert_eq!(layout.hit(150.0, 30.0, 0.0, 300.0), Some((0, 50.0, 20.0)));
        assert_eq!(layout.hit(150.0, 5.0, 0.0, 300.0), None);
        assert_eq!(layout.hit(10.0, 30.0, 0.0, 300.0), None);
    }
}
