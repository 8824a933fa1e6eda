use serde::{Deserialize, Serialize};

use crate::{GlyphSpan, PageViewport, RenderImage};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl PixelRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn scaled(&self, factor: f32) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
            width: self.width * factor,
            height: self.height * factor,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }
}

/// Raster target for one page.
#[derive(Debug, Clone, Default)]
pub struct PageSurface {
    width: u32,
    height: u32,
    image: Option<RenderImage>,
    scale: Option<f32>,
}

impl PageSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn image(&self) -> Option<&RenderImage> {
        self.image.as_ref()
    }

    /// Scale of the committed image, if any.
    pub fn scale(&self) -> Option<f32> {
        self.scale
    }

    /// Sizes the backing store to the viewport. Changing the size discards the
    /// committed image.
    pub fn resize_to(&mut self, viewport: &PageViewport) {
        let width = viewport.pixel_width();
        let height = viewport.pixel_height();
        if width != self.width || height != self.height {
            self.width = width;
            self.height = height;
            self.image = None;
            self.scale = None;
        }
    }

    pub fn commit(&mut self, image: RenderImage, scale: f32) {
        self.image = Some(image);
        self.scale = Some(scale);
    }

    pub fn release(&mut self) {
        self.image = None;
        self.scale = None;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextNode {
    pub text: String,
    pub frame: PixelRect,
    pub marked: bool,
}

/// Selectable text nodes overlaying a page surface.
#[derive(Debug, Clone, Default)]
pub struct TextLayer {
    frame: PixelRect,
    nodes: Vec<TextNode>,
    marked: Option<GlyphSpan>,
}

impl TextLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame(&self) -> PixelRect {
        self.frame
    }

    pub fn set_frame(&mut self, frame: PixelRect) {
        self.frame = frame;
    }

    pub fn nodes(&self) -> &[TextNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    /// Drops every node and inserts `nodes`, re-applying the current marks.
    pub fn replace_nodes(&mut self, nodes: Vec<TextNode>) {
        self.nodes = nodes;
        self.apply_marks();
    }

    pub fn marked_span(&self) -> Option<GlyphSpan> {
        self.marked
    }

    pub fn set_marked(&mut self, span: Option<GlyphSpan>) {
        self.marked = span;
        self.apply_marks();
    }

    pub fn marked_indices(&self) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.marked)
            .map(|(index, _)| index)
            .collect()
    }

    /// Finds the node under a point given in surface pixels and the character
    /// offset inside it.
    pub fn hit_test(&self, x: f32, y: f32) -> Option<(usize, usize)> {
        let (index, node) = self
            .nodes
            .iter()
            .enumerate()
            .find(|(_, node)| node.frame.contains(x, y))?;
        let chars = node.text.chars().count();
        if chars == 0 || node.frame.width <= 0.0 {
            return Some((index, 0));
        }
        let ratio = ((x - node.frame.x) / node.frame.width).clamp(0.0, 1.0);
        let offset = (ratio * chars as f32).round() as usize;
        Some((index, offset.min(chars)))
    }

    fn apply_marks(&mut self) {
        let span = self.marked;
        for (index, node) in self.nodes.iter_mut().enumerate() {
            node.marked = span.map_or(false, |span| span.contains(index));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(text: &str, x: f32) -> TextNode {
        TextNode {
            text: text.to_string(),
            frame: PixelRect::new(x, 10.0, 40.0, 12.0),
            marked: false,
        }
    }

    #[test]
    fn resize_discards_image_only_when_dimensions_change() {
        let mut surface = PageSurface::new();
        let viewport = PageViewport::from_points(100.0, 200.0, 1.0);
        surface.resize_to(&viewport);
        surface.commit(RenderImage::blank(100, 200), 1.0);

        surface.resize_to(&viewport);
        assert!(surface.image().is_some());

        surface.resize_to(&PageViewport::from_points(100.0, 200.0, 1.5));
        assert_eq!((surface.width(), surface.height()), (150, 300));
        assert!(surface.image().is_none());
        assert_eq!(surface.scale(), None);
    }

    #[test]
    fn marks_survive_node_replacement() {
        let mut layer = TextLayer::new();
        layer.set_marked(Some(GlyphSpan::new(1, 2)));
        layer.replace_nodes(vec![
            node("a", 0.0),
            node("b", 50.0),
            node("c", 100.0),
            node("d", 150.0),
        ]);
        assert_eq!(layer.marked_indices(), vec![1, 2]);

        layer.set_marked(None);
        assert!(layer.marked_indices().is_empty());
    }

    #[test]
    fn hit_test_reports_node_and_character_offset() {
        let mut layer = TextLayer::new();
        layer.replace_nodes(vec![node("abcd", 0.0), node("efgh", 50.0)]);

        assert_eq!(layer.hit_test(70.0, 15.0), Some((1, 2)));
        assert_eq!(layer.hit_test(1.0, 15.0), Some((0, 0)));
        assert_eq!(layer.hit_test(45.0, 15.0), None);
    }
}
