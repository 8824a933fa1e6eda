use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies the container a page's text layer is mounted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerId(Uuid);

impl ContainerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ContainerId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionTarget {
    TextNode { container: ContainerId, node: usize },
    Outside,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionPoint {
    pub target: SelectionTarget,
    /// Character offset inside the target node.
    pub offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSelection {
    pub anchor: SelectionPoint,
    pub focus: SelectionPoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SelectionRange {
    pub start_page: usize,
    pub start_glyph: usize,
    pub end_page: usize,
    pub end_glyph: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// An endpoint lies outside every text layer; the current selection stays.
    Ignore,
    Clear,
    Select(SelectionRange),
}

/// Inclusive range of glyph indices on one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphSpan {
    pub start: usize,
    pub end: usize,
}

impl GlyphSpan {
    /// End value used when the selection continues onto a later page.
    pub const UNBOUNDED: usize = usize::MAX;

    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index <= self.end
    }
}

impl SelectionRange {
    pub fn new(start_page: usize, start_glyph: usize, end_page: usize, end_glyph: usize) -> Self {
        Self {
            start_page,
            start_glyph,
            end_page,
            end_glyph,
        }
    }

    pub fn as_array(&self) -> [usize; 4] {
        [
            self.start_page,
            self.start_glyph,
            self.end_page,
            self.end_glyph,
        ]
    }

    /// Orders the endpoints so that start precedes end in document order.
    pub fn normalized(self) -> Self {
        if (self.start_page, self.start_glyph) <= (self.end_page, self.end_glyph) {
            self
        } else {
            Self::new(
                self.end_page,
                self.end_glyph,
                self.start_page,
                self.start_glyph,
            )
        }
    }

    pub fn touches(&self, page: usize) -> bool {
        page >= self.start_page && page <= self.end_page
    }

    /// Glyphs marked on `page`, or `None` when the range does not reach it.
    pub fn span_for_page(&self, page: usize) -> Option<GlyphSpan> {
        if !self.touches(page) {
            return None;
        }
        let start = if page == self.start_page {
            self.start_glyph
        } else {
            0
        };
        let end = if page == self.end_page {
            self.end_glyph
        } else {
            GlyphSpan::UNBOUNDED
        };
        Some(GlyphSpan::new(start, end))
    }
}

/// Converts a raw selection into a range over the page containers, listed in
/// page order.
pub fn map_selection(selection: &RawSelection, containers: &[ContainerId]) -> SelectionOutcome {
    let Some((anchor_page, anchor_glyph)) = locate(&selection.anchor, containers) else {
        return SelectionOutcome::Ignore;
    };
    let Some((focus_page, focus_glyph)) = locate(&selection.focus, containers) else {
        return SelectionOutcome::Ignore;
    };

    if selection.focus.offset.abs_diff(selection.anchor.offset) < 2 {
        return SelectionOutcome::Clear;
    }

    let range = SelectionRange::new(anchor_page, anchor_glyph, focus_page, focus_glyph);
    SelectionOutcome::Select(range.normalized())
}

fn locate(point: &SelectionPoint, containers: &[ContainerId]) -> Option<(usize, usize)> {
    match point.target {
        SelectionTarget::TextNode { container, node } => containers
            .iter()
            .position(|candidate| *candidate == container)
            .map(|page| (page, node)),
        SelectionTarget::Outside => None,
    }
}
