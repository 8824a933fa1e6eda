use serde::{Deserialize, Serialize};

mod backend;
mod cancel;
mod catalog;
mod config;
mod fragment;
mod layout;
mod location;
mod outline;
mod page;
mod selection;
mod state;
mod surface;
mod viewer;
mod visibility;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{
    resolve_page_index, Destination, DocumentHandle, DocumentProvider, ExplicitDestination,
    OutlineNode, PageHandle, RenderError, TextContent, TextItem,
};
pub use cancel::CancellationToken;
pub use catalog::{
    load_catalog, sanitize_relative, CatalogEntry, DirectorySource, DocumentIndex, DocumentSource,
};
pub use config::ViewerConfig;
pub use fragment::{decode_fragment, encode_fragment, FragmentError, ViewLocation, FRAGMENT_VERSION};
pub use layout::{DocumentLayout, PageRect};
pub use location::{FileLocationStore, LocationStore, MemoryLocationStore};
pub use outline::{OutlineEntry, OutlinePath, OutlineRow, OutlineTree};
pub use page::{PageEvent, PageView};
pub use selection::{
    map_selection, ContainerId, GlyphSpan, RawSelection, SelectionOutcome, SelectionPoint,
    SelectionRange, SelectionTarget,
};
pub use state::{StateChange, StateContainer, SubscriptionId, ViewerState};
pub use surface::{PageSurface, PixelRect, TextLayer, TextNode};
pub use viewer::{Command, LoadStatus, Viewer};
pub use visibility::{current_page_after, Transition, VisibilityDispatcher, VisibilityTracker};

#[derive(Debug, Clone, PartialEq)]
pub struct RenderImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RenderImage {
    pub fn blank(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![255; width as usize * height as usize * 4],
        }
    }
}

/// Page dimensions in pixels at a given zoom scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageViewport {
    pub width: f32,
    pub height: f32,
    pub scale: f32,
}

impl PageViewport {
    /// Builds the viewport for a page measured in PDF points.
    pub fn from_points(width_pts: f32, height_pts: f32, scale: f32) -> Self {
        Self {
            width: width_pts * scale,
            height: height_pts * scale,
            scale,
        }
    }

    /// Backing width of a surface sized for this viewport.
    pub fn pixel_width(&self) -> u32 {
        clamp_dimension(self.width)
    }

    pub fn pixel_height(&self) -> u32 {
        clamp_dimension(self.height)
    }
}

fn clamp_dimension(value: f32) -> u32 {
    let floored = value.floor();
    if !floored.is_finite() || floored < 1.0 {
        1
    } else if floored > u32::MAX as f32 {
        u32::MAX
    } else {
        floored as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_pixels_truncate_fractional_sizes() {
        let viewport = PageViewport::from_points(612.0, 792.0, 1.2);
        assert_eq!(viewport.pixel_width(), 734);
        assert_eq!(viewport.pixel_height(), 950);

        let tiny = PageViewport::from_points(0.1, 0.1, 1.0);
        assert_eq!(tiny.pixel_width(), 1);
        assert_eq!(tiny.pixel_height(), 1);
    }
}
