use std::collections::BTreeMap;

use crate::PageRect;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    ExitTop,
    ExitBottom,
    EnterTop,
    EnterBottom,
}

impl Transition {
    pub fn is_enter(&self) -> bool {
        matches!(self, Transition::EnterTop | Transition::EnterBottom)
    }
}

pub fn is_visible(rect: &PageRect, viewport_height: f32) -> bool {
    !(rect.bottom < 0.0 || rect.top >= viewport_height)
}

#[derive(Debug, Clone, Copy)]
pub struct VisibilityTracker {
    visible: bool,
}

impl VisibilityTracker {
    /// Pages before `presumed_visible` start out visible so the first paint
    /// does not wait for a scroll evaluation.
    pub fn new(page_index: usize, presumed_visible: usize) -> Self {
        Self {
            visible: page_index < presumed_visible,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn evaluate(&mut self, rect: &PageRect, viewport_height: f32) -> Option<Transition> {
        let now_visible = is_visible(rect, viewport_height);
        if now_visible == self.visible {
            return None;
        }
        self.visible = now_visible;
        let transition = if now_visible {
            if rect.top < 0.0 {
                Transition::EnterTop
            } else {
                Transition::EnterBottom
            }
        } else if rect.bottom < 0.0 {
            Transition::ExitTop
        } else {
            Transition::ExitBottom
        };
        Some(transition)
    }
}

#[derive(Debug, Clone, Default)]
pub struct VisibilityDispatcher {
    trackers: BTreeMap<usize, VisibilityTracker>,
    presumed_visible: usize,
}

impl VisibilityDispatcher {
    pub fn new(presumed_visible: usize) -> Self {
        Self {
            trackers: BTreeMap::new(),
            presumed_visible,
        }
    }

    /// Registers a page and runs its mount-time evaluation.
    pub fn register(
        &mut self,
        page: usize,
        rect: &PageRect,
        viewport_height: f32,
    ) -> Option<Transition> {
        let mut tracker = VisibilityTracker::new(page, self.presumed_visible);
        let transition = tracker.evaluate(rect, viewport_height);
        self.trackers.insert(page, tracker);
        transition
    }

    pub fn clear(&mut self) {
        self.trackers.clear();
    }

    pub fn visible_pages(&self) -> Vec<usize> {
        self.trackers
            .iter()
            .filter(|(_, tracker)| tracker.is_visible())
            .map(|(page, _)| *page)
            .collect()
    }

    /// Evaluates every registered page against its current rectangle.
    pub fn dispatch<F>(&mut self, mut rect_for: F, viewport_height: f32) -> Vec<(usize, Transition)>
    where
        F: FnMut(usize) -> Option<PageRect>,
    {
        let mut transitions = Vec::new();
        for (page, tracker) in self.trackers.iter_mut() {
            let Some(rect) = rect_for(*page) else {
                continue;
            };
            if let Some(transition) = tracker.evaluate(&rect, viewport_height) {
                transitions.push((*page, transition));
            }
        }
        transitions
    }
}

/// Current page index after `page` reports `transition`.
pub fn current_page_after(current: usize, page: usize, transition: Transition) -> usize {
    match transition {
        Transition::EnterTop => page,
        Transition::ExitTop => page + 1,
        Transition::EnterBottom | Transition::ExitBottom => current,
    }
}
