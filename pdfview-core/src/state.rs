use crate::{SelectionRange, ViewLocation};

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerState {
    pub document_name: Option<String>,
    pub current_page_index: usize,
    pub scale: f32,
    pub selection: Option<SelectionRange>,
}

impl ViewerState {
    pub fn new(scale: f32) -> Self {
        Self {
            document_name: None,
            current_page_index: 0,
            scale,
            selection: None,
        }
    }

    /// The part of the state that is shared through deep links.
    pub fn location(&self) -> Option<ViewLocation> {
        self.document_name.as_ref().map(|name| ViewLocation {
            document_name: name.clone(),
            page_index: self.current_page_index,
            selection: self.selection,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateChange {
    Document,
    CurrentPage,
    Scale,
    Selection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type Subscriber = Box<dyn FnMut(&ViewerState, StateChange) + Send>;

pub struct StateContainer {
    state: ViewerState,
    subscribers: Vec<(SubscriptionId, Subscriber)>,
    next_id: u64,
}

impl StateContainer {
    pub fn new(state: ViewerState) -> Self {
        Self {
            state,
            subscribers: Vec::new(),
            next_id: 0,
        }
    }

    pub fn get(&self) -> &ViewerState {
        &self.state
    }

    pub fn subscribe<F>(&mut self, subscriber: F) -> SubscriptionId
    where
        F: FnMut(&ViewerState, StateChange) + Send + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push((id, Box::new(subscriber)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.subscribers.retain(|(candidate, _)| *candidate != id);
    }

    pub fn set_document_name(&mut self, name: Option<String>) {
        if self.state.document_name != name {
            self.state.document_name = name;
            self.notify(StateChange::Document);
        }
    }

    pub fn set_current_page(&mut self, index: usize) {
        if self.state.current_page_index != index {
            self.state.current_page_index = index;
            self.notify(StateChange::CurrentPage);
        }
    }

    pub fn set_scale(&mut self, scale: f32) {
        if (self.state.scale - scale).abs() > f32::EPSILON {
            self.state.scale = scale;
            self.notify(StateChange::Scale);
        }
    }

    pub fn set_selection(&mut self, selection: Option<SelectionRange>) {
        if self.state.selection != selection {
            self.state.selection = selection;
            self.notify(StateChange::Selection);
        }
    }

    fn notify(&mut self, change: StateChange) {
        for (_, subscriber) in self.subscribers.iter_mut() {
            subscriber(&self.state, change);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn notifies_only_on_actual_changes() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut container = StateContainer::new(ViewerState::new(1.2));
        let sink = Arc::clone(&seen);
        container.subscribe(move |_, change| sink.lock().push(change));

        container.set_current_page(0);
        container.set_current_page(4);
        container.set_scale(1.2);
        container.set_scale(1.26);
        container.set_document_name(Some("a.pdf".into()));
        container.set_selection(Some(SelectionRange::new(0, 1, 0, 5)));
        container.set_selection(Some(SelectionRange::new(0, 1, 0, 5)));

        assert_eq!(
            *seen.lock(),
            vec![
                StateChange::CurrentPage,
                StateChange::Scale,
                StateChange::Document,
                StateChange::Selection
            ]
        );
    }

    #[test]
    fn unsubscribed_listeners_stop_receiving() {
        let seen = Arc::new(Mutex::new(0));
        let mut container = StateContainer::new(ViewerState::new(1.0));
        let sink = Arc::clone(&seen);
        let id = container.subscribe(move |_, _| *sink.lock() += 1);
        container.set_current_page(1);
        container.unsubscribe(id);
        container.set_current_page(2);
        assert_eq!(*seen.lock(), 1);
    }

    #[test]
    fn location_requires_a_document() {
        let mut state = ViewerState::new(1.0);
        assert_eq!(state.location(), None);
        state.document_name = Some("a.pdf".into());
        state.current_page_index = 2;
        assert_eq!(
            state.location(),
            Some(ViewLocation {
                document_name: "a.pdf".into(),
                page_index: 2,
                selection: None
            })
        );
    }
}
