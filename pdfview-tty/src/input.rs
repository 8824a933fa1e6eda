use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use pdfview_core::Command;

#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    Command(Command),
    /// Wheel or `j`/`k` scrolling. Positive ticks move down.
    Wheel { ticks: i32, ctrl: bool },
    SelectionStart { column: u16, row: u16 },
    SelectionExtend { column: u16, row: u16 },
    SelectionEnd { column: u16, row: u16 },
    YankSelection,
    OpenOutline,
    OpenPicker,
    CloseOverlay,
    ListMove { delta: isize },
    ListActivate,
    Resize { columns: u16, rows: u16 },
    Quit,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Outline,
    Picker,
}

#[derive(Debug, Default)]
pub struct EventMapper {
    pending_count: Option<usize>,
    pending_digits: String,
    mode: InputMode,
}

impl EventMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        if self.mode != mode {
            self.reset_count();
            self.mode = mode;
        }
    }

    pub fn map_event(&mut self, event: Event) -> UiEvent {
        match event {
            Event::Resize(columns, rows) => UiEvent::Resize { columns, rows },
            Event::Key(key) if key.kind == KeyEventKind::Release => UiEvent::None,
            Event::Key(key) => match self.mode {
                InputMode::Normal => self.map_key_normal(key),
                InputMode::Outline | InputMode::Picker => self.map_key_list(key),
            },
            Event::Mouse(mouse) => match self.mode {
                InputMode::Normal => self.map_mouse_normal(mouse),
                InputMode::Outline | InputMode::Picker => map_mouse_list(mouse),
            },
            _ => UiEvent::None,
        }
    }

    fn map_key_normal(&mut self, key: KeyEvent) -> UiEvent {
        let KeyEvent {
            code, modifiers, ..
        } = key;
        match (code, modifiers) {
            (KeyCode::Char(c), KeyModifiers::NONE) if c.is_ascii_digit() => {
                if let Some(digit) = c.to_digit(10) {
                    self.push_digit(digit as usize);
                }
                UiEvent::None
            }
            (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, KeyModifiers::NONE) => {
                let ticks = self.take_count() as i32;
                UiEvent::Wheel { ticks, ctrl: false }
            }
            (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, KeyModifiers::NONE) => {
                let ticks = self.take_count() as i32;
                UiEvent::Wheel {
                    ticks: -ticks,
                    ctrl: false,
                }
            }
            (KeyCode::Char(' '), KeyModifiers::NONE) | (KeyCode::PageDown, _) => {
                let count = self.take_count();
                UiEvent::Command(Command::NextPage { count })
            }
            (KeyCode::Char('b'), KeyModifiers::NONE) | (KeyCode::PageUp, _) => {
                let count = self.take_count();
                UiEvent::Command(Command::PrevPage { count })
            }
            (KeyCode::Char('g'), KeyModifiers::NONE) | (KeyCode::Home, _) => {
                let page = self.pending_count.take().unwrap_or(1).saturating_sub(1);
                self.reset_count();
                UiEvent::Command(Command::GotoPage { page })
            }
            (KeyCode::Char('G'), _) | (KeyCode::End, _) => {
                let page = self
                    .pending_count
                    .take()
                    .map_or(usize::MAX, |count| count.saturating_sub(1));
                self.reset_count();
                UiEvent::Command(Command::GotoPage { page })
            }
            (KeyCode::Char('+'), _) => {
                let steps = self.take_count() as i32;
                UiEvent::Command(Command::Zoom { steps })
            }
            (KeyCode::Char('-'), _) => {
                let steps = self.take_count() as i32;
                UiEvent::Command(Command::Zoom { steps: -steps })
            }
            (KeyCode::Char('='), _) => {
                self.reset_count();
                UiEvent::Command(Command::ResetScale)
            }
            (KeyCode::Esc, _) => {
                self.reset_count();
                UiEvent::Command(Command::ClearSelection)
            }
            (KeyCode::Char('y'), KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::YankSelection
            }
            (KeyCode::Char('t'), _) => {
                self.reset_count();
                UiEvent::OpenOutline
            }
            (KeyCode::Char('o'), KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::OpenPicker
            }
            (KeyCode::Char('q'), _) | (KeyCode::Char('c'), KeyModifiers::CONTROL) => {
                self.reset_count();
                UiEvent::Quit
            }
            _ => {
                self.reset_count();
                UiEvent::None
            }
        }
    }

    fn map_key_list(&mut self, key: KeyEvent) -> UiEvent {
        let closes = match self.mode {
            InputMode::Outline => 't',
            _ => 'o',
        };
        match (key.code, key.modifiers) {
            (KeyCode::Esc, _) => UiEvent::CloseOverlay,
            (KeyCode::Char(c), _) if c == closes => UiEvent::CloseOverlay,
            (KeyCode::Enter, _) | (KeyCode::Char(' '), _) => UiEvent::ListActivate,
            (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, KeyModifiers::NONE) => {
                UiEvent::ListMove { delta: 1 }
            }
            (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, KeyModifiers::NONE) => {
                UiEvent::ListMove { delta: -1 }
            }
            (KeyCode::Char('q'), _) | (KeyCode::Char('c'), KeyModifiers::CONTROL) => UiEvent::Quit,
            _ => UiEvent::None,
        }
    }

    fn map_mouse_normal(&mut self, mouse: MouseEvent) -> UiEvent {
        let ctrl = mouse.modifiers.contains(KeyModifiers::CONTROL);
        let (column, row) = (mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::ScrollDown => UiEvent::Wheel { ticks: 1, ctrl },
            MouseEventKind::ScrollUp => UiEvent::Wheel { ticks: -1, ctrl },
            MouseEventKind::Down(MouseButton::Left) => UiEvent::SelectionStart { column, row },
            MouseEventKind::Drag(MouseButton::Left) => UiEvent::SelectionExtend { column, row },
            MouseEventKind::Up(MouseButton::Left) => UiEvent::SelectionEnd { column, row },
            _ => UiEvent::None,
        }
    }

    fn push_digit(&mut self, digit: usize) {
        let current = self.pending_count.unwrap_or(0);
        self.pending_count = Some(current.saturating_mul(10).saturating_add(digit));
        if let Some(c) = char::from_digit(digit as u32, 10) {
            self.pending_digits.push(c);
        }
    }

    fn take_count(&mut self) -> usize {
        let count = self
            .pending_count
            .take()
            .filter(|&count| count > 0)
            .unwrap_or(1);
        self.pending_digits.clear();
        count.min(i32::MAX as usize)
    }

    fn reset_count(&mut self) {
        self.pending_count = None;
        self.pending_digits.clear();
    }

    /// Typed count prefix, shown in the status line until consumed.
    pub fn pending_input(&self) -> Option<&str> {
        (!self.pending_digits.is_empty()).then_some(self.pending_digits.as_str())
    }
}

fn map_mouse_list(mouse: MouseEvent) -> UiEvent {
    match mouse.kind {
        MouseEventKind::ScrollDown => UiEvent::ListMove { delta: 1 },
        MouseEventKind::ScrollUp => UiEvent::ListMove { delta: -1 },
        _ => UiEvent::None,
    }
}
