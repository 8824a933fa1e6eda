use std::io::Write;

use anyhow::Result;
use crossterm::cursor;
use crossterm::style::{Attribute, Print, SetAttribute};
use pdfview_core::{CatalogEntry, OutlinePath, OutlineRow};

pub enum Overlay {
    None,
    Outline(ListWindow<OutlinePath>),
    Picker(ListWindow<String>),
}

impl Overlay {
    pub fn is_active(&self) -> bool {
        !matches!(self, Overlay::None)
    }

    pub fn deactivate(&mut self) {
        *self = Overlay::None;
    }
}

pub struct ListItem<T> {
    pub label: String,
    pub value: T,
}

/// Scrollable list shown in a bordered box, with one selected row.
pub struct ListWindow<T> {
    title: &'static str,
    empty_message: &'static str,
    items: Vec<ListItem<T>>,
    selected: usize,
    scroll_offset: usize,
}

impl<T> ListWindow<T> {
    pub fn new(title: &'static str, empty_message: &'static str, items: Vec<ListItem<T>>) -> Self {
        Self {
            title,
            empty_message,
            items,
            selected: 0,
            scroll_offset: 0,
        }
    }

    pub fn selected(&self) -> Option<&T> {
        self.items.get(self.selected).map(|item| &item.value)
    }

    pub fn select(&mut self, index: usize) {
        self.selected = index.min(self.items.len().saturating_sub(1));
    }

    pub fn move_selection(&mut self, delta: isize) -> bool {
        if self.items.is_empty() {
            return false;
        }
        let last = self.items.len() as isize - 1;
        let next = (self.selected as isize + delta).clamp(0, last) as usize;
        let moved = next != self.selected;
        self.selected = next;
        moved
    }

    /// Replaces the rows, keeping the selection on the same index.
    pub fn replace_items(&mut self, items: Vec<ListItem<T>>) {
        self.items = items;
        self.select(self.selected);
    }

    fn ensure_visible(&mut self, height: usize) {
        if height == 0 || self.items.is_empty() {
            self.scroll_offset = 0;
            return;
        }
        let max_offset = self.items.len().saturating_sub(height);
        self.scroll_offset = self.scroll_offset.min(max_offset);
        if self.selected < self.scroll_offset {
            self.scroll_offset = self.selected;
        } else if self.selected >= self.scroll_offset + height {
            self.scroll_offset = self.selected + 1 - height;
        }
    }

    /// Lines of the box, top border first, sized for a `columns` by `rows`
    /// area. Empty when the area is too small.
    pub fn layout_lines(&mut self, columns: usize, rows: usize) -> Vec<(String, bool)> {
        if columns < 20 || rows < 6 {
            return Vec::new();
        }
        let max_inner = columns - 4;
        let widest = if self.items.is_empty() {
            self.empty_message.len() + 2
        } else {
            self.items
                .iter()
                .map(|item| item.label.chars().count() + 2)
                .max()
                .unwrap_or(0)
        };
        let inner = widest.max(self.title.len()).clamp(20.min(max_inner), max_inner);
        let content_height = self.items.len().max(1).min(rows - 4);
        self.ensure_visible(content_height);

        let border = format!("+{}+", "-".repeat(inner));
        let mut lines = vec![
            (border.clone(), false),
            (format!("|{:^inner$}|", self.title), false),
            (format!("|{}|", "-".repeat(inner)), false),
        ];
        if self.items.is_empty() {
            let text = truncate_with_ellipsis(format!("  {}", self.empty_message), inner);
            lines.push((format!("|{text}|"), false));
        } else {
            let end = (self.scroll_offset + content_height).min(self.items.len());
            for index in self.scroll_offset..end {
                let selected = index == self.selected;
                let marker = if selected { '>' } else { ' ' };
                let text = truncate_with_ellipsis(
                    format!("{marker} {}", self.items[index].label),
                    inner,
                );
                lines.push((format!("|{text}|"), selected));
            }
        }
        lines.push((border, false));
        lines
    }

    pub fn draw(&mut self, writer: &mut impl Write, columns: u16, rows: u16) -> Result<()> {
        let lines = self.layout_lines(columns as usize, rows as usize);
        let Some(width) = lines.first().map(|(line, _)| line.chars().count()) else {
            return Ok(());
        };
        let start_col = (columns as usize).saturating_sub(width) / 2;
        let start_row = (rows as usize).saturating_sub(lines.len()) / 2;
        for (offset, (line, selected)) in lines.iter().enumerate() {
            let attribute = if *selected {
                Attribute::Bold
            } else {
                Attribute::Reverse
            };
            crossterm::queue!(
                writer,
                cursor::MoveTo(start_col as u16, (start_row + offset) as u16),
                SetAttribute(attribute),
                Print(line),
                SetAttribute(Attribute::Reset)
            )?;
        }
        writer.flush()?;
        Ok(())
    }
}

pub fn outline_items(rows: &[OutlineRow]) -> Vec<ListItem<OutlinePath>> {
    rows.iter()
        .map(|row| ListItem {
            label: format_outline_row(row),
            value: row.path.clone(),
        })
        .collect()
}

fn format_outline_row(row: &OutlineRow) -> String {
    let indent = "  ".repeat(row.depth.min(8));
    let expander = match (row.has_children, row.expanded) {
        (false, _) => ' ',
        (true, false) => '+',
        (true, true) => '-',
    };
    match row.page_number {
        Some(page) => format!("{indent}{expander} {} (p{page})", row.title),
        None => format!("{indent}{expander} {}", row.title),
    }
}

/// Picker rows show the catalog name and open the catalog path.
pub fn picker_items(entries: &[CatalogEntry]) -> Vec<ListItem<String>> {
    entries
        .iter()
        .map(|entry| ListItem {
            label: entry.name.clone(),
            value: entry.path.clone(),
        })
        .collect()
}

pub fn truncate_with_ellipsis(text: String, width: usize) -> String {
    let length = text.chars().count();
    let mut text = if length > width {
        if width <= 3 {
            text.chars().take(width).collect()
        } else {
            let mut truncated: String = text.chars().take(width - 3).collect();
            truncated.push_str("...");
            truncated
        }
    } else {
        text
    };
    let length = text.chars().count();
    if length < width {
        text.push_str(&" ".repeat(width - length));
    }
    text
}
