use std::io::{self, Write};

use crossterm::{
    cursor,
    style::Print,
    terminal::{Clear, ClearType},
};

mod input;
mod kitty;

pub use input::{EventMapper, InputMode, UiEvent};
pub use kitty::{DrawParams, KittyRenderer};

/// Writes `label` on `row`, clipped to `columns` characters.
pub fn write_status_line<W: Write>(
    writer: &mut W,
    row: u16,
    columns: u16,
    label: &str,
) -> io::Result<()> {
    let clipped: String = label.chars().take(columns as usize).collect();
    crossterm::queue!(
        writer,
        cursor::MoveTo(0, row),
        Clear(ClearType::CurrentLine),
        Print(clipped)
    )?;
    writer.flush()
}
