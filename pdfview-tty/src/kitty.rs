use std::io::Write;

use anyhow::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use crossterm::{
    cursor,
    terminal::{Clear, ClearType},
};
use pdfview_core::RenderImage;
use png::{BitDepth, ColorType, Encoder};
use tracing::trace;

const CHUNK_SIZE: usize = 4096;

/// Cell area an image is scaled into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawParams {
    pub column: u16,
    pub row: u16,
    pub columns: u32,
    pub rows: u32,
}

impl DrawParams {
    pub fn clamped(column: u16, row: u16, columns: u32, rows: u32) -> Self {
        Self {
            column,
            row,
            columns: columns.max(1),
            rows: rows.max(1),
        }
    }
}

/// Writes frames using the kitty graphics protocol. Every frame replaces the
/// previous one under the same image id.
pub struct KittyRenderer<W: Write> {
    writer: W,
    image_id: u32,
}

impl<W: Write> KittyRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            image_id: 1,
        }
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn draw(&mut self, image: &RenderImage, params: DrawParams) -> Result<()> {
        let payload = BASE64.encode(encode_png(image)?);
        trace!(
            width = image.width,
            height = image.height,
            bytes = payload.len(),
            "kitty frame"
        );

        crossterm::queue!(&mut self.writer, cursor::MoveTo(params.column, params.row))?;
        let chunks: Vec<&[u8]> = payload.as_bytes().chunks(CHUNK_SIZE).collect();
        let last = chunks.len().saturating_sub(1);
        for (index, chunk) in chunks.iter().enumerate() {
            let more = u8::from(index < last);
            if index == 0 {
                write!(
                    self.writer,
                    "\u{1b}_Ga=T,f=100,C=1,q=2,i={},c={},r={},s={},v={},z=-1,m={}",
                    self.image_id, params.columns, params.rows, image.width, image.height, more
                )?;
            } else {
                write!(self.writer, "\u{1b}_Gm={},q=2", more)?;
            }
            self.writer.write_all(b";")?;
            self.writer.write_all(chunk)?;
            self.writer.write_all(b"\x1b\\")?;
        }
        self.writer.flush()?;
        Ok(())
    }

    /// Removes every image placement from the screen.
    pub fn delete_all(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}_Ga=d,d=A,q=2\u{1b}\\")?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn begin_sync_update(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}[?2026h")?;
        Ok(())
    }

    /// Lets the terminal present everything buffered since `begin_sync_update`.
    pub fn end_sync_update(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}[?2026l")?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn clear_all(&mut self) -> Result<()> {
        crossterm::execute!(
            &mut self.writer,
            Clear(ClearType::All),
            cursor::MoveTo(0, 0)
        )?;
        Ok(())
    }
}

fn encode_png(image: &RenderImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    let mut encoder = Encoder::new(&mut buffer, image.width, image.height);
    encoder.set_color(ColorType::Rgba);
    encoder.set_depth(BitDepth::Eight);
    let mut writer = encoder.write_header()?;
    writer.write_image_data(&image.pixels)?;
    writer.finish()?;
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn printable(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap().replace('\u{1b}', "ESC")
    }

    #[test]
    fn draw_positions_cursor_then_transmits_png() {
        let mut renderer = KittyRenderer::new(Vec::new());
        let image = RenderImage {
            width: 1,
            height: 1,
            pixels: vec![255, 0, 0, 255],
        };

        renderer
            .draw(&image, DrawParams::clamped(0, 2, 10, 0))
            .unwrap();
        let output = printable(renderer.into_inner());
        assert!(output.starts_with("ESC[3;1H"));
        assert!(output.contains("ESC_Ga=T,f=100,C=1,q=2,i=1,c=10,r=1,s=1,v=1,z=-1,m=0;"));
        assert!(output.ends_with("ESC\\"));
    }

    fn noise(len: usize) -> Vec<u8> {
        let mut state: u32 = 0x2545_f491;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                (state >> 16) as u8
            })
            .collect()
    }

    #[test]
    fn large_frames_are_chunked() {
        let mut renderer = KittyRenderer::new(Vec::new());
        let image = RenderImage {
            width: 64,
            height: 64,
            pixels: noise(64 * 64 * 4),
        };

        renderer.draw(&image, DrawParams::clamped(0, 0, 8, 4)).unwrap();
        let output = printable(renderer.into_inner());
        let continuations = output.matches("ESC_Gm=").count();
        assert!(continuations >= 1);
        assert_eq!(output.matches("m=0").count(), 1);
        assert!(output.contains("ESC_Gm=0,q=2;"));
    }

    #[test]
    fn delete_all_targets_every_placement() {
        let mut renderer = KittyRenderer::new(Vec::new());
        renderer.delete_all().unwrap();
        insta::assert_snapshot!(printable(renderer.into_inner()), @r"ESC_Ga=d,d=A,q=2ESC\");
    }
}
