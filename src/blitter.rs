//! Scanline blitter with run-length transparency
//!
//! Every panel write carries a fixed window-setup cost, so a row is sent as
//! few contiguous runs as possible: one write for an opaque row, one write per
//! run of opaque pixels otherwise. Transparent pixels are never written, which
//! leaves the previous frame visible underneath.

use crate::config::{MAX_BLIT_WIDTH, PANEL_WIDTH};
use crate::decoder::{Disposal, RowDraw};

/// Something rows can be written to
pub trait Surface {
    /// Write `colors` (RGB565) starting at column `x` of row `y`
    fn draw_run(&mut self, x: u16, y: u16, colors: &[u16]);
}

impl<S: Surface + ?Sized> Surface for &mut S {
    fn draw_run(&mut self, x: u16, y: u16, colors: &[u16]) {
        (**self).draw_run(x, y, colors)
    }
}

pub struct FrameBlitter {
    scratch: [u16; MAX_BLIT_WIDTH],
}

impl FrameBlitter {
    pub const fn new() -> Self {
        Self {
            scratch: [0; MAX_BLIT_WIDTH],
        }
    }

    /// Blit one decoded row. Returns the number of `draw_run` calls issued.
    pub fn blit_row<S: Surface>(&mut self, row: &mut RowDraw<'_>, surface: &mut S) -> usize {
        let width = row.width.min(MAX_BLIT_WIDTH).min(row.pixels.len());
        let pixels = &mut row.pixels[..width];
        let mut transparent = row.transparent;

        if row.disposal == Disposal::RestoreBackground {
            if let Some(t) = transparent {
                for px in pixels.iter_mut().filter(|px| **px == t) {
                    *px = row.background;
                }
            }
            transparent = None;
        }

        let Some(t) = transparent else {
            for (dst, &px) in self.scratch.iter_mut().zip(pixels.iter()) {
                *dst = row.palette[px as usize];
            }
            surface.draw_run(row.x, row.y, &self.scratch[..width]);
            return 1;
        };

        let mut writes = 0;
        let mut col = 0;
        while col < width {
            if pixels[col] == t {
                col += 1;
                continue;
            }
            // Runs only move right, so the first one past the panel ends the row
            let x = usize::from(row.x) + col;
            if x >= usize::from(PANEL_WIDTH) {
                break;
            }
            let start = col;
            while col < width && pixels[col] != t {
                self.scratch[col - start] = row.palette[pixels[col] as usize];
                col += 1;
            }
            surface.draw_run(x as u16, row.y, &self.scratch[..col - start]);
            writes += 1;
        }
        writes
    }
}

impl Default for FrameBlitter {
    fn default() -> Self {
        Self::new()
    }
}
