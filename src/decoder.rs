//! Animation decoder interface
//!
//! A decoder walks an in-memory animation frame by frame and hands every
//! decoded row to a callback as a [`RowDraw`]. The callback decides where the
//! row ends up; the decoder never knows about panels.

use embassy_time::Duration;

/// What to do with a frame's area before the next frame is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum Disposal {
    /// No disposal specified
    Unspecified,
    /// Leave the frame in place
    Keep,
    /// Restore the area to the background color
    RestoreBackground,
    /// Restore the area to what was there before
    RestorePrevious,
}

impl Disposal {
    pub fn from_bits(bits: u8) -> Self {
        match bits {
            1 => Disposal::Keep,
            2 => Disposal::RestoreBackground,
            3 => Disposal::RestorePrevious,
            _ => Disposal::Unspecified,
        }
    }
}

/// One decoded row, valid for the duration of the callback
pub struct RowDraw<'a> {
    /// Left edge of the frame on the canvas
    pub x: u16,
    /// Absolute canvas row
    pub y: u16,
    /// Reported row width (may exceed what a panel can show)
    pub width: usize,
    /// Palette indices for the leading columns the decoder kept; may be
    /// shorter than `width`
    pub pixels: &'a mut [u8],
    /// Index -> RGB565
    pub palette: &'a [u16; 256],
    /// Palette index that is see-through in this frame, if any
    pub transparent: Option<u8>,
    /// Canvas background palette index
    pub background: u8,
    pub disposal: Disposal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum DecodeError {
    /// Not an animation this decoder understands
    BadSignature,
    /// Data ended in the middle of a block
    Truncated,
    /// Structurally invalid data
    Corrupt,
}

/// Frame-by-frame decoder over a buffer the caller owns
pub trait FrameDecoder {
    /// Validate the header and prepare to play from the first frame
    fn open(&mut self, data: &[u8]) -> Result<(), DecodeError>;

    /// Decode the next frame, calling `draw` for every row.
    /// Returns the frame's display time, or `None` once no frames remain.
    fn play_frame<F>(&mut self, data: &[u8], draw: F) -> Result<Option<Duration>, DecodeError>
    where
        F: FnMut(&mut RowDraw<'_>);

    /// Forget the current animation
    fn close(&mut self);
}

impl<D: FrameDecoder + ?Sized> FrameDecoder for &mut D {
    fn open(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        (**self).open(data)
    }

    fn play_frame<F>(&mut self, data: &[u8], draw: F) -> Result<Option<Duration>, DecodeError>
    where
        F: FnMut(&mut RowDraw<'_>),
    {
        (**self).play_frame(data, draw)
    }

    fn close(&mut self) {
        (**self).close()
    }
}
