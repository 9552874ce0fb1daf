// Compact GIF87a/89a decoder for the key panels.
// Works on a buffer already in RAM and streams rows to a callback; nothing
// is allocated. Palettes are converted to RGB565 once per table.
// Supported: global/local color tables, graphic control extension
// (disposal, transparency, delay), interlaced frames. Frames of any width
// decode; only the first MAX_DECODE_WIDTH columns are kept. Plain text and application extensions are skipped.
// Looping is ignored; the animation plays once.

use embassy_time::Duration;
use embedded_graphics::pixelcolor::{IntoStorage, Rgb565, Rgb888};

use crate::config::MAX_DECODE_WIDTH;
use crate::decoder::{DecodeError, Disposal, FrameDecoder, RowDraw};

const SIG_87A: &[u8; 6] = b"GIF87a";
const SIG_89A: &[u8; 6] = b"GIF89a";

const HEADER_LEN: usize = 13;
const DESCRIPTOR_LEN: usize = 9;

const BLOCK_EXTENSION: u8 = 0x21;
const BLOCK_IMAGE: u8 = 0x2C;
const BLOCK_TRAILER: u8 = 0x3B;
const LABEL_GRAPHIC_CONTROL: u8 = 0xF9;

const FLAG_COLOR_TABLE: u8 = 0x80;
const FLAG_INTERLACED: u8 = 0x40;

// LZW code space is 12 bits
const MAX_CODES: usize = 4096;
const MAX_CODE_SIZE: u8 = 12;
const NO_CODE: u16 = u16::MAX;

// interlace passes: (first row, step)
const INTERLACE_PASSES: [(u16, u16); 4] = [(0, 8), (4, 8), (2, 4), (1, 2)];

#[derive(Clone, Copy)]
struct GraphicControl {
    disposal: Disposal,
    transparent: Option<u8>,
    delay_cs: u16,
}

impl GraphicControl {
    const NONE: Self = Self {
        disposal: Disposal::Unspecified,
        transparent: None,
        delay_cs: 0,
    };
}

struct LzwTables {
    prefix: [u16; MAX_CODES],
    suffix: [u8; MAX_CODES],
    // longest string is MAX_CODES long, plus one for the KwKwK case
    stack: [u8; MAX_CODES + 1],
}

pub struct GifDecoder {
    opened: bool,
    pos: usize,
    width: u16,
    height: u16,
    background: u8,
    global_palette: [u16; 256],
    local_palette: [u16; 256],
    control: GraphicControl,
    lzw: LzwTables,
    row: [u8; MAX_DECODE_WIDTH],
}

impl GifDecoder {
    pub const fn new() -> Self {
        Self {
            opened: false,
            pos: 0,
            width: 0,
            height: 0,
            background: 0,
            global_palette: [0; 256],
            local_palette: [0; 256],
            control: GraphicControl::NONE,
            lzw: LzwTables {
                prefix: [NO_CODE; MAX_CODES],
                suffix: [0; MAX_CODES],
                stack: [0; MAX_CODES + 1],
            },
            row: [0; MAX_DECODE_WIDTH],
        }
    }

    /// Logical screen size of the open animation
    pub fn screen_size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    fn decode_frame<F>(&mut self, data: &[u8], mut draw: F) -> Result<Duration, DecodeError>
    where
        F: FnMut(&mut RowDraw<'_>),
    {
        let desc = data
            .get(self.pos..self.pos + DESCRIPTOR_LEN)
            .ok_or(DecodeError::Truncated)?;
        let left = u16::from_le_bytes([desc[0], desc[1]]);
        let top = u16::from_le_bytes([desc[2], desc[3]]);
        let width = u16::from_le_bytes([desc[4], desc[5]]) as usize;
        let height = u16::from_le_bytes([desc[6], desc[7]]);
        let flags = desc[8];
        self.pos += DESCRIPTOR_LEN;

        let local = flags & FLAG_COLOR_TABLE != 0;
        if local {
            self.pos = load_palette(data, self.pos, flags, &mut self.local_palette)?;
        }

        let min_code_size = *data.get(self.pos).ok_or(DecodeError::Truncated)?;
        self.pos += 1;

        // Columns past the row buffer are decoded but not kept
        let stored = width.min(MAX_DECODE_WIDTH);
        if stored < width {
            debug!("gif: frame width {} clamped to {}", width, stored);
        }

        let control = self.control;
        // graphic control applies to this image only
        self.control = GraphicControl::NONE;

        let palette = if local {
            &self.local_palette
        } else {
            &self.global_palette
        };
        let background = self.background;
        let row = &mut self.row[..stored];
        let mut blocks = SubBlocks::new(data, self.pos);

        if width > 0 && height > 0 {
            let mut order = RowOrder::new(height, flags & FLAG_INTERLACED != 0);
            let mut col = 0usize;
            let mut rows_done = 0u16;

            decode_lzw(&mut blocks, min_code_size, &mut self.lzw, |px| {
                if col < stored {
                    row[col] = px;
                }
                col += 1;
                if col < width {
                    return true;
                }
                col = 0;
                if let Some(line) = order.next() {
                    let mut draw_row = RowDraw {
                        x: left,
                        y: top.saturating_add(line),
                        width,
                        pixels: &mut row[..],
                        palette,
                        transparent: control.transparent,
                        background,
                        disposal: control.disposal,
                    };
                    draw(&mut draw_row);
                }
                rows_done += 1;
                rows_done < height
            })?;
        }

        self.pos = blocks.finish()?;
        Ok(Duration::from_millis(control.delay_cs as u64 * 10))
    }

    fn read_extension(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        let label = *data.get(self.pos).ok_or(DecodeError::Truncated)?;
        self.pos += 1;

        if label == LABEL_GRAPHIC_CONTROL {
            // [size=4][packed][delay lo][delay hi][transparent index]
            let block = data
                .get(self.pos..self.pos + 5)
                .ok_or(DecodeError::Truncated)?;
            if block[0] < 4 {
                return Err(DecodeError::Corrupt);
            }
            let packed = block[1];
            self.control = GraphicControl {
                disposal: Disposal::from_bits((packed >> 2) & 0x07),
                transparent: if packed & 0x01 != 0 { Some(block[4]) } else { None },
                delay_cs: u16::from_le_bytes([block[2], block[3]]),
            };
        }

        self.pos = skip_sub_blocks(data, self.pos)?;
        Ok(())
    }
}

impl Default for GifDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder for GifDecoder {
    fn open(&mut self, data: &[u8]) -> Result<(), DecodeError> {
        self.opened = false;
        let header = data.get(..HEADER_LEN).ok_or(DecodeError::Truncated)?;
        if &header[..6] != SIG_87A && &header[..6] != SIG_89A {
            return Err(DecodeError::BadSignature);
        }

        self.width = u16::from_le_bytes([header[6], header[7]]);
        self.height = u16::from_le_bytes([header[8], header[9]]);
        let flags = header[10];
        self.background = header[11];

        self.global_palette = [0; 256];
        self.pos = HEADER_LEN;
        if flags & FLAG_COLOR_TABLE != 0 {
            self.pos = load_palette(data, self.pos, flags, &mut self.global_palette)?;
        }

        self.control = GraphicControl::NONE;
        self.opened = true;
        debug!("gif: {}x{} screen, background {}", self.width, self.height, self.background);
        Ok(())
    }

    fn play_frame<F>(&mut self, data: &[u8], draw: F) -> Result<Option<Duration>, DecodeError>
    where
        F: FnMut(&mut RowDraw<'_>),
    {
        if !self.opened {
            return Ok(None);
        }

        loop {
            // a missing trailer just ends the animation
            let Some(&introducer) = data.get(self.pos) else {
                return Ok(None);
            };
            self.pos += 1;

            match introducer {
                BLOCK_IMAGE => return self.decode_frame(data, draw).map(Some),
                BLOCK_EXTENSION => self.read_extension(data)?,
                BLOCK_TRAILER => {
                    self.pos = data.len();
                    return Ok(None);
                }
                _ => return Err(DecodeError::Corrupt),
            }
        }
    }

    fn close(&mut self) {
        self.opened = false;
        self.pos = 0;
    }
}

// color table of (2 << (flags & 7)) RGB triplets at `pos`; returns the new pos
fn load_palette(
    data: &[u8],
    pos: usize,
    flags: u8,
    palette: &mut [u16; 256],
) -> Result<usize, DecodeError> {
    let entries = 2usize << (flags & 0x07);
    let table = data
        .get(pos..pos + entries * 3)
        .ok_or(DecodeError::Truncated)?;
    for (dst, rgb) in palette.iter_mut().zip(table.chunks_exact(3)) {
        *dst = Rgb565::from(Rgb888::new(rgb[0], rgb[1], rgb[2])).into_storage();
    }
    Ok(pos + entries * 3)
}

fn skip_sub_blocks(data: &[u8], mut pos: usize) -> Result<usize, DecodeError> {
    loop {
        let len = *data.get(pos).ok_or(DecodeError::Truncated)? as usize;
        pos += 1;
        if len == 0 {
            return Ok(pos);
        }
        pos += len;
        if pos > data.len() {
            return Err(DecodeError::Truncated);
        }
    }
}

// byte stream over a chain of length-prefixed sub-blocks
struct SubBlocks<'d> {
    data: &'d [u8],
    pos: usize,
    left: u8,
    done: bool,
}

impl<'d> SubBlocks<'d> {
    fn new(data: &'d [u8], pos: usize) -> Self {
        Self {
            data,
            pos,
            left: 0,
            done: false,
        }
    }

    fn next_byte(&mut self) -> Result<Option<u8>, DecodeError> {
        while self.left == 0 {
            if self.done {
                return Ok(None);
            }
            let len = *self.data.get(self.pos).ok_or(DecodeError::Truncated)?;
            self.pos += 1;
            if len == 0 {
                self.done = true;
                return Ok(None);
            }
            self.left = len;
        }
        let byte = *self.data.get(self.pos).ok_or(DecodeError::Truncated)?;
        self.pos += 1;
        self.left -= 1;
        Ok(Some(byte))
    }

    // skip whatever the decoder did not consume; returns pos after terminator
    fn finish(self) -> Result<usize, DecodeError> {
        if self.done {
            return Ok(self.pos);
        }
        let pos = self.pos + self.left as usize;
        if pos > self.data.len() {
            return Err(DecodeError::Truncated);
        }
        skip_sub_blocks(self.data, pos)
    }
}

// LSB-first variable width code reader
struct BitReader {
    acc: u32,
    bits: u8,
}

impl BitReader {
    fn read(&mut self, blocks: &mut SubBlocks<'_>, size: u8) -> Result<Option<u16>, DecodeError> {
        while self.bits < size {
            match blocks.next_byte()? {
                Some(byte) => {
                    self.acc |= (byte as u32) << self.bits;
                    self.bits += 8;
                }
                None => return Ok(None),
            }
        }
        let code = (self.acc & ((1u32 << size) - 1)) as u16;
        self.acc >>= size;
        self.bits -= size;
        Ok(Some(code))
    }
}

// row numbers in the order they arrive in the stream
struct RowOrder {
    height: u16,
    interlaced: bool,
    pass: usize,
    next: u16,
}

impl RowOrder {
    fn new(height: u16, interlaced: bool) -> Self {
        Self {
            height,
            interlaced,
            pass: 0,
            next: 0,
        }
    }

    fn next(&mut self) -> Option<u16> {
        if !self.interlaced {
            if self.next >= self.height {
                return None;
            }
            self.next += 1;
            return Some(self.next - 1);
        }
        while self.pass < INTERLACE_PASSES.len() {
            if self.next < self.height {
                let line = self.next;
                self.next += INTERLACE_PASSES[self.pass].1;
                return Some(line);
            }
            self.pass += 1;
            if let Some(&(first, _)) = INTERLACE_PASSES.get(self.pass) {
                self.next = first;
            }
        }
        None
    }
}

// Decode an LZW stream, feeding palette indices to `emit` until it returns
// false, the end code arrives or the data runs out.
fn decode_lzw<F>(
    blocks: &mut SubBlocks<'_>,
    min_code_size: u8,
    tables: &mut LzwTables,
    mut emit: F,
) -> Result<(), DecodeError>
where
    F: FnMut(u8) -> bool,
{
    if !(1..MAX_CODE_SIZE).contains(&min_code_size) {
        return Err(DecodeError::Corrupt);
    }

    let clear = 1u16 << min_code_size;
    let end = clear + 1;
    for code in 0..clear {
        tables.prefix[code as usize] = NO_CODE;
        tables.suffix[code as usize] = code as u8;
    }

    let mut bits = BitReader { acc: 0, bits: 0 };
    let mut code_size = min_code_size + 1;
    let mut next = clear + 2;
    let mut prev = NO_CODE;
    let mut first = 0u8;

    loop {
        let Some(code) = bits.read(blocks, code_size)? else {
            return Ok(());
        };

        if code == clear {
            code_size = min_code_size + 1;
            next = clear + 2;
            prev = NO_CODE;
            continue;
        }
        if code == end {
            return Ok(());
        }

        let mut sp = 0usize;
        let mut cur = if prev == NO_CODE {
            if code >= clear {
                return Err(DecodeError::Corrupt);
            }
            code
        } else if code < next {
            code
        } else if code == next {
            // KwKwK: previous string plus its own first byte
            tables.stack[sp] = first;
            sp += 1;
            prev
        } else {
            return Err(DecodeError::Corrupt);
        };

        while cur > end {
            if sp >= MAX_CODES {
                return Err(DecodeError::Corrupt);
            }
            tables.stack[sp] = tables.suffix[cur as usize];
            sp += 1;
            cur = tables.prefix[cur as usize];
        }
        if cur >= clear {
            return Err(DecodeError::Corrupt);
        }
        tables.stack[sp] = cur as u8;
        sp += 1;
        first = cur as u8;

        if prev != NO_CODE && (next as usize) < MAX_CODES {
            tables.prefix[next as usize] = prev;
            tables.suffix[next as usize] = first;
            next += 1;
            if next == (1 << code_size) && code_size < MAX_CODE_SIZE {
                code_size += 1;
            }
        }
        prev = code;

        while sp > 0 {
            sp -= 1;
            if !emit(tables.stack[sp]) {
                return Ok(());
            }
        }
    }
}
