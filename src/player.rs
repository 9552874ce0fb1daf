//! Animation player
//!
//! The single consumer of the dispatch queue. Each request is played to
//! completion before the next is taken: load the file into RAM, decode it
//! frame by frame onto the requested panel, release everything.

use alloc::vec::Vec;

use embassy_futures::yield_now;
use embassy_time::{Duration, Timer};

use crate::blitter::{FrameBlitter, Surface};
use crate::config::MAX_ANIMATION_FILE_SIZE;
use crate::decoder::FrameDecoder;
use crate::dispatch::DispatchQueue;
use crate::storage::{AnimationFile, AnimationStore, StorageError};
use crate::types::{DispatchRequest, SurfaceIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum PlaybackError {
    NotFound,
    TooLarge { size: usize },
    OutOfMemory { size: usize },
    Storage,
}

impl From<StorageError> for PlaybackError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => PlaybackError::NotFound,
            StorageError::Io | StorageError::Unmounted => PlaybackError::Storage,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub struct PlaybackStats {
    pub frames: u32,
    pub rows: u32,
    pub writes: u32,
}

/// All panels, addressed by surface index
pub trait SurfaceArray {
    fn draw_run(&mut self, surface: SurfaceIndex, x: u16, y: u16, colors: &[u16]);
}

impl<A: SurfaceArray + ?Sized> SurfaceArray for &mut A {
    fn draw_run(&mut self, surface: SurfaceIndex, x: u16, y: u16, colors: &[u16]) {
        (**self).draw_run(surface, x, y, colors)
    }
}

/// One panel of the array, fixed for the length of a playback
struct TargetSurface<'a, A: SurfaceArray> {
    panels: &'a mut A,
    index: SurfaceIndex,
}

impl<A: SurfaceArray> Surface for TargetSurface<'_, A> {
    fn draw_run(&mut self, x: u16, y: u16, colors: &[u16]) {
        self.panels.draw_run(self.index, x, y, colors);
    }
}

pub struct AnimationPlayer<S, D, A> {
    store: S,
    decoder: D,
    panels: A,
    blitter: FrameBlitter,
}

impl<S, D, A> AnimationPlayer<S, D, A>
where
    S: AnimationStore,
    D: FrameDecoder,
    A: SurfaceArray,
{
    pub fn new(store: S, decoder: D, panels: A) -> Self {
        Self {
            store,
            decoder,
            panels,
            blitter: FrameBlitter::new(),
        }
    }

    pub fn panels(&mut self) -> &mut A {
        &mut self.panels
    }

    pub async fn run(&mut self, queue: &DispatchQueue) -> ! {
        info!("Player task started");

        loop {
            let request = queue.pop().await;
            match self.play(request).await {
                Ok(stats) => debug!(
                    "Played {} on surface {}: {} frames, {} rows, {} writes",
                    request.animation.file_name(),
                    request.surface.get(),
                    stats.frames,
                    stats.rows,
                    stats.writes
                ),
                Err(e) => warn!(
                    "Playback of {} failed: {}",
                    request.animation.file_name(),
                    e
                ),
            }
        }
    }

    /// Play one animation to completion on the requested surface
    pub async fn play(&mut self, request: DispatchRequest) -> Result<PlaybackStats, PlaybackError> {
        let data = self.load(request.animation.file_name())?;

        if let Err(e) = self.decoder.open(&data) {
            debug!("{} is not playable: {}", request.animation.file_name(), e);
            return Ok(PlaybackStats::default());
        }

        let mut stats = PlaybackStats::default();
        let mut target = TargetSurface {
            panels: &mut self.panels,
            index: request.surface,
        };
        let blitter = &mut self.blitter;

        loop {
            let frame = self.decoder.play_frame(&data, |row| {
                stats.rows += 1;
                stats.writes += blitter.blit_row(row, &mut target) as u32;
            });

            match frame {
                Ok(Some(delay)) => {
                    stats.frames += 1;
                    if delay > Duration::from_ticks(0) {
                        Timer::after(delay).await;
                    } else {
                        yield_now().await;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(
                        "Decode error in {} after {} frames: {}",
                        request.animation.file_name(),
                        stats.frames,
                        e
                    );
                    break;
                }
            }
        }

        self.decoder.close();
        Ok(stats)
    }

    // whole file into a buffer of exactly its size; the file is closed on return
    fn load(&mut self, name: &str) -> Result<Vec<u8>, PlaybackError> {
        let mut file = self.store.open(name)?;
        let size = file.len();
        if size > MAX_ANIMATION_FILE_SIZE {
            return Err(PlaybackError::TooLarge { size });
        }

        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|_| PlaybackError::OutOfMemory { size })?;
        data.resize(size, 0);
        file.read_exact(&mut data)?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{DecodeError, Disposal, RowDraw};
    use crate::gif::GifDecoder;
    use crate::types::AnimationId;
    use core::cell::{Cell, RefCell};
    use embassy_futures::block_on;
    use embassy_futures::select::select;
    use std::collections::HashMap;
    use std::rc::Rc;

    // ---- storage fakes ----

    #[derive(Default)]
    struct MemoryStore {
        files: HashMap<&'static str, Vec<u8>>,
        /// Reported size overrides, for ceiling tests without real data
        sizes: HashMap<&'static str, usize>,
        opened: Rc<Cell<usize>>,
        closed: Rc<Cell<usize>>,
    }

    struct MemoryFile<'a> {
        data: &'a [u8],
        len: usize,
        pos: usize,
        closed: Rc<Cell<usize>>,
    }

    impl AnimationFile for MemoryFile<'_> {
        fn len(&self) -> usize {
            self.len
        }

        fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError> {
            let n = buf.len().min(self.data.len() - self.pos);
            buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    impl Drop for MemoryFile<'_> {
        fn drop(&mut self) {
            self.closed.set(self.closed.get() + 1);
        }
    }

    impl AnimationStore for MemoryStore {
        type File<'a> = MemoryFile<'a>;

        fn mount(&mut self, _format_on_failure: bool) -> Result<(), StorageError> {
            Ok(())
        }

        fn open(&mut self, name: &str) -> Result<MemoryFile<'_>, StorageError> {
            let data = self.files.get(name).ok_or(StorageError::NotFound)?;
            self.opened.set(self.opened.get() + 1);
            Ok(MemoryFile {
                data,
                len: self.sizes.get(name).copied().unwrap_or(data.len()),
                pos: 0,
                closed: self.closed.clone(),
            })
        }
    }

    // ---- decoder fake: N frames of H rows, each row 4 opaque pixels ----

    struct StripeDecoder {
        frames: u32,
        height: u16,
        played: u32,
        open_fails: bool,
        palette: [u16; 256],
        opened_with: Option<usize>,
    }

    impl StripeDecoder {
        fn new(frames: u32, height: u16) -> Self {
            Self {
                frames,
                height,
                played: 0,
                open_fails: false,
                palette: [0xABCD; 256],
                opened_with: None,
            }
        }
    }

    impl FrameDecoder for StripeDecoder {
        fn open(&mut self, data: &[u8]) -> Result<(), DecodeError> {
            if self.open_fails {
                return Err(DecodeError::BadSignature);
            }
            self.played = 0;
            self.opened_with = Some(data.len());
            Ok(())
        }

        fn play_frame<F>(&mut self, _data: &[u8], mut draw: F) -> Result<Option<Duration>, DecodeError>
        where
            F: FnMut(&mut RowDraw<'_>),
        {
            if self.played == self.frames {
                return Ok(None);
            }
            self.played += 1;
            for y in 0..self.height {
                let mut pixels = [1u8; 4];
                draw(&mut RowDraw {
                    x: 0,
                    y,
                    width: 4,
                    pixels: &mut pixels,
                    palette: &self.palette,
                    transparent: None,
                    background: 0,
                    disposal: Disposal::Keep,
                });
            }
            Ok(Some(Duration::from_ticks(0)))
        }

        fn close(&mut self) {
            self.opened_with = None;
        }
    }

    // ---- surface fake ----

    #[derive(Default)]
    struct RecordingPanels {
        writes: Rc<RefCell<Vec<(usize, u16, u16, usize)>>>,
    }

    impl SurfaceArray for RecordingPanels {
        fn draw_run(&mut self, surface: SurfaceIndex, x: u16, y: u16, colors: &[u16]) {
            self.writes
                .borrow_mut()
                .push((surface.get(), x, y, colors.len()));
        }
    }

    fn request(surface: usize, file: &'static str) -> DispatchRequest {
        DispatchRequest {
            surface: SurfaceIndex::new(surface).unwrap(),
            animation: AnimationId::new(file),
        }
    }

    fn store_with(files: &[(&'static str, usize)]) -> MemoryStore {
        let mut store = MemoryStore::default();
        for &(name, len) in files {
            store.files.insert(name, vec![0x47; len]);
        }
        store
    }

    #[test]
    fn plays_every_frame_onto_the_requested_surface() {
        let panels = RecordingPanels::default();
        let writes = panels.writes.clone();
        let mut player = AnimationPlayer::new(
            store_with(&[("2.GIF", 64)]),
            StripeDecoder::new(3, 2),
            panels,
        );

        let stats = block_on(player.play(request(1, "2.GIF"))).unwrap();

        assert_eq!(stats, PlaybackStats { frames: 3, rows: 6, writes: 6 });
        assert!(writes.borrow().iter().all(|w| w.0 == 1));
        assert_eq!(player.decoder.opened_with, None);
    }

    #[test]
    fn size_ceiling_is_inclusive_and_checked_before_reading() {
        let mut store = store_with(&[("1.GIF", 8), ("2.GIF", 8)]);
        store.sizes.insert("1.GIF", MAX_ANIMATION_FILE_SIZE + 1);
        let mut player =
            AnimationPlayer::new(store, StripeDecoder::new(1, 1), RecordingPanels::default());

        assert_eq!(
            block_on(player.play(request(0, "1.GIF"))),
            Err(PlaybackError::TooLarge { size: MAX_ANIMATION_FILE_SIZE + 1 })
        );
        // rejected before the decoder ever saw it
        assert_eq!(player.decoder.played, 0);
        assert_eq!(player.store.opened.get(), player.store.closed.get());
    }

    #[test]
    fn file_of_exactly_the_ceiling_is_played() {
        let mut player = AnimationPlayer::new(
            store_with(&[("6.GIF", MAX_ANIMATION_FILE_SIZE)]),
            StripeDecoder::new(1, 1),
            RecordingPanels::default(),
        );

        let stats = block_on(player.play(request(5, "6.GIF"))).unwrap();
        assert_eq!(stats.frames, 1);
    }

    #[test]
    fn missing_file_is_reported() {
        let mut player = AnimationPlayer::new(
            MemoryStore::default(),
            StripeDecoder::new(1, 1),
            RecordingPanels::default(),
        );
        assert_eq!(
            block_on(player.play(request(0, "1.GIF"))),
            Err(PlaybackError::NotFound)
        );
    }

    #[test]
    fn short_file_is_a_storage_error() {
        let mut store = store_with(&[("3.GIF", 4)]);
        store.sizes.insert("3.GIF", 10);
        let mut player =
            AnimationPlayer::new(store, StripeDecoder::new(1, 1), RecordingPanels::default());

        assert_eq!(
            block_on(player.play(request(2, "3.GIF"))),
            Err(PlaybackError::Storage)
        );
        assert_eq!(player.store.closed.get(), 1);
    }

    #[test]
    fn undecodable_file_is_a_silent_no_op() {
        let panels = RecordingPanels::default();
        let writes = panels.writes.clone();
        let mut decoder = StripeDecoder::new(2, 2);
        decoder.open_fails = true;
        let mut player = AnimationPlayer::new(store_with(&[("4.GIF", 16)]), decoder, panels);

        assert_eq!(
            block_on(player.play(request(3, "4.GIF"))),
            Ok(PlaybackStats::default())
        );
        assert!(writes.borrow().is_empty());
    }

    #[test]
    fn consumer_keeps_going_after_a_failed_request() {
        let panels = RecordingPanels::default();
        let writes = panels.writes.clone();
        let mut player = AnimationPlayer::new(
            store_with(&[("1.GIF", 8), ("2.GIF", 8)]),
            StripeDecoder::new(2, 3),
            panels,
        );
        let queue = DispatchQueue::new();
        queue.push(request(2, "3.GIF")).unwrap();
        queue.push(request(0, "1.GIF")).unwrap();
        queue.push(request(1, "2.GIF")).unwrap();

        let watch = async {
            for _ in 0..1_000 {
                if writes.borrow().len() >= 12 {
                    break;
                }
                yield_now().await;
            }
        };
        block_on(select(player.run(&queue), watch));

        // every write of the first playback precedes every write of the second
        let surfaces: Vec<usize> = writes.borrow().iter().map(|w| w.0).collect();
        assert_eq!(surfaces.len(), 12);
        assert!(surfaces[..6].iter().all(|&s| s == 0));
        assert!(surfaces[6..].iter().all(|&s| s == 1));
        assert!(queue.is_empty());
    }

    #[test]
    fn real_gif_is_blitted_with_transparency() {
        // 3x1, global palette of 4, transparent index 0, pixels [2, 0, 3]
        #[rustfmt::skip]
        let gif: Vec<u8> = vec![
            b'G', b'I', b'F', b'8', b'9', b'a', 3, 0, 1, 0, 0x81, 0, 0,
            0, 0, 0, 255, 0, 0, 0, 255, 0, 0, 0, 255,
            0x21, 0xF9, 4, 0x05, 0, 0, 0, 0,
            0x2C, 0, 0, 0, 0, 3, 0, 1, 0, 0,
            // literal codes with clears: 4,2,4,0,4,3,5 at 3 bits
            2, 3, 0x14, 0xC1, 0x15, 0,
            0x3B,
        ];
        let mut store = MemoryStore::default();
        store.files.insert("5.GIF", gif);
        let panels = RecordingPanels::default();
        let writes = panels.writes.clone();
        let mut player = AnimationPlayer::new(store, GifDecoder::new(), panels);

        let stats = block_on(player.play(request(4, "5.GIF"))).unwrap();

        assert_eq!(stats, PlaybackStats { frames: 1, rows: 1, writes: 2 });
        assert_eq!(*writes.borrow(), vec![(4, 0, 0, 1), (4, 2, 0, 1)]);
    }
}
