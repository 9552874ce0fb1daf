//! Animation storage
//!
//! The player only sees [`AnimationStore`] and [`AnimationFile`]. On the
//! device they are backed by a FAT volume on an SPI SD card through
//! `embedded-sdmmc`; the volume and its root directory are opened once at
//! mount time and kept open for the life of the firmware.

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;
use embedded_sdmmc::{
    Mode, RawDirectory, RawFile, SdCard, TimeSource, Timestamp, VolumeIdx, VolumeManager,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum StorageError {
    /// No file with that name
    NotFound,
    /// Card or filesystem error
    Io,
    /// Used before a successful mount
    Unmounted,
}

/// An open, read-only animation file. Closed on drop.
pub trait AnimationFile {
    /// Size in bytes
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read from the current position. Returns 0 at end of file.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Fill `buf` completely or fail
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), StorageError> {
        let mut total = 0;
        while total < buf.len() {
            let n = self.read(&mut buf[total..])?;
            if n == 0 {
                return Err(StorageError::Io);
            }
            total += n;
        }
        Ok(())
    }
}

pub trait AnimationStore {
    type File<'a>: AnimationFile
    where
        Self: 'a;

    /// Mount the filesystem. `format_on_failure` is the forced second attempt.
    fn mount(&mut self, format_on_failure: bool) -> Result<(), StorageError>;

    fn open(&mut self, name: &str) -> Result<Self::File<'_>, StorageError>;
}

/// Try a normal mount, then the forced one. Both failing is fatal to startup.
pub fn mount_with_fallback<S: AnimationStore>(store: &mut S) -> Result<(), StorageError> {
    match store.mount(false) {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!("Storage mount failed ({}), retrying with fallback", e);
            store.mount(true).map_err(|e| {
                error!("Storage mount fallback failed: {}", e);
                e
            })
        }
    }
}

// ===================================================================
// SD Card Backend
// ===================================================================

/// No RTC on board and the volume is only read; timestamps are fixed.
#[derive(Default, Clone, Copy)]
pub struct FixedTimeSource;

impl TimeSource for FixedTimeSource {
    fn get_timestamp(&self) -> Timestamp {
        Timestamp {
            year_since_1970: 55,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

pub struct SdStore<SPI, D>
where
    SPI: SpiDevice<u8>,
    D: DelayNs,
{
    volume_mgr: VolumeManager<SdCard<SPI, D>, FixedTimeSource>,
    root: Option<RawDirectory>,
}

impl<SPI, D> SdStore<SPI, D>
where
    SPI: SpiDevice<u8>,
    D: DelayNs,
{
    pub fn new(card: SdCard<SPI, D>) -> Self {
        Self {
            volume_mgr: VolumeManager::new(card, FixedTimeSource),
            root: None,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.root.is_some()
    }
}

impl<SPI, D> AnimationStore for SdStore<SPI, D>
where
    SPI: SpiDevice<u8>,
    D: DelayNs,
{
    type File<'a>
        = SdFile<'a, SPI, D>
    where
        Self: 'a;

    fn mount(&mut self, format_on_failure: bool) -> Result<(), StorageError> {
        if self.root.is_some() {
            return Ok(());
        }
        // FAT formatting is not available here, so the forced attempt is a
        // plain retry against a card that has had time to settle.
        if format_on_failure {
            debug!("Storage: forced mount attempt");
        }

        let volume = self
            .volume_mgr
            .open_raw_volume(VolumeIdx(0))
            .map_err(|_| StorageError::Io)?;
        match self.volume_mgr.open_root_dir(volume) {
            Ok(root) => {
                self.root = Some(root);
                info!("Storage mounted");
                Ok(())
            }
            Err(_) => {
                let _ = self.volume_mgr.close_volume(volume);
                Err(StorageError::Io)
            }
        }
    }

    fn open(&mut self, name: &str) -> Result<Self::File<'_>, StorageError> {
        let root = self.root.ok_or(StorageError::Unmounted)?;
        let raw = self
            .volume_mgr
            .open_file_in_dir(root, name, Mode::ReadOnly)
            .map_err(|e| match e {
                embedded_sdmmc::Error::NotFound => StorageError::NotFound,
                _ => StorageError::Io,
            })?;
        let len = match self.volume_mgr.file_length(raw) {
            Ok(len) => len as usize,
            Err(_) => {
                let _ = self.volume_mgr.close_file(raw);
                return Err(StorageError::Io);
            }
        };

        Ok(SdFile {
            volume_mgr: &self.volume_mgr,
            raw,
            len,
        })
    }
}

pub struct SdFile<'a, SPI, D>
where
    SPI: SpiDevice<u8>,
    D: DelayNs,
{
    volume_mgr: &'a VolumeManager<SdCard<SPI, D>, FixedTimeSource>,
    raw: RawFile,
    len: usize,
}

impl<SPI, D> AnimationFile for SdFile<'_, SPI, D>
where
    SPI: SpiDevice<u8>,
    D: DelayNs,
{
    fn len(&self) -> usize {
        self.len
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.volume_mgr
            .read(self.raw, buf)
            .map_err(|_| StorageError::Io)
    }
}

impl<SPI, D> Drop for SdFile<'_, SPI, D>
where
    SPI: SpiDevice<u8>,
    D: DelayNs,
{
    fn drop(&mut self) {
        if self.volume_mgr.close_file(self.raw).is_err() {
            warn!("Storage: close failed");
        }
    }
}
