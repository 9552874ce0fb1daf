//! Driver for the six ST7735 key panels
//!
//! All panels hang off one SPI bus and share DC and RESET; each has its own
//! chip select. Every command sequence selects exactly one panel, so from the
//! bus' point of view the array behaves like six separate displays.

use embassy_time::{Duration, Timer};
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

use crate::config::{
    DeckConfig, Rotation, BUTTON_COUNT, MAX_BLIT_WIDTH, PANEL_COL_OFFSET, PANEL_HEIGHT,
    PANEL_ROW_OFFSET, PANEL_WIDTH,
};
use crate::player::SurfaceArray;
use crate::types::SurfaceIndex;

// ===================================================================
// ST7735 Commands
// ===================================================================

const SWRESET: u8 = 0x01;
const SLPOUT: u8 = 0x11;
const NORON: u8 = 0x13;
const INVOFF: u8 = 0x20;
const DISPON: u8 = 0x29;
const CASET: u8 = 0x2A;
const RASET: u8 = 0x2B;
const RAMWR: u8 = 0x2C;
const MADCTL: u8 = 0x36;
const COLMOD: u8 = 0x3A;

const MADCTL_MY: u8 = 0x80;
const MADCTL_MX: u8 = 0x40;
const MADCTL_MV: u8 = 0x20;

const COLMOD_RGB565: u8 = 0x05;

/// MADCTL value for a mounting orientation (row/column exchange for landscape)
pub const fn madctl(rotation: Rotation) -> u8 {
    match rotation {
        Rotation::Landscape => MADCTL_MY | MADCTL_MV,
        Rotation::LandscapeFlipped => MADCTL_MX | MADCTL_MV,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(target_os = "none", derive(defmt::Format))]
pub enum PanelError {
    Spi,
    Pin,
}

// ===================================================================
// Panel Array
// ===================================================================

pub struct PanelArray<SPI, DC, CS> {
    spi: SPI,
    dc: DC,
    cs: [CS; BUTTON_COUNT],
    rotations: [Rotation; BUTTON_COUNT],
    // RGB565 big-endian staging for one run
    line: [u8; MAX_BLIT_WIDTH * 2],
}

impl<SPI, DC, CS> PanelArray<SPI, DC, CS>
where
    SPI: SpiBus,
    DC: OutputPin,
    CS: OutputPin,
{
    pub fn new(spi: SPI, dc: DC, cs: [CS; BUTTON_COUNT], config: &DeckConfig) -> Self {
        Self {
            spi,
            dc,
            cs,
            rotations: core::array::from_fn(|i| config.slots[i].rotation),
            line: [0; MAX_BLIT_WIDTH * 2],
        }
    }

    /// Bring up every panel (the shared reset line must already have been
    /// pulsed) and clear it to black
    pub async fn init(&mut self) -> Result<(), PanelError> {
        info!("Initializing {} panels ({}x{})", BUTTON_COUNT, PANEL_WIDTH, PANEL_HEIGHT);

        for i in 0..BUTTON_COUNT {
            self.init_panel(i).await?;
        }
        for i in 0..BUTTON_COUNT {
            self.fill_index(i, 0x0000)?;
        }

        info!("Panel initialization complete");
        Ok(())
    }

    async fn init_panel(&mut self, index: usize) -> Result<(), PanelError> {
        self.select(index)?;

        self.send_command(SWRESET)?;
        Timer::after(Duration::from_millis(150)).await;

        self.send_command(SLPOUT)?;
        Timer::after(Duration::from_millis(120)).await;

        self.send_command(COLMOD)?;
        self.send_data(&[COLMOD_RGB565])?;

        self.send_command(MADCTL)?;
        self.send_data(&[madctl(self.rotations[index])])?;

        self.send_command(INVOFF)?;
        self.send_command(NORON)?;
        self.send_command(DISPON)?;
        Timer::after(Duration::from_millis(10)).await;

        self.deselect(index)?;
        debug!("Panel {} ready", index);
        Ok(())
    }

    fn select(&mut self, index: usize) -> Result<(), PanelError> {
        self.cs[index].set_low().map_err(|_| PanelError::Pin)
    }

    fn deselect(&mut self, index: usize) -> Result<(), PanelError> {
        self.spi.flush().map_err(|_| PanelError::Spi)?;
        self.cs[index].set_high().map_err(|_| PanelError::Pin)
    }

    fn send_command(&mut self, command: u8) -> Result<(), PanelError> {
        // DC low for command mode; the previous data must be out first
        self.spi.flush().map_err(|_| PanelError::Spi)?;
        self.dc.set_low().map_err(|_| PanelError::Pin)?;
        self.spi.write(&[command]).map_err(|_| PanelError::Spi)
    }

    fn send_data(&mut self, data: &[u8]) -> Result<(), PanelError> {
        self.spi.flush().map_err(|_| PanelError::Spi)?;
        self.dc.set_high().map_err(|_| PanelError::Pin)?;
        self.spi.write(data).map_err(|_| PanelError::Spi)
    }

    /// Address an inclusive window in panel coordinates and start a RAM write
    fn set_window(&mut self, x0: u16, y0: u16, x1: u16, y1: u16) -> Result<(), PanelError> {
        let (x0, x1) = (x0 + PANEL_COL_OFFSET, x1 + PANEL_COL_OFFSET);
        let (y0, y1) = (y0 + PANEL_ROW_OFFSET, y1 + PANEL_ROW_OFFSET);

        self.send_command(CASET)?;
        self.send_data(&[(x0 >> 8) as u8, x0 as u8, (x1 >> 8) as u8, x1 as u8])?;

        self.send_command(RASET)?;
        self.send_data(&[(y0 >> 8) as u8, y0 as u8, (y1 >> 8) as u8, y1 as u8])?;

        self.send_command(RAMWR)
    }

    // stream the first `pixels` staged pixels `times` times as RAM data
    fn write_line(&mut self, pixels: usize, times: u16) -> Result<(), PanelError> {
        self.spi.flush().map_err(|_| PanelError::Spi)?;
        self.dc.set_high().map_err(|_| PanelError::Pin)?;
        for _ in 0..times {
            self.spi
                .write(&self.line[..pixels * 2])
                .map_err(|_| PanelError::Spi)?;
        }
        Ok(())
    }

    /// Write a horizontal run of RGB565 pixels, clipped to the panel
    pub fn write_run(
        &mut self,
        surface: SurfaceIndex,
        x: u16,
        y: u16,
        colors: &[u16],
    ) -> Result<(), PanelError> {
        if x >= PANEL_WIDTH || y >= PANEL_HEIGHT || colors.is_empty() {
            return Ok(());
        }
        let len = colors
            .len()
            .min((PANEL_WIDTH - x) as usize)
            .min(MAX_BLIT_WIDTH);

        for (bytes, color) in self.line.chunks_exact_mut(2).zip(&colors[..len]) {
            bytes.copy_from_slice(&color.to_be_bytes());
        }

        let index = surface.get();
        self.select(index)?;
        let result = self
            .set_window(x, y, x + len as u16 - 1, y)
            .and_then(|()| self.write_line(len, 1));
        self.deselect(index)?;
        result
    }

    /// Fill a whole panel with one color
    pub fn fill(&mut self, surface: SurfaceIndex, color: u16) -> Result<(), PanelError> {
        self.fill_index(surface.get(), color)
    }

    fn fill_index(&mut self, index: usize, color: u16) -> Result<(), PanelError> {
        for bytes in self.line.chunks_exact_mut(2) {
            bytes.copy_from_slice(&color.to_be_bytes());
        }

        self.select(index)?;
        let result = self
            .set_window(0, 0, PANEL_WIDTH - 1, PANEL_HEIGHT - 1)
            .and_then(|()| self.write_line(PANEL_WIDTH as usize, PANEL_HEIGHT));
        self.deselect(index)?;
        result
    }
}

impl<SPI, DC, CS> SurfaceArray for PanelArray<SPI, DC, CS>
where
    SPI: SpiBus,
    DC: OutputPin,
    CS: OutputPin,
{
    fn draw_run(&mut self, surface: SurfaceIndex, x: u16, y: u16, colors: &[u16]) {
        if let Err(e) = self.write_run(surface, x, y, colors) {
            warn!("Panel {} write failed: {}", surface.get(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::RefCell;
    use core::convert::Infallible;
    use std::rc::Rc;
    use std::vec::Vec;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Command(u8),
        Data(Vec<u8>),
        Select(usize),
        Deselect(usize),
    }

    type Log = Rc<RefCell<Vec<Event>>>;

    struct FakeBus {
        log: Log,
        dc_high: Rc<RefCell<bool>>,
    }

    impl embedded_hal::spi::ErrorType for FakeBus {
        type Error = Infallible;
    }

    impl SpiBus for FakeBus {
        fn read(&mut self, _words: &mut [u8]) -> Result<(), Infallible> {
            Ok(())
        }

        fn write(&mut self, words: &[u8]) -> Result<(), Infallible> {
            let mut log = self.log.borrow_mut();
            if *self.dc_high.borrow() {
                // coalesce consecutive data writes
                if let Some(Event::Data(bytes)) = log.last_mut() {
                    bytes.extend_from_slice(words);
                    return Ok(());
                }
                log.push(Event::Data(words.to_vec()));
            } else {
                for &w in words {
                    log.push(Event::Command(w));
                }
            }
            Ok(())
        }

        fn transfer(&mut self, _read: &mut [u8], _write: &[u8]) -> Result<(), Infallible> {
            Ok(())
        }

        fn transfer_in_place(&mut self, _words: &mut [u8]) -> Result<(), Infallible> {
            Ok(())
        }

        fn flush(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
    }

    struct FakeDc(Rc<RefCell<bool>>);

    impl embedded_hal::digital::ErrorType for FakeDc {
        type Error = Infallible;
    }

    impl OutputPin for FakeDc {
        fn set_low(&mut self) -> Result<(), Infallible> {
            *self.0.borrow_mut() = false;
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            *self.0.borrow_mut() = true;
            Ok(())
        }
    }

    struct FakeCs {
        index: usize,
        log: Log,
    }

    impl embedded_hal::digital::ErrorType for FakeCs {
        type Error = Infallible;
    }

    impl OutputPin for FakeCs {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.log.borrow_mut().push(Event::Select(self.index));
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.log.borrow_mut().push(Event::Deselect(self.index));
            Ok(())
        }
    }

    fn array() -> (PanelArray<FakeBus, FakeDc, FakeCs>, Log) {
        let log: Log = Rc::default();
        let dc = Rc::new(RefCell::new(false));
        let panels = PanelArray::new(
            FakeBus {
                log: log.clone(),
                dc_high: dc.clone(),
            },
            FakeDc(dc),
            core::array::from_fn(|index| FakeCs {
                index,
                log: log.clone(),
            }),
            &DeckConfig::standard(),
        );
        (panels, log)
    }

    fn surface(i: usize) -> SurfaceIndex {
        SurfaceIndex::new(i).unwrap()
    }

    #[test]
    fn run_selects_one_panel_and_addresses_one_row() {
        let (mut panels, log) = array();

        panels.write_run(surface(2), 10, 5, &[0xF800, 0x001F]).unwrap();

        let y = 5 + PANEL_ROW_OFFSET;
        assert_eq!(
            *log.borrow(),
            vec![
                Event::Select(2),
                Event::Command(CASET),
                Event::Data(vec![0, 10, 0, 11]),
                Event::Command(RASET),
                Event::Data(vec![0, y as u8, 0, y as u8]),
                Event::Command(RAMWR),
                Event::Data(vec![0xF8, 0x00, 0x00, 0x1F]),
                Event::Deselect(2),
            ]
        );
    }

    #[test]
    fn runs_are_clipped_to_the_panel() {
        let (mut panels, log) = array();
        let colors = [0x1234u16; 20];

        panels.write_run(surface(0), PANEL_WIDTH - 4, 0, &colors).unwrap();

        let log = log.borrow();
        assert_eq!(log[2], Event::Data(vec![0, 156, 0, 159]));
        assert_eq!(log[6], Event::Data([0x12, 0x34].repeat(4)));
    }

    #[test]
    fn off_panel_runs_touch_nothing() {
        let (mut panels, log) = array();

        panels.write_run(surface(0), 0, PANEL_HEIGHT, &[1, 2, 3]).unwrap();
        panels.write_run(surface(0), PANEL_WIDTH, 0, &[1]).unwrap();
        panels.write_run(surface(0), 0, 0, &[]).unwrap();

        assert!(log.borrow().is_empty());
    }

    #[test]
    fn fill_covers_the_whole_panel() {
        let (mut panels, log) = array();

        panels.fill(surface(4), 0xFFFF).unwrap();

        let log = log.borrow();
        assert_eq!(log.first(), Some(&Event::Select(4)));
        assert_eq!(log.last(), Some(&Event::Deselect(4)));
        let Event::Data(pixels) = &log[log.len() - 2] else {
            panic!("expected pixel data");
        };
        assert_eq!(pixels.len(), PANEL_WIDTH as usize * PANEL_HEIGHT as usize * 2);
        assert!(pixels.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn rotations_follow_mounting() {
        let config = DeckConfig::standard();
        assert_eq!(madctl(config.slots[0].rotation), MADCTL_MX | MADCTL_MV);
        assert_eq!(madctl(config.slots[5].rotation), MADCTL_MY | MADCTL_MV);
    }
}
