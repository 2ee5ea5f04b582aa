//! SSD1306 OLED command/data protocol driver.
//!
//! 128×32 panel over I²C.  Every bus transfer is a control byte followed
//! by payload: `0x00` prefixes command bytes, `0x40` prefixes GDDRAM data.
//! Data is streamed in chunks of at most 64 bytes to keep the transfer
//! buffer on the stack.
//!
//! The driver is generic over [`embedded_hal::i2c::I2c`]; bus errors
//! propagate unchanged to the caller.

use embedded_hal::i2c::I2c;
use log::info;

/// Default 7-bit bus address (SA0 low).
pub const DEFAULT_ADDR: u8 = 0x3C;

/// Panel width in pixels (columns).
pub const WIDTH: u8 = 128;
/// Panel height in pages (8 pixel rows each).
pub const PAGES: u8 = 4;

const CTRL_CMD: u8 = 0x00;
const CTRL_DATA: u8 = 0x40;
const DATA_CHUNK: usize = 64;

/// SSD1306 driver over an I²C bus.
pub struct Ssd1306<I2C> {
    i2c: I2C,
    addr: u8,
}

impl<I2C: I2c> Ssd1306<I2C> {
    pub fn new(i2c: I2C, addr: u8) -> Self {
        Self { i2c, addr }
    }

    /// Run the power-up sequence and clear the panel.
    pub fn init(&mut self) -> Result<(), I2C::Error> {
        self.display_on(false)?;
        self.set_clock_div(0x80)?;
        self.set_multiplex(31)?;
        self.set_offset(0)?;
        self.set_start_line(0)?;
        self.set_addressing_mode(0)?;
        self.set_segment_remap(true)?;
        self.set_scan_direction(false)?;
        self.set_com_pins(false, false)?;
        self.set_charge_pump(true)?;
        self.display_on(true)?;
        self.clear()?;
        info!("ssd1306: initialised at 0x{:02X}", self.addr);
        Ok(())
    }

    /// Disable the charge pump and blank the panel before power-down.
    pub fn power_off(&mut self) -> Result<(), I2C::Error> {
        self.set_charge_pump(false)?;
        self.display_on(false)
    }

    /// Display clock divide ratio / oscillator frequency (raw register).
    pub fn set_clock_div(&mut self, value: u8) -> Result<(), I2C::Error> {
        self.command(&[0xD5, value])
    }

    /// Multiplex ratio.  Clamped to the panel's valid 15..=63 range.
    pub fn set_multiplex(&mut self, mux: u8) -> Result<(), I2C::Error> {
        self.command(&[0xA8, mux.clamp(15, 63)])
    }

    /// Vertical display offset.  Clamped to 0..=63.
    pub fn set_offset(&mut self, offset: u8) -> Result<(), I2C::Error> {
        self.command(&[0xD3, offset.min(63)])
    }

    /// Display start line.  Clamped to 0..=63.
    pub fn set_start_line(&mut self, line: u8) -> Result<(), I2C::Error> {
        self.command(&[0x40 | line.min(63)])
    }

    /// Mirror horizontally (column 127 maps to SEG0 when set).
    pub fn set_segment_remap(&mut self, remap: bool) -> Result<(), I2C::Error> {
        self.command(&[if remap { 0xA1 } else { 0xA0 }])
    }

    /// Scan COM outputs in reverse when set.
    pub fn set_scan_direction(&mut self, reverse: bool) -> Result<(), I2C::Error> {
        self.command(&[if reverse { 0xC8 } else { 0xC0 }])
    }

    /// COM pins hardware configuration bits.
    pub fn set_com_pins(&mut self, alternative: bool, remap: bool) -> Result<(), I2C::Error> {
        let mut bits = 0x02;
        if remap {
            bits |= 1 << 4;
        }
        if alternative {
            bits |= 1 << 5;
        }
        self.command(&[0xDA, bits])
    }

    /// Memory addressing mode: 0 horizontal, 1 vertical, 2 page.
    /// Values above 2 are clamped to page mode.
    pub fn set_addressing_mode(&mut self, mode: u8) -> Result<(), I2C::Error> {
        self.command(&[0x20, mode.min(2)])
    }

    /// Column window for subsequent data writes.
    pub fn set_column_range(&mut self, start: u8, end: u8) -> Result<(), I2C::Error> {
        self.command(&[0x21, start, end])
    }

    /// Start column for page addressing mode (split nibble command pair).
    pub fn set_start_column(&mut self, start: u8) -> Result<(), I2C::Error> {
        self.command(&[start & 0x0F, (start >> 4) | 0x10])
    }

    /// Start page for page addressing mode.
    pub fn set_start_page(&mut self, page: u8) -> Result<(), I2C::Error> {
        self.command(&[0xB0 | (page & 0x07)])
    }

    /// Page window for subsequent data writes.
    pub fn set_page_range(&mut self, start: u8, end: u8) -> Result<(), I2C::Error> {
        self.command(&[0x22, start, end])
    }

    /// Charge pump on/off (must be on before `display_on(true)` with no
    /// external VCC).
    pub fn set_charge_pump(&mut self, on: bool) -> Result<(), I2C::Error> {
        self.command(&[0x8D, if on { 0x14 } else { 0x10 }])
    }

    /// Display panel on/off.
    pub fn display_on(&mut self, on: bool) -> Result<(), I2C::Error> {
        self.command(&[if on { 0xAF } else { 0xAE }])
    }

    /// Zero-fill the whole GDDRAM.
    pub fn clear(&mut self) -> Result<(), I2C::Error> {
        self.set_column_range(0, WIDTH - 1)?;
        self.set_page_range(0, PAGES - 1)?;
        let zeros = [0u8; DATA_CHUNK];
        let total = usize::from(WIDTH) * usize::from(PAGES);
        for _ in 0..total / DATA_CHUNK {
            self.data(&zeros)?;
        }
        Ok(())
    }

    /// Stream a framebuffer window.  `buf` is laid out page-major, one
    /// byte per 8-pixel column strip, and is sent in 64-byte chunks with
    /// a partial tail.
    pub fn draw(
        &mut self,
        buf: &[u8],
        col_start: u8,
        col_end: u8,
        page_start: u8,
        page_end: u8,
    ) -> Result<(), I2C::Error> {
        self.set_column_range(col_start, col_end)?;
        self.set_page_range(page_start, page_end)?;
        for chunk in buf.chunks(DATA_CHUNK) {
            self.data(chunk)?;
        }
        Ok(())
    }

    /// Release the bus handle.
    pub fn release(self) -> I2C {
        self.i2c
    }

    fn command(&mut self, cmd: &[u8]) -> Result<(), I2C::Error> {
        debug_assert!(cmd.len() <= 7);
        let mut packet = [0u8; 8];
        packet[0] = CTRL_CMD;
        packet[1..=cmd.len()].copy_from_slice(cmd);
        self.i2c.write(self.addr, &packet[..=cmd.len()])
    }

    fn data(&mut self, data: &[u8]) -> Result<(), I2C::Error> {
        debug_assert!(data.len() <= DATA_CHUNK);
        let mut packet = [0u8; DATA_CHUNK + 1];
        packet[0] = CTRL_DATA;
        packet[1..=data.len()].copy_from_slice(data);
        self.i2c.write(self.addr, &packet[..=data.len()])
    }
}
