// SPDX-FileCopyrightText: 2024 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A driver for HD44780 style 16x2 character displays attached via GPIO
//! in 4-bit mode.
//!
//! The display is driven through six [`OutputPin`]s, RS, E and D4..D7, so any
//! [`embedded_hal::digital`] implementation can be used, including the
//! sysfs pins provided by `gpiosysfs-embedded-hal`.
//!
//! ```no_run
//! # fn example() -> anyhow::Result<()> {
//! use embedded_hal::digital::PinState;
//! use gpiosysfs_embedded_hal::OutputPin;
//! use gpiosysfs_lcd::{Lcd, StdDelay};
//!
//! let pin = |n| OutputPin::new(n, PinState::Low);
//! let mut lcd = Lcd::new(pin(7)?, pin(8)?, pin(25)?, pin(24)?, pin(23)?, pin(18)?, StdDelay);
//! lcd.initialize()?;
//! lcd.write_string("Hello", 1)?;
//! lcd.write_string("World", 2)?;
//! # Ok(())
//! # }
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{OutputPin, PinState};
use log::trace;
use std::fmt;
use std::time::Duration;

/// The number of characters on each line of the display.
pub const LINE_WIDTH: usize = 16;

/// The number of lines on the display.
pub const LINES: u8 = 2;

/// The DDRAM address of the start of each line after the first.
const LINE_STRIDE: u8 = 0x40;

/// The default delay, in microseconds, around each pulse of E.
pub const DEFAULT_DELAY_US: u32 = 50;

/// The default width, in microseconds, of each pulse of E.
pub const DEFAULT_PULSE_US: u32 = 50;

/// A character display driven in 4-bit mode.
pub struct Lcd<P, D> {
    rs: P,
    e: P,
    data: [P; 4],
    delay: D,
    delay_us: u32,
    pulse_us: u32,
}

impl<P, D> Lcd<P, D>
where
    P: OutputPin,
    D: DelayNs,
{
    /// Create a driver for a display attached to the given pins.
    ///
    /// The pins must already be configured as outputs.
    /// The display is not touched until [`initialize`] is called.
    ///
    /// [`initialize`]: Lcd::initialize
    pub fn new(rs: P, e: P, d4: P, d5: P, d6: P, d7: P, delay: D) -> Self {
        Lcd {
            rs,
            e,
            data: [d4, d5, d6, d7],
            delay,
            delay_us: DEFAULT_DELAY_US,
            pulse_us: DEFAULT_PULSE_US,
        }
    }

    /// Override the delays around and during each pulse of E.
    pub fn with_timing(mut self, delay_us: u32, pulse_us: u32) -> Self {
        self.delay_us = delay_us;
        self.pulse_us = pulse_us;
        self
    }

    /// Return the pins and delay, in RS, E, D4..D7 order.
    pub fn release(self) -> (P, P, [P; 4], D) {
        (self.rs, self.e, self.data, self.delay)
    }

    /// Switch the display into 4-bit mode and clear it.
    ///
    /// The display is left on, with the cursor hidden and incrementing.
    pub fn initialize(&mut self) -> Result<(), Error<P::Error>> {
        self.write_byte(0x33, true)?;
        self.write_byte(0x32, true)?;
        self.entry_mode(true, false)?;
        self.display_on_off_control(true, false, false)?;
        self.function_set(false, true, false)?;
        self.clear_display()?;
        self.delay.delay_us(self.delay_us);
        Ok(())
    }

    /// Write the text to a line of the display, numbered from 1.
    ///
    /// The text is padded with spaces, or truncated, to fill the line.
    /// Each byte of the text is written as a character code, so the text
    /// should be restricted to characters supported by the display ROM.
    pub fn write_string(&mut self, text: &str, line: u8) -> Result<(), Error<P::Error>> {
        if line == 0 || line > LINES {
            return Err(Error::InvalidLine(line));
        }
        self.set_ddram_address((line - 1) * LINE_STRIDE)?;
        let bytes = text
            .bytes()
            .chain(std::iter::repeat(b' '))
            .take(LINE_WIDTH);
        for b in bytes {
            self.write_byte(b, false)?;
        }
        Ok(())
    }

    /// Overwrite all characters with spaces and return the cursor home.
    pub fn clear_display(&mut self) -> Result<(), Error<P::Error>> {
        self.write_byte(0x01, true)
    }

    /// Return the cursor to position 0 and undo any shift.
    pub fn return_home(&mut self) -> Result<(), Error<P::Error>> {
        self.write_byte(0x02, true)
    }

    /// Set the cursor move direction and whether the display shifts on
    /// writes.
    pub fn entry_mode(&mut self, increment: bool, shift: bool) -> Result<(), Error<P::Error>> {
        self.write_byte(0x04 | flag(increment, 0x02) | flag(shift, 0x01), true)
    }

    /// Control the display, cursor and cursor blink.
    pub fn display_on_off_control(
        &mut self,
        display: bool,
        cursor: bool,
        blink: bool,
    ) -> Result<(), Error<P::Error>> {
        self.write_byte(
            0x08 | flag(display, 0x04) | flag(cursor, 0x02) | flag(blink, 0x01),
            true,
        )
    }

    /// Select the interface width, number of lines and font.
    ///
    /// `data_8bit` must be false while the display is driven by this driver.
    pub fn function_set(
        &mut self,
        data_8bit: bool,
        two_lines: bool,
        large_font: bool,
    ) -> Result<(), Error<P::Error>> {
        self.write_byte(
            0x20 | flag(data_8bit, 0x10) | flag(two_lines, 0x08) | flag(large_font, 0x04),
            true,
        )
    }

    /// Set the character generator RAM address.
    pub fn set_cgram_address(&mut self, address: u8) -> Result<(), Error<P::Error>> {
        self.write_byte(0x40 | (address & 0x3F), true)
    }

    /// Set the display data RAM address for subsequent writes.
    pub fn set_ddram_address(&mut self, address: u8) -> Result<(), Error<P::Error>> {
        self.write_byte(0x80 | (address & 0x7F), true)
    }

    // High nibble first, each latched by a pulse of E.
    fn write_byte(&mut self, byte: u8, command: bool) -> Result<(), Error<P::Error>> {
        trace!(
            "lcd {} {:#04x}",
            if command { "command" } else { "data" },
            byte
        );
        self.rs.set_state(PinState::from(!command)).map_err(Error::Pin)?;
        self.write_nibble(byte >> 4)?;
        self.write_nibble(byte & 0x0F)
    }

    fn write_nibble(&mut self, nibble: u8) -> Result<(), Error<P::Error>> {
        for (i, pin) in self.data.iter_mut().enumerate() {
            pin.set_state(PinState::from(nibble & (1 << i) != 0))
                .map_err(Error::Pin)?;
        }
        self.pulse_enable()
    }

    fn pulse_enable(&mut self) -> Result<(), Error<P::Error>> {
        self.delay.delay_us(self.delay_us);
        self.e.set_high().map_err(Error::Pin)?;
        self.delay.delay_us(self.pulse_us);
        self.e.set_low().map_err(Error::Pin)?;
        self.delay.delay_us(self.delay_us);
        Ok(())
    }
}

impl<P, D> fmt::Debug for Lcd<P, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lcd")
            .field("delay_us", &self.delay_us)
            .field("pulse_us", &self.pulse_us)
            .finish()
    }
}

fn flag(set: bool, bit: u8) -> u8 {
    if set {
        bit
    } else {
        0
    }
}

/// A [`DelayNs`] that sleeps the current thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(ns.into()));
    }
}

/// Errors returned by [`Lcd`] functions.
#[derive(Debug, thiserror::Error)]
pub enum Error<E: fmt::Debug> {
    /// The display does not have the requested line.
    #[error("display has no line {0}")]
    InvalidLine(u8),

    /// An error returned from setting one of the pins.
    #[error("pin error: {0:?}")]
    Pin(E),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::convert::Infallible;
    use std::rc::Rc;

    // Shared record of every level set, by pin index.
    type Trace = Rc<RefCell<Vec<(usize, bool)>>>;

    const RS: usize = 0;
    const E: usize = 1;

    struct FakePin {
        id: usize,
        trace: Trace,
    }

    impl embedded_hal::digital::ErrorType for FakePin {
        type Error = Infallible;
    }

    impl OutputPin for FakePin {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.trace.borrow_mut().push((self.id, false));
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.trace.borrow_mut().push((self.id, true));
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeDelay {
        total_ns: u64,
    }

    impl DelayNs for FakeDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ns += u64::from(ns);
        }
    }

    fn lcd() -> (Lcd<FakePin, FakeDelay>, Trace) {
        let trace = Trace::default();
        let pin = |id| FakePin {
            id,
            trace: trace.clone(),
        };
        let lcd = Lcd::new(pin(0), pin(1), pin(2), pin(3), pin(4), pin(5), FakeDelay::default());
        (lcd, trace)
    }

    // Sample RS and D4..D7 on each rising edge of E, and pair up the nibbles.
    fn decode(trace: &Trace) -> Vec<(bool, u8)> {
        let mut levels = [false; 6];
        let mut nibbles = Vec::new();
        for &(id, level) in trace.borrow().iter() {
            if id == E && level && !levels[E] {
                let n = (0..4).fold(0u8, |n, i| n | (u8::from(levels[i + 2]) << i));
                nibbles.push((!levels[RS], n));
            }
            levels[id] = level;
        }
        nibbles
            .chunks(2)
            .map(|c| {
                assert_eq!(c[0].0, c[1].0, "RS changed mid byte");
                (c[0].0, c[0].1 << 4 | c[1].1)
            })
            .collect()
    }

    #[test]
    fn initialize() {
        let (mut lcd, trace) = lcd();
        lcd.initialize().unwrap();
        assert_eq!(
            decode(&trace),
            vec![
                (true, 0x33),
                (true, 0x32),
                (true, 0x06),
                (true, 0x0C),
                (true, 0x28),
                (true, 0x01),
            ]
        );
        // 6 bytes of 2 pulses, each with two delays and the pulse, then the final delay
        let (.., delay) = lcd.release();
        assert_eq!(delay.total_ns, (6 * 2 * 150 + 50) * 1000);
    }

    #[test]
    fn commands() {
        let (mut lcd, trace) = lcd();
        lcd.clear_display().unwrap();
        lcd.return_home().unwrap();
        lcd.entry_mode(false, true).unwrap();
        lcd.display_on_off_control(true, true, true).unwrap();
        lcd.function_set(true, false, true).unwrap();
        lcd.set_cgram_address(0xFF).unwrap();
        lcd.set_ddram_address(0xFF).unwrap();
        assert_eq!(
            decode(&trace),
            vec![
                (true, 0x01),
                (true, 0x02),
                (true, 0x05),
                (true, 0x0F),
                (true, 0x34),
                (true, 0x7F),
                (true, 0xFF),
            ]
        );
    }

    #[test]
    fn write_string_pads() {
        let (mut lcd, trace) = lcd();
        lcd.write_string("Hi", 1).unwrap();
        let bytes = decode(&trace);
        assert_eq!(bytes.len(), 1 + LINE_WIDTH);
        assert_eq!(bytes[0], (true, 0x80));
        assert_eq!(bytes[1], (false, b'H'));
        assert_eq!(bytes[2], (false, b'i'));
        assert!(bytes[3..].iter().all(|&b| b == (false, b' ')));
    }

    #[test]
    fn write_string_truncates() {
        let (mut lcd, trace) = lcd();
        lcd.write_string("0123456789abcdefXYZ", 2).unwrap();
        let bytes = decode(&trace);
        assert_eq!(bytes[0], (true, 0xC0));
        let text: Vec<u8> = bytes[1..].iter().map(|b| b.1).collect();
        assert_eq!(text, b"0123456789abcdef");
    }

    #[test]
    fn write_string_invalid_line() {
        let (mut lcd, trace) = lcd();
        assert!(matches!(
            lcd.write_string("x", 0),
            Err(Error::InvalidLine(0))
        ));
        assert!(matches!(
            lcd.write_string("x", 3),
            Err(Error::InvalidLine(3))
        ));
        assert!(trace.borrow().is_empty());
    }

    #[test]
    fn timing() {
        let (lcd, _trace) = lcd();
        let mut lcd = lcd.with_timing(10, 5);
        lcd.return_home().unwrap();
        let (.., delay) = lcd.release();
        assert_eq!(delay.total_ns, 2 * 25 * 1000);
    }
}
