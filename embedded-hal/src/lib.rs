// SPDX-FileCopyrightText: 2024 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A library providing [`embedded_hal::digital`] traits for
//! [`gpiosysfs::Pin`] and therefore for any Linux platform supporting the
//! sysfs GPIO interface.
//!
//! The wrapped pins are enabled and configured as an input or output.
//!
//! As the wrappers are generic over the [`PinIo`] backend, drivers written
//! against the [`embedded_hal::digital`] traits can be exercised with pins
//! from a [`gpiosysfs::emulator::Emulator`].
//!
//! # Example Usage
//!
//! Reading an input pin:
//!
//! ```no_run
//! # fn example() -> Result<(), gpiosysfs_embedded_hal::Error> {
//! use embedded_hal::digital::InputPin;
//!
//! let mut pin = gpiosysfs_embedded_hal::InputPin::new(4)?;
//! if pin.is_high()? {
//!     println!("Input is high.");
//! }
//! # Ok(())
//! # }
//! ```
//! Setting an output pin:
//!
//! ```no_run
//! # fn example() -> Result<(), gpiosysfs_embedded_hal::Error> {
//! use embedded_hal::digital::{OutputPin, PinState};
//!
//! // level is set as part of the construction
//! let mut led0 = gpiosysfs_embedded_hal::OutputPin::new(17, PinState::High)?;
//!
//! // change the level later
//! led0.set_low()?;
//! # Ok(())
//! # }
//! ```
//!
//! [`PinIo`]: gpiosysfs::backend::PinIo

use embedded_hal::digital::PinState;
use gpiosysfs::backend::{PinIo, SysfsBackend};
use gpiosysfs::line::{Direction, Number, Value};
use gpiosysfs::Pin;

/// Provides [`embedded_hal::digital`] traits for a [`gpiosysfs::Pin`]
/// configured as an input.
///
/// The pin remains exported while the [`InputPin`] is held.
/// Dropping the [`InputPin`] unexports the pin.
#[derive(Debug)]
pub struct InputPin<B: PinIo = SysfsBackend>(Pin<B>);

impl InputPin<SysfsBackend> {
    /// Creates a new input pin for the given sysfs GPIO `number`.
    ///
    /// ```no_run
    /// # fn example() -> Result<(), gpiosysfs_embedded_hal::Error> {
    /// use embedded_hal::digital::InputPin;
    ///
    /// let mut pin = gpiosysfs_embedded_hal::InputPin::new(4)?;
    /// if pin.is_high()? {
    ///     println!("Input is high.");
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(number: Number) -> Result<Self, Error> {
        Self::from_pin(Pin::sysfs(number))
    }
}

impl<B: PinIo> InputPin<B> {
    /// Enable the pin, if necessary, and configure it as an input.
    pub fn from_pin(mut pin: Pin<B>) -> Result<Self, Error> {
        pin.enable()?;
        pin.set_direction(Direction::Input)?;
        Ok(InputPin(pin))
    }

    /// The number of the wrapped pin.
    pub fn number(&self) -> Number {
        self.0.number()
    }

    /// Set this pin to output mode.
    pub fn into_output_pin(mut self, state: PinState) -> Result<OutputPin<B>, Error> {
        let value = state_to_value(state);
        self.0.set_direction(Direction::Output)?;
        self.0.set_value(value)?;
        Ok(OutputPin { pin: self.0, value })
    }
}

impl<B: PinIo> TryFrom<Pin<B>> for InputPin<B> {
    type Error = Error;

    /// Convert an enabled input [`gpiosysfs::Pin`] into an [`InputPin`].
    ///
    /// [`InputPin::from_pin`] should be used for pins that are not yet
    /// configured.
    fn try_from(mut pin: Pin<B>) -> Result<Self, Self::Error> {
        if !pin.is_enabled() {
            return Err(Error::RequiresEnabled);
        }
        if pin.direction()? != Direction::Input {
            return Err(Error::RequiresInputMode);
        }
        Ok(InputPin(pin))
    }
}

impl<B: PinIo> From<InputPin<B>> for Pin<B> {
    /// Convert the [`InputPin`] into the contained [`Pin`].
    fn from(pin: InputPin<B>) -> Self {
        pin.0
    }
}

impl<B: PinIo> embedded_hal::digital::InputPin for InputPin<B> {
    #[inline]
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0.value()? == Value::Active)
    }

    #[inline]
    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.is_high()?)
    }
}

impl<B: PinIo> embedded_hal::digital::ErrorType for InputPin<B> {
    /// Errors returned by [`InputPin`].
    type Error = Error;
}

/// Provides [`embedded_hal::digital`] traits for a [`gpiosysfs::Pin`]
/// configured as an output.
///
/// The value last set is cached, so setting the same level again performs
/// no I/O.
///
/// Dropping the [`OutputPin`] unexports the pin, after which the line may be
/// altered by other users or by the kernel itself.
#[derive(Debug)]
pub struct OutputPin<B: PinIo = SysfsBackend> {
    pin: Pin<B>,
    value: Value,
}

impl OutputPin<SysfsBackend> {
    /// Creates a new output pin for the given sysfs GPIO `number`.
    ///
    /// ```no_run
    /// # fn example() -> Result<(), gpiosysfs_embedded_hal::Error> {
    /// use embedded_hal::digital::{OutputPin, PinState};
    ///
    /// let mut pin = gpiosysfs_embedded_hal::OutputPin::new(17, PinState::Low)?;
    /// // later...
    /// pin.set_high()?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(number: Number, state: PinState) -> Result<Self, Error> {
        Self::from_pin(Pin::sysfs(number), state)
    }
}

impl<B: PinIo> OutputPin<B> {
    /// Enable the pin, if necessary, and configure it as an output with the
    /// given level.
    pub fn from_pin(mut pin: Pin<B>, state: PinState) -> Result<Self, Error> {
        let value = state_to_value(state);
        pin.enable()?;
        pin.set_direction(Direction::Output)?;
        pin.set_value(value)?;
        Ok(OutputPin { pin, value })
    }

    /// The number of the wrapped pin.
    pub fn number(&self) -> Number {
        self.pin.number()
    }

    /// Set this pin to input mode.
    pub fn into_input_pin(mut self) -> Result<InputPin<B>, Error> {
        self.pin.set_direction(Direction::Input)?;
        Ok(InputPin(self.pin))
    }

    fn set_value(&mut self, value: Value) -> Result<(), Error> {
        self.pin.set_value(value)?;
        self.value = value;
        Ok(())
    }
}

impl<B: PinIo> TryFrom<Pin<B>> for OutputPin<B> {
    type Error = Error;

    /// Convert an enabled output [`gpiosysfs::Pin`] into an [`OutputPin`].
    ///
    /// The current value of the pin is retained.
    /// [`OutputPin::from_pin`] should be used for pins that are not yet
    /// configured.
    fn try_from(mut pin: Pin<B>) -> Result<Self, Self::Error> {
        if !pin.is_enabled() {
            return Err(Error::RequiresEnabled);
        }
        if pin.direction()? != Direction::Output {
            return Err(Error::RequiresOutputMode);
        }
        let value = pin.value()?;
        Ok(OutputPin { pin, value })
    }
}

impl<B: PinIo> From<OutputPin<B>> for Pin<B> {
    /// Convert the [`OutputPin`] into the contained [`Pin`].
    fn from(pin: OutputPin<B>) -> Self {
        pin.pin
    }
}

impl<B: PinIo> embedded_hal::digital::InputPin for OutputPin<B> {
    // Reads back the value attribute, which for an output is the level
    // being driven.

    #[inline]
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.pin.value()? == Value::Active)
    }

    #[inline]
    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.is_high()?)
    }
}

impl<B: PinIo> embedded_hal::digital::OutputPin for OutputPin<B> {
    #[inline]
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set_state(PinState::Low)
    }

    #[inline]
    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set_state(PinState::High)
    }

    fn set_state(&mut self, state: PinState) -> Result<(), Error> {
        let value = state_to_value(state);
        if self.value != value {
            self.set_value(value)?;
        }
        Ok(())
    }
}

impl<B: PinIo> embedded_hal::digital::StatefulOutputPin for OutputPin<B> {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.value == Value::Active)
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(self.value == Value::Inactive)
    }

    fn toggle(&mut self) -> Result<(), Self::Error> {
        self.set_value(self.value.not())
    }
}

impl<B: PinIo> embedded_hal::digital::ErrorType for OutputPin<B> {
    /// Errors returned by [`OutputPin`].
    type Error = Error;
}

/// Converts a [`PinState`] to the sysfs line [`Value`].
fn state_to_value(state: PinState) -> Value {
    match state {
        PinState::High => Value::Active,
        PinState::Low => Value::Inactive,
    }
}

/// Errors returned by [`gpiosysfs_embedded_hal`](crate) types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Pins must be enabled before being wrapped.
    #[error("Pin must be enabled")]
    RequiresEnabled,

    /// InputPins must be in input mode.
    #[error("Pin must be in input mode")]
    RequiresInputMode,

    /// OutputPins must be in output mode.
    #[error("Pin must be in output mode")]
    RequiresOutputMode,

    /// An error returned from an underlying gpiosysfs call.
    #[error("gpiosysfs returned: {0}")]
    Sysfs(#[source] gpiosysfs::Error),
}

impl From<gpiosysfs::Error> for Error {
    fn from(err: gpiosysfs::Error) -> Self {
        Self::Sysfs(err)
    }
}

impl embedded_hal::digital::Error for Error {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}
