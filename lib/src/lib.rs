// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A library for controlling GPIO lines on Linux platforms
//! using the sysfs GPIO interface.
//!
//! Lines are controlled using a [`Pin`], which exports the line, holds the
//! line's attribute files open while it is enabled, and enforces the
//! ordering the kernel requires between direction, edge and value changes.
//!
//! The I/O performed by a [`Pin`] is delegated to a [`PinIo`] backend:
//!  - [`SysfsBackend`] performs file I/O on `/sys/class/gpio`, or any other
//!    base directory.
//!  - [`MemoryBackend`] keeps the attributes in memory, and reports every
//!    operation to an [`Observer`].
//!
//! The [`Emulator`] is an [`Observer`] that logs the actions performed on
//! emulated pins and can assert them against an expected sequence, so that
//! drivers built on [`Pin`] can be tested without hardware.
//!
//! Driving an output line:
//! ```no_run
//! # use gpiosysfs::Result;
//! use gpiosysfs::{line::Direction, Pin};
//!
//! # fn main() -> Result<()> {
//! let mut led = Pin::sysfs(17);
//! led.enable()?;
//! led.set_direction(Direction::Output)?;
//! led.set_value(true)?;
//! # Ok(())
//! # }
//! ```
//!
//! Checking the same sequence against the emulator:
//! ```
//! # use gpiosysfs::Result;
//! use gpiosysfs::emulator::{Actions, Emulator, LogEntry};
//! use gpiosysfs::line::Direction;
//!
//! # fn main() -> Result<()> {
//! let emu = Emulator::new();
//! emu.set_assert_mask(Actions::CHANGE_VALUE);
//! emu.assert([LogEntry::value(17, true)]);
//!
//! let mut led = emu.pin(17);
//! led.enable()?;
//! led.set_direction(Direction::Output)?;
//! led.set_value(true)?;
//! emu.finish()?;
//! # Ok(())
//! # }
//! ```
//!
//! [`Emulator`]: emulator::Emulator
//! [`MemoryBackend`]: backend::MemoryBackend
//! [`Observer`]: backend::Observer
//! [`PinIo`]: backend::PinIo
//! [`SysfsBackend`]: backend::SysfsBackend

use std::fmt;

/// The I/O backends available to a [`Pin`].
pub mod backend;

/// Logging and verification of the actions performed on emulated pins.
pub mod emulator;

/// Types specific to lines.
pub mod line;

mod pin;

pub use emulator::AssertionError;
pub use pin::Pin;

use line::{Channel, Number};

/// Errors returned by [`gpiosysfs`] functions.
///
/// [`gpiosysfs`]: crate
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An error returned when there is a problem with an argument.
    #[error("{0}")]
    InvalidArgument(String),

    /// The operation is not permitted in the current state of the pin.
    #[error("GPIO {0} {1}.")]
    IllegalState(Number, StateErrorKind),

    /// An OS level resource for the pin could not be acquired or released.
    #[error("GPIO {0} {1}.")]
    Resource(Number, ResourceErrorKind),

    /// A write to a channel was only partially completed.
    #[error("could not write {expected} bytes to {channel}, only {written} written")]
    ShortWrite {
        /// The channel being written.
        channel: Channel,
        /// The number of bytes that should have been written.
        expected: usize,
        /// The number of bytes actually written.
        written: usize,
    },

    /// A channel contained content that could not be interpreted.
    #[error("unexpected {0} content {1:?}")]
    UnexpectedValue(Channel, String),

    /// An error returned from an underlying read, write or flush.
    #[error("{0} I/O failed: {1}")]
    Io(Channel, #[source] std::io::Error),

    /// An observed action did not match the expected sequence.
    #[error(transparent)]
    Assertion(#[from] AssertionError),
}

/// The reasons an operation is not permitted in the current pin state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StateErrorKind {
    /// The pin must be enabled first.
    Disabled,

    /// The operation requires the pin to be an output.
    NotOutput,

    /// The operation requires the pin to be an input.
    NotInput,
}

impl fmt::Display for StateErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateErrorKind::Disabled => write!(f, "is not enabled"),
            StateErrorKind::NotOutput => write!(f, "is not an output"),
            StateErrorKind::NotInput => write!(f, "is not an input"),
        }
    }
}

/// The OS level resources that can fail to be acquired or released.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResourceErrorKind {
    /// Writing to the export channel did not create the pin.
    ExportFailed,

    /// Writing to the unexport channel did not remove the pin.
    UnexportFailed,

    /// The channel could not be opened.
    OpenFailed(Channel),
}

impl fmt::Display for ResourceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceErrorKind::ExportFailed => write!(f, "failed to export"),
            ResourceErrorKind::UnexportFailed => write!(f, "failed to unexport"),
            ResourceErrorKind::OpenFailed(ch) => write!(f, "could not open {}", ch),
        }
    }
}

/// The result for [`gpiosysfs`] functions.
///
/// [`gpiosysfs`]: crate
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            Error::IllegalState(4, StateErrorKind::NotOutput).to_string(),
            "GPIO 4 is not an output."
        );
        assert_eq!(
            Error::Resource(12, ResourceErrorKind::ExportFailed).to_string(),
            "GPIO 12 failed to export."
        );
        assert_eq!(
            Error::Resource(12, ResourceErrorKind::OpenFailed(Channel::Edge)).to_string(),
            "GPIO 12 could not open edge."
        );
        assert_eq!(
            Error::ShortWrite {
                channel: Channel::Value,
                expected: 2,
                written: 1
            }
            .to_string(),
            "could not write 2 bytes to value, only 1 written"
        );
    }
}
