// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::line::{Channel, Number};
use crate::Result;

mod memory;
mod sysfs;

pub use memory::{MemoryBackend, Observer};
pub use sysfs::{SysfsBackend, SysfsHandle, BASE_ENV, DEFAULT_BASE};

/// The I/O operations a [`Pin`] performs on its channels.
///
/// Each channel is opened once, producing a handle that is held until it is
/// closed.  Reads return the full content of the channel, while writes must
/// be accepted in full or the write fails.
///
/// [`Pin`]: crate::Pin
pub trait PinIo {
    /// An open channel.
    type Handle;

    /// Open the channel for the pin.
    fn open(&mut self, pin: Number, channel: Channel) -> Result<Self::Handle>;

    /// Close a channel.
    ///
    /// Closing cannot fail, as there is nothing useful a caller could do about it.
    fn close(&mut self, handle: Self::Handle);

    /// Read the content of the channel from the start.
    fn read(&mut self, handle: &mut Self::Handle) -> Result<String>;

    /// Write the data to the channel.
    ///
    /// The data must be written in full.
    fn write(&mut self, handle: &mut Self::Handle, data: &str) -> Result<()>;

    /// Ensure any data written to the channel has been passed to the kernel.
    fn flush(&mut self, handle: &mut Self::Handle) -> Result<()>;

    /// Check if the pin is currently exported.
    fn is_exported(&mut self, pin: Number) -> bool;
}
