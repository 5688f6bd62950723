// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::PinIo;
use crate::line::{Channel, Number};
use crate::{Error, ResourceErrorKind, Result};
use log::{debug, trace};
use std::env;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, Write};
use std::os::unix::prelude::{AsFd, AsRawFd, BorrowedFd, RawFd};
use std::path::{Path, PathBuf};

/// The standard location of the sysfs GPIO interface.
pub const DEFAULT_BASE: &str = "/sys/class/gpio";

/// The environment variable that overrides the base directory for
/// [`SysfsBackend::from_env`].
pub const BASE_ENV: &str = "GPIOSYSFS_BASE";

/// Performs file I/O on the sysfs GPIO interface.
///
/// The base directory can be moved to drive a filesystem based test double
/// rather than the kernel.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SysfsBackend {
    base: PathBuf,
}

impl SysfsBackend {
    /// Use the standard sysfs location, `/sys/class/gpio`.
    pub fn new() -> Self {
        SysfsBackend {
            base: DEFAULT_BASE.into(),
        }
    }

    /// Use an alternate base directory.
    pub fn with_base<P: Into<PathBuf>>(base: P) -> Self {
        SysfsBackend { base: base.into() }
    }

    /// Use the base directory from the `GPIOSYSFS_BASE` environment variable,
    /// if set, else the standard location.
    pub fn from_env() -> Self {
        match env::var_os(BASE_ENV) {
            Some(base) if !base.is_empty() => Self::with_base(base),
            _ => Self::new(),
        }
    }

    /// The base directory.
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// The directory containing the attributes of an exported pin.
    pub fn pin_dir(&self, pin: Number) -> PathBuf {
        self.base.join(format!("gpio{}", pin))
    }

    /// The path to the file backing a channel.
    pub fn channel_path(&self, pin: Number, channel: Channel) -> PathBuf {
        if channel.is_pin_channel() {
            self.pin_dir(pin).join(channel.file_name())
        } else {
            self.base.join(channel.file_name())
        }
    }
}

impl Default for SysfsBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// An open sysfs channel file.
#[derive(Debug)]
pub struct SysfsHandle {
    channel: Channel,
    file: File,
}

impl SysfsHandle {
    /// The channel the file backs.
    pub fn channel(&self) -> Channel {
        self.channel
    }
}

impl AsFd for SysfsHandle {
    #[inline]
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.file.as_fd()
    }
}

impl AsRawFd for SysfsHandle {
    #[inline]
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

impl PinIo for SysfsBackend {
    type Handle = SysfsHandle;

    fn open(&mut self, pin: Number, channel: Channel) -> Result<SysfsHandle> {
        let path = self.channel_path(pin, channel);
        // export and unexport are write-only
        let file = OpenOptions::new()
            .read(channel.is_pin_channel())
            .write(true)
            .open(&path)
            .map_err(|e| {
                debug!("open {:?} failed: {}", path, e);
                Error::Resource(pin, ResourceErrorKind::OpenFailed(channel))
            })?;
        trace!("opened {:?}", path);
        Ok(SysfsHandle { channel, file })
    }

    fn close(&mut self, handle: SysfsHandle) {
        trace!("closing {}", handle.channel);
        drop(handle.file);
    }

    fn read(&mut self, handle: &mut SysfsHandle) -> Result<String> {
        let ch = handle.channel;
        // sysfs attributes do not rewind themselves
        handle.file.rewind().map_err(|e| Error::Io(ch, e))?;
        let mut data = String::new();
        handle
            .file
            .read_to_string(&mut data)
            .map_err(|e| Error::Io(ch, e))?;
        trace!("read {:?} from {}", data, ch);
        Ok(data)
    }

    fn write(&mut self, handle: &mut SysfsHandle, data: &str) -> Result<()> {
        let ch = handle.channel;
        handle.file.rewind().map_err(|e| Error::Io(ch, e))?;
        let written = handle
            .file
            .write(data.as_bytes())
            .map_err(|e| Error::Io(ch, e))?;
        trace!("wrote {:?} to {}", data, ch);
        if written != data.len() {
            return Err(Error::ShortWrite {
                channel: ch,
                expected: data.len(),
                written,
            });
        }
        Ok(())
    }

    fn flush(&mut self, handle: &mut SysfsHandle) -> Result<()> {
        let ch = handle.channel;
        handle.file.flush().map_err(|e| Error::Io(ch, e))
    }

    fn is_exported(&mut self, pin: Number) -> bool {
        // metadata is not cached, so this always reflects the current state
        self.pin_dir(pin).is_dir()
    }
}
