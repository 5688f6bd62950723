// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::PinIo;
use crate::line::{Channel, Direction, Edge, Number, Value};
use crate::{Error, ResourceErrorKind, Result};
use log::trace;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::rc::Rc;

/// Receives the operations performed on a [`MemoryBackend`].
///
/// Only writes may fail, which fails the write itself.
pub trait Observer {
    /// A channel was opened.
    fn opened(&self, _pin: Number, _channel: Channel) {}

    /// A channel was closed.
    fn closed(&self, _pin: Number, _channel: Channel) {}

    /// Data was read from a channel.
    fn read(&self, _pin: Number, _channel: Channel, _data: &str) {}

    /// Data was written to a channel.
    fn written(&self, pin: Number, channel: Channel, data: &str) -> Result<()>;
}

/// A handle to a channel of a [`MemoryBackend`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MemoryHandle {
    pin: Number,
    channel: Channel,
}

/// Emulates the sysfs GPIO interface in memory.
///
/// Exporting a pin creates its attributes with the values the kernel
/// provides for a freshly exported pin, i.e. an input with edge detection
/// disabled and a value of 0.  Unexporting the pin discards them.
///
/// The backend applies the same restrictions as the kernel, so edge
/// detection cannot be enabled on outputs, and inputs cannot be set.
#[derive(Default)]
pub struct MemoryBackend {
    pins: HashMap<Number, HashMap<Channel, String>>,
    observer: Option<Rc<dyn Observer>>,
}

impl MemoryBackend {
    /// Create a backend with no pins exported, and no observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend that reports all operations to the observer.
    pub fn with_observer(observer: Rc<dyn Observer>) -> Self {
        MemoryBackend {
            pins: HashMap::new(),
            observer: Some(observer),
        }
    }

    /// The current content of an attribute of an exported pin.
    pub fn attr(&self, pin: Number, channel: Channel) -> Option<&str> {
        self.pins
            .get(&pin)
            .and_then(|attrs| attrs.get(&channel))
            .map(String::as_str)
    }

    /// Simulate the line being externally driven to the given value.
    ///
    /// Has no effect on pins that are not exported.
    pub fn drive(&mut self, pin: Number, value: Value) {
        if let Some(attrs) = self.pins.get_mut(&pin) {
            attrs.insert(Channel::Value, format!("{}\n", value.as_str()));
        }
    }

    fn export(&mut self, pin: Number) {
        self.pins.entry(pin).or_insert_with(|| {
            HashMap::from([
                (Channel::Direction, format!("{}\n", Direction::Input)),
                (Channel::Edge, format!("{}\n", Edge::None)),
                (Channel::Value, format!("{}\n", Value::Inactive.as_str())),
            ])
        });
    }

    fn unexport(&mut self, pin: Number) {
        self.pins.remove(&pin);
    }

    // Apply the kernel's restrictions to a write, without changing any state.
    fn check(&self, handle: &MemoryHandle, data: &str) -> Result<()> {
        let ch = handle.channel;
        match ch {
            Channel::Export | Channel::Unexport => {
                let pin = parse_request(ch, data)?;
                if ch == Channel::Unexport && !self.pins.contains_key(&pin) {
                    return Err(Error::Io(ch, io::ErrorKind::InvalidInput.into()));
                }
            }
            _ => {
                let attrs = self
                    .pins
                    .get(&handle.pin)
                    .ok_or_else(|| Error::Io(ch, io::ErrorKind::NotFound.into()))?;
                let is_output = attrs
                    .get(&Channel::Direction)
                    .is_some_and(|d| d.trim() == Direction::Output.as_str());
                let rejected = match ch {
                    Channel::Edge => is_output && data.trim() != Edge::None.as_str(),
                    Channel::Value => !is_output,
                    _ => false,
                };
                if rejected {
                    return Err(Error::Io(ch, io::ErrorKind::InvalidInput.into()));
                }
            }
        }
        Ok(())
    }

    // Commit a write that has passed check.
    fn store(&mut self, handle: &MemoryHandle, data: &str) -> Result<()> {
        let ch = handle.channel;
        match ch {
            Channel::Export => self.export(parse_request(ch, data)?),
            Channel::Unexport => self.unexport(parse_request(ch, data)?),
            _ => {
                if let Some(attrs) = self.pins.get_mut(&handle.pin) {
                    attrs.insert(ch, data.to_string());
                }
            }
        }
        Ok(())
    }
}

fn parse_request(ch: Channel, data: &str) -> Result<Number> {
    data.trim()
        .parse::<Number>()
        .map_err(|_| Error::Io(ch, io::ErrorKind::InvalidInput.into()))
}

impl fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("pins", &self.pins)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

impl PinIo for MemoryBackend {
    type Handle = MemoryHandle;

    fn open(&mut self, pin: Number, channel: Channel) -> Result<MemoryHandle> {
        if channel.is_pin_channel() && !self.pins.contains_key(&pin) {
            return Err(Error::Resource(pin, ResourceErrorKind::OpenFailed(channel)));
        }
        if let Some(o) = &self.observer {
            o.opened(pin, channel);
        }
        Ok(MemoryHandle { pin, channel })
    }

    fn close(&mut self, handle: MemoryHandle) {
        if let Some(o) = &self.observer {
            o.closed(handle.pin, handle.channel);
        }
    }

    fn read(&mut self, handle: &mut MemoryHandle) -> Result<String> {
        let ch = handle.channel;
        if !ch.is_pin_channel() {
            return Err(Error::Io(ch, io::ErrorKind::PermissionDenied.into()));
        }
        let data = self
            .attr(handle.pin, ch)
            .map(str::to_string)
            .ok_or_else(|| Error::Io(ch, io::ErrorKind::NotFound.into()))?;
        trace!("gpio{} read {:?} from {}", handle.pin, data, ch);
        if let Some(o) = &self.observer {
            o.read(handle.pin, ch, &data);
        }
        Ok(data)
    }

    fn write(&mut self, handle: &mut MemoryHandle, data: &str) -> Result<()> {
        self.check(handle, data)?;
        trace!("gpio{} wrote {:?} to {}", handle.pin, data, handle.channel);
        // a write rejected by the observer leaves the pin unchanged
        if let Some(o) = &self.observer {
            o.written(handle.pin, handle.channel, data)?;
        }
        self.store(handle, data)
    }

    fn flush(&mut self, _handle: &mut MemoryHandle) -> Result<()> {
        Ok(())
    }

    fn is_exported(&mut self, pin: Number) -> bool {
        self.pins.contains_key(&pin)
    }
}
