// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::backend::{PinIo, SysfsBackend};
use crate::line::{Channel, Direction, Edge, Number, Value};
use crate::{Error, ResourceErrorKind, Result, StateErrorKind};
use log::{debug, warn};
use std::collections::HashMap;
use std::fmt;
use std::os::unix::prelude::{AsFd, BorrowedFd};

/// A single GPIO line controlled through a [`PinIo`] backend.
///
/// The pin starts disabled.  Enabling the pin exports it, if necessary, and
/// opens its direction, edge and value channels, which are then held open
/// until the pin is disabled.
///
/// The kernel does not permit edge detection on outputs, so the edge is
/// cleared before the pin is switched to an output, and can only be set
/// while the pin is an input.
///
/// Dropping an enabled pin disables it.
pub struct Pin<B: PinIo = SysfsBackend> {
    number: Number,
    backend: B,
    /// The last known direction, None until read or set.
    direction: Option<Direction>,
    /// The open channels - only populated while enabled.
    handles: HashMap<Channel, B::Handle>,
}

impl Pin<SysfsBackend> {
    /// Create a pin on the sysfs GPIO interface.
    ///
    /// The interface is expected at `/sys/class/gpio`, unless overridden by
    /// the `GPIOSYSFS_BASE` environment variable.
    pub fn sysfs(number: Number) -> Self {
        Pin::new(number, SysfsBackend::from_env())
    }

    /// The file descriptor of the value attribute.
    ///
    /// This may be polled for priority data to detect the edges enabled by
    /// [`set_edge`].
    ///
    /// [`set_edge`]: Pin::set_edge
    pub fn value_fd(&self) -> Result<BorrowedFd<'_>> {
        self.handles
            .get(&Channel::Value)
            .map(|h| h.as_fd())
            .ok_or(Error::IllegalState(self.number, StateErrorKind::Disabled))
    }
}

impl<B: PinIo> Pin<B> {
    /// Create a disabled pin using the given backend.
    pub fn new(number: Number, backend: B) -> Self {
        Pin {
            number,
            backend,
            direction: None,
            handles: HashMap::new(),
        }
    }

    /// The number identifying the pin.
    pub fn number(&self) -> Number {
        self.number
    }

    /// The backend performing the I/O for the pin.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the backend, e.g. to drive the line of an emulated input.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Check if the pin is enabled.
    pub fn is_enabled(&self) -> bool {
        !self.handles.is_empty()
    }

    /// Export the pin and open its channels.
    ///
    /// Has no effect if the pin is already enabled.
    pub fn enable(&mut self) -> Result<()> {
        if self.is_enabled() {
            return Ok(());
        }
        if !self.backend.is_exported(self.number) {
            self.request(Channel::Export)?;
            if !self.backend.is_exported(self.number) {
                return Err(Error::Resource(
                    self.number,
                    ResourceErrorKind::ExportFailed,
                ));
            }
            debug!("gpio{} exported", self.number);
        }
        for ch in Channel::PIN {
            match self.backend.open(self.number, ch) {
                Ok(h) => {
                    self.handles.insert(ch, h);
                }
                Err(e) => {
                    self.close_handles();
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Close the pin channels and unexport the pin.
    ///
    /// The channels are closed even if the unexport fails.
    /// Has no effect if the pin is already disabled.
    pub fn disable(&mut self) -> Result<()> {
        if !self.is_enabled() {
            return Ok(());
        }
        self.close_handles();
        if self.backend.is_exported(self.number) {
            self.request(Channel::Unexport)?;
            if self.backend.is_exported(self.number) {
                return Err(Error::Resource(
                    self.number,
                    ResourceErrorKind::UnexportFailed,
                ));
            }
            debug!("gpio{} unexported", self.number);
        }
        Ok(())
    }

    /// The direction of the pin.
    ///
    /// The direction is cached, so this only reads the direction from the
    /// backend if it is not yet known.
    pub fn direction(&mut self) -> Result<Direction> {
        match self.direction {
            Some(d) => Ok(d),
            None => self.read_direction(),
        }
    }

    /// The cached direction of the pin, if known.
    pub fn cached_direction(&self) -> Option<Direction> {
        self.direction
    }

    /// Read the direction of the pin from the backend, bypassing the cache.
    ///
    /// The cache is refreshed with the direction read.
    pub fn read_direction(&mut self) -> Result<Direction> {
        let d = self.read_channel(Channel::Direction)?;
        let d = d
            .parse::<Direction>()
            .map_err(|_| Error::UnexpectedValue(Channel::Direction, d))?;
        self.direction = Some(d);
        Ok(d)
    }

    /// Change the direction of the pin.
    ///
    /// Has no effect if the pin already has that direction.
    /// Any edge detection is disabled before the pin becomes an output.
    pub fn set_direction(&mut self, direction: Direction) -> Result<()> {
        self.require_enabled()?;
        if self.direction == Some(direction) {
            return Ok(());
        }
        if direction == Direction::Output && self.edge()? != Edge::None {
            self.write_channel(Channel::Edge, Edge::None.as_str())?;
            debug!("gpio{} edge cleared", self.number);
        }
        self.write_channel(Channel::Direction, direction.as_str())?;
        self.direction = Some(direction);
        debug!("gpio{} direction set to {}", self.number, direction);
        Ok(())
    }

    /// The edge detection of the pin.
    pub fn edge(&mut self) -> Result<Edge> {
        let e = self.read_channel(Channel::Edge)?;
        e.parse::<Edge>()
            .map_err(|_| Error::UnexpectedValue(Channel::Edge, e))
    }

    /// Change the edge detection of the pin.
    ///
    /// The pin must be an input.
    pub fn set_edge(&mut self, edge: Edge) -> Result<()> {
        self.require_enabled()?;
        if self.direction()? != Direction::Input {
            return Err(Error::IllegalState(self.number, StateErrorKind::NotInput));
        }
        self.write_channel(Channel::Edge, edge.as_str())?;
        debug!("gpio{} edge set to {}", self.number, edge);
        Ok(())
    }

    /// The value of the pin.
    ///
    /// For inputs this is the level of the line, for outputs the value set.
    pub fn value(&mut self) -> Result<Value> {
        Ok(Value::from_attr(&self.read_channel(Channel::Value)?))
    }

    /// Set the value of the pin.
    ///
    /// The pin must be an output.
    pub fn set_value<V: Into<Value>>(&mut self, value: V) -> Result<()> {
        let value = value.into();
        self.require_enabled()?;
        if self.direction()? != Direction::Output {
            return Err(Error::IllegalState(self.number, StateErrorKind::NotOutput));
        }
        self.write_channel(Channel::Value, value.as_str())?;
        let h = self
            .handles
            .get_mut(&Channel::Value)
            .ok_or(Error::IllegalState(self.number, StateErrorKind::Disabled))?;
        self.backend.flush(h)
    }

    fn require_enabled(&self) -> Result<()> {
        if !self.is_enabled() {
            return Err(Error::IllegalState(self.number, StateErrorKind::Disabled));
        }
        Ok(())
    }

    fn read_channel(&mut self, ch: Channel) -> Result<String> {
        let h = self
            .handles
            .get_mut(&ch)
            .ok_or(Error::IllegalState(self.number, StateErrorKind::Disabled))?;
        // attributes hold a single line, anything after it is stale
        let data = self.backend.read(h)?;
        Ok(data.lines().next().unwrap_or("").trim().to_string())
    }

    fn write_channel(&mut self, ch: Channel, data: &str) -> Result<()> {
        let h = self
            .handles
            .get_mut(&ch)
            .ok_or(Error::IllegalState(self.number, StateErrorKind::Disabled))?;
        self.backend.write(h, &format!("{}\n", data))
    }

    // Write the pin number to one of the shared export channels.
    fn request(&mut self, ch: Channel) -> Result<()> {
        let mut h = self.backend.open(self.number, ch)?;
        let res = self
            .backend
            .write(&mut h, &format!("{}\n", self.number))
            .and_then(|_| self.backend.flush(&mut h));
        self.backend.close(h);
        res
    }

    fn close_handles(&mut self) {
        for ch in Channel::PIN {
            if let Some(h) = self.handles.remove(&ch) {
                self.backend.close(h);
            }
        }
        self.direction = None;
    }
}

impl<B: PinIo> Drop for Pin<B> {
    fn drop(&mut self) {
        if let Err(e) = self.disable() {
            warn!("gpio{} not cleanly disabled: {}", self.number, e);
        }
    }
}

impl<B: PinIo> fmt::Debug for Pin<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pin")
            .field("number", &self.number)
            .field("enabled", &self.is_enabled())
            .field("direction", &self.direction)
            .finish()
    }
}
