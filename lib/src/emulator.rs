// SPDX-FileCopyrightText: 2022 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The [`Emulator`] observes the writes performed on pins backed by a
//! [`MemoryBackend`], converts them into [`LogEntry`]s, and
//!  - logs them, for inspection after the fact,
//!  - asserts them against a queue of expected entries, failing the write
//!    that does not match.
//!
//! Which [`Action`]s are logged, and which are asserted, are independently
//! configurable, as is how strictly the expected queue is enforced.
//!
//! ```
//! # fn main() -> gpiosysfs::Result<()> {
//! use gpiosysfs::emulator::{Actions, Emulator, LogEntry};
//! use gpiosysfs::line::Direction;
//!
//! let emu = Emulator::new();
//! emu.set_assert_mask(Actions::CHANGE_VALUE);
//! emu.assert([LogEntry::value(1, true), LogEntry::value(1, false)]);
//!
//! let mut pin = emu.pin(1);
//! pin.enable()?;
//! pin.set_direction(Direction::Output)?;
//! pin.set_value(true)?;
//! pin.set_value(false)?;
//! assert_eq!(emu.pending(), 0);
//! emu.finish()?;
//! # Ok(())
//! # }
//! ```
//!
//! [`MemoryBackend`]: crate::backend::MemoryBackend

use crate::backend::{MemoryBackend, Observer};
use crate::line::{Channel, Direction, Edge, Number};
use crate::{Pin, Result};
use bitflags::bitflags;
use log::{debug, trace};
#[cfg(feature = "serde")]
use serde_derive::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::thread;

/// The kinds of action performed on a pin.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum Action {
    /// The pin was exported.
    Enable,

    /// The pin was unexported.
    Disable,

    /// The direction of the pin was written.
    ChangeDirection,

    /// The edge detection of the pin was written.
    ChangeEdge,

    /// The value of the pin was written.
    ChangeValue,
}

impl Action {
    /// All the actions.
    pub const ALL: [Action; 5] = [
        Action::Enable,
        Action::Disable,
        Action::ChangeDirection,
        Action::ChangeEdge,
        Action::ChangeValue,
    ];

    /// The human readable name of the action.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Enable => "Enable",
            Action::Disable => "Disable",
            Action::ChangeDirection => "ChangeDirection",
            Action::ChangeEdge => "ChangeEdge",
            Action::ChangeValue => "ChangeValue",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

bitflags! {
    /// A set of [`Action`]s.
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
    pub struct Actions: u8 {
        /// Pins being exported.
        const ENABLE = 1;

        /// Pins being unexported.
        const DISABLE = 2;

        /// Direction changes.
        const CHANGE_DIRECTION = 4;

        /// Edge detection changes.
        const CHANGE_EDGE = 8;

        /// Value changes.
        const CHANGE_VALUE = 16;
    }
}

impl Actions {
    /// Every action.
    pub const ALL: Actions = Actions::all();

    /// Check if the set contains the action.
    pub fn contains_action(&self, action: Action) -> bool {
        self.contains(action.into())
    }
}

impl From<Action> for Actions {
    fn from(action: Action) -> Self {
        match action {
            Action::Enable => Actions::ENABLE,
            Action::Disable => Actions::DISABLE,
            Action::ChangeDirection => Actions::CHANGE_DIRECTION,
            Action::ChangeEdge => Actions::CHANGE_EDGE,
            Action::ChangeValue => Actions::CHANGE_VALUE,
        }
    }
}

impl FromIterator<Action> for Actions {
    fn from_iter<I: IntoIterator<Item = Action>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Actions::empty(), |acc, a| acc | Actions::from(a))
    }
}

/// How to treat an action that is asserted when no more actions are expected.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OnMissing {
    /// Fail the action with an [`AssertionError::Missing`].
    #[default]
    Fail,

    /// Accept the action.
    Ignore,
}

/// How to treat expected actions that were never performed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum OnExcess {
    /// Fail the [`Emulator`] teardown with an [`AssertionError::Excess`].
    #[default]
    Fail,

    /// Discard the remaining expected actions.
    Ignore,
}

/// The strictness with which the expected actions are enforced.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct AssertMode {
    /// How to treat actions performed beyond the end of the expected actions.
    pub missing: OnMissing,

    /// How to treat expected actions that were never performed.
    pub excess: OnExcess,
}

impl AssertMode {
    /// Fail on both missing and excess expected actions.
    pub const STRICT: AssertMode = AssertMode {
        missing: OnMissing::Fail,
        excess: OnExcess::Fail,
    };

    /// Ignore both missing and excess expected actions, so only mismatches fail.
    pub const LENIENT: AssertMode = AssertMode {
        missing: OnMissing::Ignore,
        excess: OnExcess::Ignore,
    };

    /// Set how actions beyond the end of the expected actions are treated.
    pub fn with_missing(mut self, missing: OnMissing) -> Self {
        self.missing = missing;
        self
    }

    /// Set how expected actions that were never performed are treated.
    pub fn with_excess(mut self, excess: OnExcess) -> Self {
        self.excess = excess;
        self
    }
}

/// The detail of an action, normalized from the data written.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum Payload {
    /// Enable and Disable carry no detail.
    None,

    /// The trimmed direction or edge written.
    Text(String),

    /// The value written.
    Value(bool),
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::None => Ok(()),
            Payload::Text(s) => write!(f, "{}", s),
            Payload::Value(v) => write!(f, "{}", v),
        }
    }
}

/// An action performed on a pin.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct LogEntry {
    /// The pin the action was performed on.
    pub pin: Number,

    /// The kind of action.
    pub action: Action,

    /// The detail of the action.
    pub payload: Payload,
}

impl LogEntry {
    /// Construct an entry.
    pub fn new(pin: Number, action: Action, payload: Payload) -> Self {
        LogEntry {
            pin,
            action,
            payload,
        }
    }

    /// The entry for the pin being exported.
    pub fn enable(pin: Number) -> Self {
        Self::new(pin, Action::Enable, Payload::None)
    }

    /// The entry for the pin being unexported.
    pub fn disable(pin: Number) -> Self {
        Self::new(pin, Action::Disable, Payload::None)
    }

    /// The entry for the direction of the pin being written.
    pub fn direction(pin: Number, direction: Direction) -> Self {
        Self::new(
            pin,
            Action::ChangeDirection,
            Payload::Text(direction.as_str().into()),
        )
    }

    /// The entry for the edge detection of the pin being written.
    pub fn edge(pin: Number, edge: Edge) -> Self {
        Self::new(pin, Action::ChangeEdge, Payload::Text(edge.as_str().into()))
    }

    /// The entry for the value of the pin being written.
    pub fn value(pin: Number, value: bool) -> Self {
        Self::new(pin, Action::ChangeValue, Payload::Value(value))
    }

    /// Convert a write to a channel into the corresponding entry.
    ///
    /// Writes to the export channels that do not name the pin are not
    /// actions on the pin, and return None.
    pub fn from_write(pin: Number, channel: Channel, data: &str) -> Option<Self> {
        let entry = match channel {
            Channel::Export | Channel::Unexport => {
                if data != format!("{}\n", pin) {
                    return None;
                }
                if channel == Channel::Export {
                    LogEntry::enable(pin)
                } else {
                    LogEntry::disable(pin)
                }
            }
            Channel::Direction => Self::new(
                pin,
                Action::ChangeDirection,
                Payload::Text(data.trim().into()),
            ),
            Channel::Edge => Self::new(pin, Action::ChangeEdge, Payload::Text(data.trim().into())),
            Channel::Value => LogEntry::value(pin, data.trim() != "0"),
        };
        Some(entry)
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.payload {
            Payload::None => write!(f, "({}, {})", self.pin, self.action),
            _ => write!(f, "({}, {}, {})", self.pin, self.action, self.payload),
        }
    }
}

/// Failures detected by the [`Emulator`] when asserting actions.
#[derive(Clone, Debug, thiserror::Error, Eq, PartialEq)]
pub enum AssertionError {
    /// An asserted action was performed when no more actions were expected.
    #[error("unexpected action {0}, no more actions were expected")]
    Missing(LogEntry),

    /// An asserted action did not match the next expected action.
    #[error("expected {expected} but got {actual}")]
    Mismatch {
        /// The next expected action.
        expected: LogEntry,

        /// The action actually performed.
        actual: LogEntry,
    },

    /// Expected actions remained at teardown.
    #[error("{0} expected actions were not performed")]
    Excess(usize),
}

#[derive(Debug)]
struct State {
    log: Vec<LogEntry>,
    expected: VecDeque<LogEntry>,
    log_mask: Actions,
    assert_mask: Actions,
    assert_mode: AssertMode,
}

impl State {
    fn record(&mut self, entry: LogEntry) -> std::result::Result<(), AssertionError> {
        if self.log_mask.contains_action(entry.action) && self.log.last() != Some(&entry) {
            self.log.push(entry.clone());
        }
        if !self.assert_mask.contains_action(entry.action) {
            return Ok(());
        }
        match self.expected.pop_front() {
            None => match self.assert_mode.missing {
                OnMissing::Fail => Err(AssertionError::Missing(entry)),
                OnMissing::Ignore => Ok(()),
            },
            Some(expected) if expected != entry => Err(AssertionError::Mismatch {
                expected,
                actual: entry,
            }),
            Some(_) => Ok(()),
        }
    }

    fn check_excess(&self) -> std::result::Result<(), AssertionError> {
        if self.assert_mode.excess == OnExcess::Fail && !self.expected.is_empty() {
            return Err(AssertionError::Excess(self.expected.len()));
        }
        Ok(())
    }
}

// The Observer shared with the backends created by an Emulator.
#[derive(Debug)]
struct Recorder(RefCell<State>);

impl Observer for Recorder {
    fn opened(&self, pin: Number, channel: Channel) {
        trace!("gpio{} {} opened", pin, channel);
    }

    fn closed(&self, pin: Number, channel: Channel) {
        trace!("gpio{} {} closed", pin, channel);
    }

    fn read(&self, pin: Number, channel: Channel, data: &str) {
        trace!("gpio{} {} read {:?}", pin, channel, data);
    }

    fn written(&self, pin: Number, channel: Channel, data: &str) -> Result<()> {
        let entry = match LogEntry::from_write(pin, channel, data) {
            Some(entry) => entry,
            None => return Ok(()),
        };
        trace!("observed {}", entry);
        Ok(self.0.borrow_mut().record(entry)?)
    }
}

/// Logs, and optionally asserts, the actions performed on emulated pins.
///
/// By default all actions are logged, none are asserted, and assertion is
/// strict - both unexpected actions and unperformed expected actions fail.
///
/// Unperformed expected actions are checked when the emulator is torn down,
/// either explicitly via [`finish`], or implicitly when the emulator is
/// dropped, in which case a failure panics.
///
/// [`finish`]: Emulator::finish
#[derive(Debug)]
pub struct Emulator {
    recorder: Rc<Recorder>,
    finished: bool,
}

impl Emulator {
    /// Create an emulator with the default configuration.
    pub fn new() -> Self {
        Emulator {
            recorder: Rc::new(Recorder(RefCell::new(State {
                log: Vec::new(),
                expected: VecDeque::new(),
                log_mask: Actions::ALL,
                assert_mask: Actions::empty(),
                assert_mode: AssertMode::STRICT,
            }))),
            finished: false,
        }
    }

    /// Create a backend observed by this emulator.
    pub fn backend(&self) -> MemoryBackend {
        MemoryBackend::with_observer(self.recorder.clone())
    }

    /// Create a disabled pin observed by this emulator.
    pub fn pin(&self, number: Number) -> Pin<MemoryBackend> {
        Pin::new(number, self.backend())
    }

    /// Record a write to a channel, as if performed by an emulated pin.
    pub fn record_write(&self, pin: Number, channel: Channel, data: &str) -> Result<()> {
        self.recorder.written(pin, channel, data)
    }

    /// Replace the expected actions.
    ///
    /// Subsequent asserted actions are matched from the start of the new list.
    pub fn assert<I: IntoIterator<Item = LogEntry>>(&self, expected: I) {
        let mut state = self.state_mut();
        state.expected = expected.into_iter().collect();
        debug!("expecting {} actions", state.expected.len());
    }

    /// The number of expected actions not yet performed.
    pub fn pending(&self) -> usize {
        self.recorder.0.borrow().expected.len()
    }

    /// The expected actions not yet performed.
    pub fn expected(&self) -> Vec<LogEntry> {
        self.recorder.0.borrow().expected.iter().cloned().collect()
    }

    /// The logged actions.
    pub fn log(&self) -> Vec<LogEntry> {
        self.recorder.0.borrow().log.clone()
    }

    /// Discard the logged actions.
    pub fn clear_log(&self) {
        self.state_mut().log.clear();
    }

    /// The actions being logged.
    pub fn log_mask(&self) -> Actions {
        self.recorder.0.borrow().log_mask
    }

    /// Set the actions to log.
    pub fn set_log_mask<A: Into<Actions>>(&self, mask: A) -> &Self {
        self.state_mut().log_mask = mask.into();
        self
    }

    /// The actions being asserted.
    pub fn assert_mask(&self) -> Actions {
        self.recorder.0.borrow().assert_mask
    }

    /// Set the actions to assert.
    pub fn set_assert_mask<A: Into<Actions>>(&self, mask: A) -> &Self {
        self.state_mut().assert_mask = mask.into();
        self
    }

    /// The strictness of assertions.
    pub fn assert_mode(&self) -> AssertMode {
        self.recorder.0.borrow().assert_mode
    }

    /// Set the strictness of assertions.
    pub fn set_assert_mode(&self, mode: AssertMode) -> &Self {
        self.state_mut().assert_mode = mode;
        self
    }

    /// Set how actions beyond the end of the expected actions are treated,
    /// leaving the treatment of excess expected actions unchanged.
    pub fn set_on_missing(&self, missing: OnMissing) -> &Self {
        self.state_mut().assert_mode.missing = missing;
        self
    }

    /// Set how expected actions that were never performed are treated,
    /// leaving the treatment of missing expected actions unchanged.
    pub fn set_on_excess(&self, excess: OnExcess) -> &Self {
        self.state_mut().assert_mode.excess = excess;
        self
    }

    /// Tear down the emulator, checking that all expected actions were performed.
    pub fn finish(mut self) -> Result<()> {
        self.finished = true;
        let res = self.recorder.0.borrow().check_excess();
        Ok(res?)
    }

    fn state_mut(&self) -> std::cell::RefMut<'_, State> {
        self.recorder.0.borrow_mut()
    }
}

impl Default for Emulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Emulator {
    fn drop(&mut self) {
        if self.finished || thread::panicking() {
            return;
        }
        let res = self.recorder.0.borrow().check_excess();
        if let Err(e) = res {
            panic!("{}", e);
        }
    }
}
