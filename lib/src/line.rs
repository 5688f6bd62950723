// SPDX-FileCopyrightText: 2021 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::{Error, Result};
#[cfg(feature = "serde")]
use serde_derive::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The number identifying a line in the sysfs GPIO namespace.
///
/// On a Raspberry Pi this is the BCM number.
pub type Number = u32;

/// The direction of a line.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum Direction {
    /// The line is an input.
    #[default]
    Input,

    /// The line is an output.
    Output,
}

impl Direction {
    /// The form of the direction used in the sysfs direction attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Input => "in",
            Direction::Output => "out",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "in" => Ok(Direction::Input),
            "out" => Ok(Direction::Output),
            _ => Err(Error::InvalidArgument(format!(
                "direction can only be \"in\" or \"out\", not {:?}",
                s
            ))),
        }
    }
}

/// The edge detection options for an input line.
///
/// Only the configuration of edge detection is provided.
/// The events themselves are delivered as priority data on the value
/// attribute, which callers may poll for themselves.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum Edge {
    /// Edge detection is disabled.
    #[default]
    None,

    /// Edge detection is only enabled on rising edges.
    ///
    /// A rising edge means a transition from an inactive state to an active state.
    Rising,

    /// Edge detection is only enabled on falling edges.
    ///
    /// A falling edge means a transition from an active state to an inactive state.
    Falling,

    /// Edge detection is enabled on both rising and falling edges.
    Both,
}

impl Edge {
    /// The form of the edge used in the sysfs edge attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            Edge::None => "none",
            Edge::Rising => "rising",
            Edge::Falling => "falling",
            Edge::Both => "both",
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Edge {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Edge::None),
            "rising" => Ok(Edge::Rising),
            "falling" => Ok(Edge::Falling),
            "both" => Ok(Edge::Both),
            _ => Err(Error::InvalidArgument(format!(
                "edge must be one of \"none\", \"rising\", \"falling\" or \"both\", not {:?}",
                s
            ))),
        }
    }
}

/// The logical value of a line.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum Value {
    /// The line is inactive.
    #[default]
    Inactive,

    /// The line is active.
    Active,
}

impl Value {
    /// The value opposite the current value.
    pub fn not(&self) -> Value {
        match self {
            Value::Active => Value::Inactive,
            Value::Inactive => Value::Active,
        }
    }

    /// The form of the value written to the sysfs value attribute.
    pub fn as_str(&self) -> &'static str {
        match self {
            Value::Active => "1",
            Value::Inactive => "0",
        }
    }

    /// Interpret the content of a sysfs value attribute.
    ///
    /// Anything other than "0" is active.
    pub fn from_attr(s: &str) -> Value {
        match s.trim() {
            "0" => Value::Inactive,
            _ => Value::Active,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Value::Active => "active",
            Value::Inactive => "inactive",
        };
        write!(f, "{}", s)
    }
}

impl From<Value> for bool {
    fn from(l: Value) -> bool {
        match l {
            Value::Inactive => false,
            Value::Active => true,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        match b {
            false => Value::Inactive,
            true => Value::Active,
        }
    }
}

impl FromStr for Value {
    type Err = Error;

    /// Strict parsing, for values supplied by users rather than read
    /// from the value attribute.
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "0" | "false" => Ok(Value::Inactive),
            "1" | "true" => Ok(Value::Active),
            _ => Err(Error::InvalidArgument(format!(
                "value can only be 1 or 0, not {:?}",
                s
            ))),
        }
    }
}

/// The named sub-resources of the sysfs GPIO interface.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum Channel {
    /// Shared by all pins, requests a pin be exported.
    Export,

    /// Shared by all pins, requests a pin be unexported.
    Unexport,

    /// The direction attribute of an exported pin.
    Direction,

    /// The edge attribute of an exported pin.
    Edge,

    /// The value attribute of an exported pin.
    Value,
}

impl Channel {
    /// The channels held open by an enabled pin.
    pub const PIN: [Channel; 3] = [Channel::Direction, Channel::Edge, Channel::Value];

    /// The name of the file backing the channel.
    pub fn file_name(&self) -> &'static str {
        match self {
            Channel::Export => "export",
            Channel::Unexport => "unexport",
            Channel::Direction => "direction",
            Channel::Edge => "edge",
            Channel::Value => "value",
        }
    }

    /// Is the channel specific to a pin, rather than shared by all pins.
    pub fn is_pin_channel(&self) -> bool {
        !matches!(self, Channel::Export | Channel::Unexport)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_name())
    }
}
