// SPDX-FileCopyrightText: 2024 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use embedded_hal::digital::{InputPin as _, PinState, StatefulOutputPin};
use gpiosysfs::emulator::{Emulator, LogEntry};
use gpiosysfs::line::{Direction, Edge, Value};
use gpiosysfs::Pin;
use gpiosysfs_embedded_hal::{Error, InputPin};

#[test]
fn from_pin() {
    let emu = Emulator::new();
    let pin = InputPin::from_pin(emu.pin(4)).unwrap();

    assert_eq!(pin.number(), 4);
    assert_eq!(
        emu.log(),
        vec![LogEntry::enable(4), LogEntry::direction(4, Direction::Input)]
    );
}

#[test]
fn is_high() {
    let emu = Emulator::new();
    let mut pin = emu.pin(4);
    pin.enable().unwrap();
    pin.backend_mut().drive(4, Value::Active);
    let mut pin = InputPin::from_pin(pin).unwrap();

    assert!(pin.is_high().unwrap());
    assert!(!pin.is_low().unwrap());
}

#[test]
fn is_low() {
    let emu = Emulator::new();
    let mut pin = InputPin::from_pin(emu.pin(4)).unwrap();

    assert!(pin.is_low().unwrap());
    assert!(!pin.is_high().unwrap());
}

#[test]
fn into_output_pin() {
    let emu = Emulator::new();
    let pin = InputPin::from_pin(emu.pin(7)).unwrap();

    let mut pin = pin.into_output_pin(PinState::High).unwrap();
    assert!(pin.is_set_high().unwrap());
    assert_eq!(
        emu.log(),
        vec![
            LogEntry::enable(7),
            LogEntry::direction(7, Direction::Input),
            LogEntry::direction(7, Direction::Output),
            LogEntry::value(7, true),
        ]
    );
}

#[test]
fn into_output_pin_clears_edge() {
    let emu = Emulator::new();
    let mut pin = emu.pin(7);
    pin.enable().unwrap();
    pin.set_edge(Edge::Rising).unwrap();
    let pin = InputPin::try_from(pin).unwrap();

    let pin: Pin<_> = pin.into_output_pin(PinState::Low).unwrap().into();
    assert_eq!(pin.backend().attr(7, gpiosysfs::line::Channel::Edge), Some("none\n"));
}

#[test]
fn try_from_pin() {
    let emu = Emulator::new();

    assert!(matches!(
        InputPin::try_from(emu.pin(2)),
        Err(Error::RequiresEnabled)
    ));

    let mut pin = emu.pin(2);
    pin.enable().unwrap();
    pin.set_direction(Direction::Output).unwrap();
    let res = InputPin::try_from(pin);
    assert!(matches!(res, Err(Error::RequiresInputMode)));
}

#[test]
fn disabled_pin() {
    let emu = Emulator::new();
    let pin = InputPin::from_pin(emu.pin(2)).unwrap();
    let mut pin: Pin<_> = pin.into();
    pin.disable().unwrap();

    assert!(matches!(InputPin::try_from(pin), Err(Error::RequiresEnabled)));
}

#[test]
fn error_display() {
    let err = Error::from(gpiosysfs::Error::InvalidArgument("bad".into()));
    assert_eq!(err.to_string(), "gpiosysfs returned: bad");
}
