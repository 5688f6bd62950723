// SPDX-FileCopyrightText: 2024 Kent Gibson <warthog618@gmail.com>
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use embedded_hal::digital::{OutputPin as _, PinState, StatefulOutputPin};
use gpiosysfs::emulator::{Actions, Emulator, LogEntry};
use gpiosysfs::line::{Direction, Value};
use gpiosysfs_embedded_hal::{Error, OutputPin};

fn values(emu: &Emulator) -> Vec<LogEntry> {
    emu.log()
        .into_iter()
        .filter(|e| e.action == gpiosysfs::emulator::Action::ChangeValue)
        .collect()
}

#[test]
fn from_pin() {
    let emu = Emulator::new();
    let pin = OutputPin::from_pin(emu.pin(3), PinState::High).unwrap();

    assert_eq!(pin.number(), 3);
    assert_eq!(
        emu.log(),
        vec![
            LogEntry::enable(3),
            LogEntry::direction(3, Direction::Output),
            LogEntry::value(3, true),
        ]
    );
}

#[test]
fn set_high() {
    let emu = Emulator::new();
    let mut pin = OutputPin::from_pin(emu.pin(3), PinState::Low).unwrap();

    pin.set_high().unwrap();
    assert_eq!(
        values(&emu),
        vec![LogEntry::value(3, false), LogEntry::value(3, true)]
    );
}

#[test]
fn set_low() {
    let emu = Emulator::new();
    let mut pin = OutputPin::from_pin(emu.pin(2), PinState::High).unwrap();

    pin.set_low().unwrap();
    assert_eq!(
        values(&emu),
        vec![LogEntry::value(2, true), LogEntry::value(2, false)]
    );
}

#[test]
fn unchanged_level_not_written() {
    let emu = Emulator::new();
    emu.set_assert_mask(Actions::CHANGE_VALUE);
    emu.assert([LogEntry::value(4, false), LogEntry::value(4, true)]);
    let mut pin = OutputPin::from_pin(emu.pin(4), PinState::Low).unwrap();

    pin.set_low().unwrap();
    pin.set_high().unwrap();
    pin.set_high().unwrap();
    emu.finish().unwrap();
}

#[test]
fn is_set_high() {
    let emu = Emulator::new();
    let mut pin = OutputPin::from_pin(emu.pin(3), PinState::Low).unwrap();

    assert!(!pin.is_set_high().unwrap());
    pin.set_high().unwrap();
    assert!(pin.is_set_high().unwrap());
    pin.set_low().unwrap();
    assert!(!pin.is_set_high().unwrap());
}

#[test]
fn is_set_low() {
    let emu = Emulator::new();
    let mut pin = OutputPin::from_pin(emu.pin(3), PinState::Low).unwrap();

    assert!(pin.is_set_low().unwrap());
    pin.set_high().unwrap();
    assert!(!pin.is_set_low().unwrap());
    pin.set_low().unwrap();
    assert!(pin.is_set_low().unwrap());
}

#[test]
fn toggle() {
    let emu = Emulator::new();
    let mut pin = OutputPin::from_pin(emu.pin(2), PinState::High).unwrap();

    pin.toggle().unwrap();
    pin.toggle().unwrap();
    assert_eq!(
        values(&emu),
        vec![
            LogEntry::value(2, true),
            LogEntry::value(2, false),
            LogEntry::value(2, true),
        ]
    );
}

#[test]
fn read_back() {
    use embedded_hal::digital::InputPin as _;

    let emu = Emulator::new();
    let mut pin = OutputPin::from_pin(emu.pin(2), PinState::High).unwrap();

    assert!(pin.is_high().unwrap());
    pin.set_low().unwrap();
    assert!(pin.is_low().unwrap());
}

#[test]
fn into_input_pin() {
    use embedded_hal::digital::InputPin as _;

    let emu = Emulator::new();
    let pin = OutputPin::from_pin(emu.pin(5), PinState::High).unwrap();

    let pin = pin.into_input_pin().unwrap();
    assert_eq!(emu.log().last(), Some(&LogEntry::direction(5, Direction::Input)));
    let mut pin: gpiosysfs::Pin<_> = pin.into();
    pin.backend_mut().drive(5, Value::Active);
    let mut pin = gpiosysfs_embedded_hal::InputPin::try_from(pin).unwrap();
    assert!(pin.is_high().unwrap());
}

#[test]
fn try_from_pin() {
    let emu = Emulator::new();
    let mut pin = emu.pin(6);

    assert!(matches!(
        OutputPin::try_from(emu.pin(6)),
        Err(Error::RequiresEnabled)
    ));

    pin.enable().unwrap();
    pin.set_direction(Direction::Output).unwrap();
    pin.set_value(true).unwrap();
    let mut pin = OutputPin::try_from(pin).unwrap();
    // current level retained
    assert!(pin.is_set_high().unwrap());
}

#[test]
fn try_from_input() {
    let emu = Emulator::new();
    let mut pin = emu.pin(6);
    pin.enable().unwrap();

    assert!(matches!(
        OutputPin::try_from(pin),
        Err(Error::RequiresOutputMode)
    ));
}

#[test]
fn drop_unexports() {
    let emu = Emulator::new();
    {
        let _pin = OutputPin::from_pin(emu.pin(8), PinState::Low).unwrap();
    }
    assert_eq!(emu.log().last(), Some(&LogEntry::disable(8)));
}
