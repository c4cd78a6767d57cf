mod edge;
mod gpio;
mod keymap;
mod matrix;
mod scan;

use std::fmt::{Debug, Display, Formatter};
use std::sync::mpsc::Sender;
use crate::GpioResult;
pub use edge::*;
pub use gpio::*;
pub use keymap::*;
pub use matrix::*;
pub use scan::*;

/// A key that went down, and where.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct KeyPress<K> {
    pub cell: Cell,
    pub key: K,
}

impl<K: Display> Display for KeyPress<K> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}", self.key, self.cell)
    }
}

/// Where key presses go once they are detected.
pub trait KeySink<K> {
    fn key_pressed(&mut self, press: &KeyPress<K>);
}

impl<K, F: FnMut(&KeyPress<K>)> KeySink<K> for F {
    fn key_pressed(&mut self, press: &KeyPress<K>) {
        self(press)
    }
}

/// Forwards presses to a channel. A hung-up receiver drops them.
impl<K: Clone> KeySink<K> for Sender<KeyPress<K>> {
    fn key_pressed(&mut self, press: &KeyPress<K>) {
        let _ = self.send(press.clone());
    }
}

/// The `Keypad` trait defines the interface for polled keypad input devices.
///
/// Whatever polls the keypad calls [Keypad::on_tick] once per period, never two at a time.
pub trait Keypad: Debug {
    type Key;

    /// Runs exactly one scan cycle followed by edge detection, and returns the keys pressed
    /// since the previous cycle.
    ///
    /// On error the cycle is dropped and [Keypad::state] keeps the last completed scan.
    fn on_tick(&mut self) -> GpioResult<Vec<KeyPress<Self::Key>>>;

    /// The matrix as of the last completed scan.
    fn state(&self) -> &MatrixState;

    /// Same as [Keypad::on_tick], handing every press to `sink`. Returns how many there were.
    fn tick_into(&mut self, sink: &mut dyn KeySink<Self::Key>) -> GpioResult<usize> {
        let presses = self.on_tick()?;
        for press in &presses {
            sink.key_pressed(press);
        }
        Ok(presses.len())
    }
}
