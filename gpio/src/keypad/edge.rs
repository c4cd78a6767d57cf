use crate::keypad::keymap::{Keymap, KeypadKey};
use crate::keypad::matrix::{Cell, MatrixState};
use crate::keypad::KeyPress;

/// Finds the keys that went down between two scans.
///
/// Only a released -> pressed change counts. A key held across scans reports once, and
/// releasing a key reports nothing. Presses come out in scan order.
pub fn detect_edges(previous: &MatrixState, current: &MatrixState, keymap: &Keymap) -> Vec<KeyPress<KeypadKey>> {
    Cell::all()
        .filter(|&cell| !previous.is_pressed(cell) && current.is_pressed(cell))
        .map(|cell| KeyPress {
            cell,
            key: keymap.lookup(cell),
        })
        .collect()
}
