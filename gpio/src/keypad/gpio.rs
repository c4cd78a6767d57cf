use std::fmt::{Debug, Formatter};
use log::trace;
use crate::{GpioInput, GpioOutput, GpioResult};
use crate::keypad::{detect_edges, KeyPress, Keymap, KeypadKey, Keypad, MatrixLines, MatrixState, COLUMNS, ROWS};

/// The `GpioKeypad` struct represents a GPIO-based keypad with 3 columns and 4 rows.
///
/// It owns the press state between cycles, so each instance is independent of any other.
pub struct GpioKeypad<'a> {
    lines: MatrixLines<'a>,
    keymap: Keymap,
    state: MatrixState,
    cycles: u64,
}

impl Debug for GpioKeypad<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpioKeypad({:?})", self.lines)
    }
}

impl<'a> GpioKeypad<'a> {
    /// Creates a new `GpioKeypad` instance with the specified GPIO outputs for columns and inputs for rows.
    ///
    /// The columns are driven low one at a time, and the rows are read to find the pressed keys
    /// in the driven column. Starts with every key released and the telephone layout.
    pub fn new(columns: [&'a dyn GpioOutput; COLUMNS], rows: [&'a dyn GpioInput; ROWS]) -> Self {
        GpioKeypad {
            lines: MatrixLines::new(columns, rows),
            keymap: Keymap::PHONE,
            state: MatrixState::new(),
            cycles: 0,
        }
    }

    pub fn with_keymap(mut self, keymap: Keymap) -> Self {
        self.keymap = keymap;
        self
    }

    pub fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    pub fn lines(&self) -> &MatrixLines<'a> {
        &self.lines
    }

    /// Number of scan cycles completed so far. Failed cycles don't count.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}

impl Keypad for GpioKeypad<'_> {
    type Key = KeypadKey;

    fn on_tick(&mut self) -> GpioResult<Vec<KeyPress<Self::Key>>> {
        let sample = self.lines.scan()?;
        let presses = detect_edges(&self.state, &sample, &self.keymap);
        self.state = sample;
        self.cycles += 1;

        trace!("Cycle {}:\n{}", self.cycles, self.state);

        Ok(presses)
    }

    fn state(&self) -> &MatrixState {
        &self.state
    }
}
