//! An in-memory GPIO backend wired as a switch matrix.
//!
//! Lines behave like the real thing closely enough to scan a keypad: outputs drive or float
//! according to their drive mode, inputs follow whatever a closed contact connects them to,
//! and fall back to their bias otherwise. Contacts between two lines stand in for pressed keys.
//!
//! Every read and write is recorded in a journal, and any line can be made to fail, so scans
//! can be checked for ordering and fault handling without hardware.
use crate::{
    GpioActiveLevel, GpioBias, GpioDriveMode, GpioDriver, GpioError, GpioInput, GpioOutput,
    GpioPin, GpioResult,
};
use bitvec::vec::BitVec;
use std::collections::BTreeSet;
use std::fmt::{Debug, Formatter};
use std::io::ErrorKind;
use std::sync::atomic::AtomicU8;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// What a line is currently doing.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SimLineMode {
    /// Released: not driving, reads follow contacts and bias.
    Input,
    /// Requested as output; `None` means the output is floating.
    Output(Option<bool>),
}

/// One recorded line access.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SimAccess {
    /// A write, with the physical state it put on the line (`None` is floating).
    Write(Option<bool>),
    /// A read, with the physical level that was seen.
    Read(bool),
}

#[derive(Copy, Clone, Debug)]
pub struct SimEvent {
    pub at: Instant,
    pub line: usize,
    pub access: SimAccess,
}

#[derive(Copy, Clone, Debug)]
struct SimFault {
    kind: ErrorKind,
    /// Accesses that still succeed before the fault kicks in.
    grace: usize,
}

#[derive(Clone, Debug)]
struct SimLine {
    mode: SimLineMode,
    bias: GpioBias,
    debounce: Option<Duration>,
    fault: Option<SimFault>,
}

impl Default for SimLine {
    fn default() -> Self {
        SimLine {
            mode: SimLineMode::Input,
            bias: GpioBias::None,
            debounce: None,
            fault: None,
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    lines: Vec<SimLine>,
    contacts: BTreeSet<(usize, usize)>,
    journal: Vec<SimEvent>,
}

impl SimState {
    fn driven(&self, line: usize) -> Option<bool> {
        match self.lines[line].mode {
            SimLineMode::Output(state) => state,
            SimLineMode::Input => None,
        }
    }

    /// Physical level of a line. A driving output wins; low wins over high among contacts.
    fn level(&self, line: usize) -> bool {
        if let Some(level) = self.driven(line) {
            return level;
        }

        let mut connected = self
            .contacts
            .iter()
            .filter_map(|&(a, b)| {
                if a == line {
                    Some(b)
                } else if b == line {
                    Some(a)
                } else {
                    None
                }
            })
            .filter_map(|other| self.driven(other))
            .peekable();

        if connected.peek().is_some() {
            return connected.all(|level| level);
        }

        matches!(self.lines[line].bias, GpioBias::PullUp)
    }

    fn check_fault(&mut self, line: usize) -> GpioResult<()> {
        match &mut self.lines[line].fault {
            Some(fault) if fault.grace > 0 => {
                fault.grace -= 1;
                Ok(())
            }
            Some(fault) => Err(GpioError::Io(fault.kind)),
            None => Ok(()),
        }
    }

    fn record(&mut self, line: usize, access: SimAccess) {
        self.journal.push(SimEvent {
            at: Instant::now(),
            line,
            access,
        });
    }
}

fn contact(a: usize, b: usize) -> (usize, usize) {
    (a.min(b), a.max(b))
}

/// A simulated GPIO chip.
pub struct SimGpioDriver {
    state: Mutex<SimState>,
    used_lines: BitVec<AtomicU8>,
}

impl SimGpioDriver {
    pub fn new(count: usize) -> Self {
        SimGpioDriver {
            state: Mutex::new(SimState {
                lines: vec![SimLine::default(); count],
                ..SimState::default()
            }),
            used_lines: BitVec::repeat(false, count),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_index(&self, line: usize) -> GpioResult<()> {
        if line < self.used_lines.len() {
            Ok(())
        } else {
            Err(GpioError::InvalidArgument)
        }
    }

    /// Closes the contact between two lines, like a key press.
    pub fn connect(&self, a: usize, b: usize) -> GpioResult<()> {
        self.check_index(a)?;
        self.check_index(b)?;
        self.lock().contacts.insert(contact(a, b));
        Ok(())
    }

    /// Opens the contact between two lines.
    pub fn disconnect(&self, a: usize, b: usize) {
        self.lock().contacts.remove(&contact(a, b));
    }

    /// Makes every read and write on the line fail with the given error kind.
    pub fn fail_line(&self, line: usize, kind: ErrorKind) -> GpioResult<()> {
        self.fail_line_after(line, 0, kind)
    }

    /// Same as [SimGpioDriver::fail_line], letting the next `accesses` reads or writes through first.
    pub fn fail_line_after(&self, line: usize, accesses: usize, kind: ErrorKind) -> GpioResult<()> {
        self.check_index(line)?;
        self.lock().lines[line].fault = Some(SimFault { kind, grace: accesses });
        Ok(())
    }

    pub fn clear_fault(&self, line: usize) {
        if let Some(line) = self.lock().lines.get_mut(line) {
            line.fault = None;
        }
    }

    /// What the line is doing, or `None` if there is no such line.
    pub fn mode(&self, line: usize) -> Option<SimLineMode> {
        self.lock().lines.get(line).map(|l| l.mode)
    }

    /// Physical level currently seen on the line.
    pub fn level(&self, line: usize) -> Option<bool> {
        let state = self.lock();
        (line < state.lines.len()).then(|| state.level(line))
    }

    /// Debounce interval the line was last requested with. `None` if it has none, or there is
    /// no such line.
    pub fn debounce(&self, line: usize) -> Option<Duration> {
        self.lock().lines.get(line).and_then(|l| l.debounce)
    }

    pub fn journal(&self) -> Vec<SimEvent> {
        self.lock().journal.clone()
    }

    pub fn clear_journal(&self) {
        self.lock().journal.clear();
    }
}

impl Debug for SimGpioDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SimGpioDriver({})", self.used_lines.len())
    }
}

impl GpioDriver for SimGpioDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.used_lines.len())
    }

    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>> {
        self.check_index(index)?;

        if self.used_lines[index] {
            return Err(GpioError::AlreadyInUse);
        }

        self.used_lines.set_aliased(index, true);

        Ok(Box::new(SimPin {
            driver: self,
            line_index: index,
            active_level: GpioActiveLevel::High,
            bias: GpioBias::None,
            drive_mode: GpioDriveMode::PushPull,
            debounce: None,
        }))
    }
}

struct SimPin<'a> {
    driver: &'a SimGpioDriver,
    line_index: usize,
    active_level: GpioActiveLevel,
    bias: GpioBias,
    drive_mode: GpioDriveMode,
    debounce: Option<Duration>,
}

impl SimPin<'_> {
    fn release(&self) {
        self.driver.lock().lines[self.line_index].mode = SimLineMode::Input;
    }
}

impl Debug for SimPin<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}]", self.driver, self.line_index)
    }
}

impl GpioPin for SimPin<'_> {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioInput + '_>> {
        let mut state = self.driver.lock();
        state.check_fault(self.line_index)?;
        let line = &mut state.lines[self.line_index];
        line.mode = SimLineMode::Input;
        line.bias = self.bias;
        line.debounce = self.debounce;
        drop(state);
        Ok(Box::new(SimInput { pin: self }))
    }

    fn as_output(&mut self) -> GpioResult<Box<dyn GpioOutput + '_>> {
        let mut state = self.driver.lock();
        state.check_fault(self.line_index)?;
        // Comes up in the inactive state: floating for open-drain/open-source, low for push-pull.
        let initial = match self.drive_mode {
            GpioDriveMode::PushPull => Some(false),
            _ => None,
        };
        let line = &mut state.lines[self.line_index];
        line.mode = SimLineMode::Output(initial);
        line.bias = self.bias;
        line.debounce = None;
        drop(state);
        Ok(Box::new(SimOutput { pin: self }))
    }

    fn supports_active_level(&self) -> bool {
        true
    }

    fn active_level(&self) -> GpioActiveLevel {
        self.active_level
    }

    fn set_active_level(&mut self, level: GpioActiveLevel) -> GpioResult<()> {
        self.active_level = level;
        Ok(())
    }

    fn supports_bias(&self) -> bool {
        true
    }

    fn bias(&self) -> GpioBias {
        self.bias
    }

    fn set_bias(&mut self, bias: GpioBias) -> GpioResult<()> {
        self.bias = bias;
        Ok(())
    }

    fn supports_drive_mode(&self) -> bool {
        true
    }

    fn drive_mode(&self) -> GpioDriveMode {
        self.drive_mode
    }

    fn set_drive_mode(&mut self, mode: GpioDriveMode) -> GpioResult<()> {
        self.drive_mode = mode;
        Ok(())
    }

    fn supports_debounce(&self) -> bool {
        true
    }

    fn debounce(&self) -> Option<Duration> {
        self.debounce
    }

    fn set_debounce(&mut self, period: Duration) -> GpioResult<()> {
        self.debounce = Some(period);
        Ok(())
    }
}

impl Drop for SimPin<'_> {
    fn drop(&mut self) {
        self.release();
        self.driver.used_lines.set_aliased(self.line_index, false);
    }
}

struct SimInput<'a> {
    pin: &'a SimPin<'a>,
}

impl Debug for SimInput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[input]", self.pin)
    }
}

impl GpioInput for SimInput<'_> {
    fn read(&self) -> GpioResult<bool> {
        let mut state = self.pin.driver.lock();
        state.check_fault(self.pin.line_index)?;
        let level = state.level(self.pin.line_index);
        state.record(self.pin.line_index, SimAccess::Read(level));
        Ok(self.pin.active_level.get_state(level))
    }
}

struct SimOutput<'a> {
    pin: &'a SimPin<'a>,
}

impl Debug for SimOutput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[output]", self.pin)
    }
}

impl GpioOutput for SimOutput<'_> {
    fn write(&self, value: bool) -> GpioResult<()> {
        let mut state = self.pin.driver.lock();
        state.check_fault(self.pin.line_index)?;
        let physical = self
            .pin
            .drive_mode
            .get_state(self.pin.active_level.get_state(value));
        state.lines[self.pin.line_index].mode = SimLineMode::Output(physical);
        state.record(self.pin.line_index, SimAccess::Write(physical));
        Ok(())
    }
}

impl Drop for SimOutput<'_> {
    fn drop(&mut self) {
        self.pin.release();
    }
}
