//! Line access through the Linux GPIO character device, using the gpiod library.
//!
//! Each [GpioPin] requests its line from the chip when it is turned into an input or output,
//! and the line is handed back to the kernel when that input or output is dropped.
use crate::{
    GpioActiveLevel, GpioBias, GpioDriveMode, GpioDriver, GpioError, GpioInput, GpioOutput,
    GpioPin, GpioResult,
};
use bitvec::vec::BitVec;
use log::trace;
use std::fmt::{Debug, Formatter};
use std::path::Path;
use std::sync::atomic::AtomicU8;

/// One GPIO chip. Hands out each of its lines to at most one [GpioPin] at a time.
pub struct GpiodDriver {
    chip: gpiod::Chip,
    used_lines: BitVec<AtomicU8>,
}

impl GpiodDriver {
    /// Wraps an already opened chip.
    pub fn new(chip: gpiod::Chip) -> Self {
        let n = chip.num_lines() as usize;
        Self {
            chip,
            used_lines: BitVec::repeat(false, n),
        }
    }

    /// Opens the chip at the given path, e.g. `/dev/gpiochip0`.
    pub fn open(path: impl AsRef<Path>) -> GpioResult<Self> {
        let chip = gpiod::Chip::new(path.as_ref())?;
        Ok(Self::new(chip))
    }
}

impl Debug for GpiodDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodDriver({})", self.chip.name())
    }
}

impl GpioDriver for GpiodDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.chip.num_lines() as usize)
    }

    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>> {
        if index >= self.count()? {
            return Err(GpioError::InvalidArgument);
        }

        if self.used_lines[index] {
            return Err(GpioError::AlreadyInUse);
        }

        self.used_lines.set_aliased(index, true);

        Ok(Box::new(ChipLine {
            driver: self,
            offset: index,
            active_level: GpioActiveLevel::High,
            bias: GpioBias::None,
            drive_mode: GpioDriveMode::PushPull,
        }))
    }
}

impl From<GpioActiveLevel> for gpiod::Active {
    fn from(level: GpioActiveLevel) -> Self {
        match level {
            GpioActiveLevel::High => gpiod::Active::High,
            GpioActiveLevel::Low => gpiod::Active::Low,
        }
    }
}

impl From<GpioBias> for gpiod::Bias {
    fn from(bias: GpioBias) -> Self {
        match bias {
            GpioBias::None => gpiod::Bias::Disable,
            GpioBias::PullUp => gpiod::Bias::PullUp,
            GpioBias::PullDown => gpiod::Bias::PullDown,
        }
    }
}

impl From<GpioDriveMode> for gpiod::Drive {
    fn from(mode: GpioDriveMode) -> Self {
        match mode {
            GpioDriveMode::PushPull => gpiod::Drive::PushPull,
            GpioDriveMode::OpenDrain => gpiod::Drive::OpenDrain,
            GpioDriveMode::OpenSource => gpiod::Drive::OpenSource,
        }
    }
}

/// A line that is reserved but not yet requested. Its settings apply on the next request.
struct ChipLine<'a> {
    driver: &'a GpiodDriver,
    offset: usize,
    active_level: GpioActiveLevel,
    bias: GpioBias,
    drive_mode: GpioDriveMode,
}

impl Debug for ChipLine<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} line {}", self.driver, self.offset)
    }
}

impl GpioPin for ChipLine<'_> {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioInput + '_>> {
        trace!("Requesting {:?} as a row input", self);
        let request = self.driver.chip.request_lines(
            gpiod::Options::input([self.offset as u32])
                .consumer(env!("CARGO_PKG_NAME"))
                .active(self.active_level.into())
                .bias(self.bias.into()),
        )?;
        Ok(Box::new(RequestedInput { line: self, request }))
    }

    fn as_output(&mut self) -> GpioResult<Box<dyn GpioOutput + '_>> {
        trace!("Requesting {:?} as a column output", self);
        // Open-drain columns must come up released, not driven low.
        let initial = self.drive_mode != GpioDriveMode::PushPull;
        let request = self.driver.chip.request_lines(
            gpiod::Options::output([self.offset as u32])
                .values([initial])
                .consumer(env!("CARGO_PKG_NAME"))
                .active(self.active_level.into())
                .bias(self.bias.into())
                .drive(self.drive_mode.into()),
        )?;
        Ok(Box::new(RequestedOutput { line: self, request }))
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
}

impl Drop for ChipLine<'_> {
    fn drop(&mut self) {
        self.driver.used_lines.set_aliased(self.offset, false);
    }
}

struct RequestedInput<'a> {
    line: &'a ChipLine<'a>,
    request: gpiod::Lines<gpiod::Input>,
}

impl Debug for RequestedInput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} in", self.line)
    }
}

impl GpioInput for RequestedInput<'_> {
    fn read(&self) -> GpioResult<bool> {
        let values = self.request.get_values([false])?;
        Ok(values[0])
    }
}

struct RequestedOutput<'a> {
    line: &'a ChipLine<'a>,
    request: gpiod::Lines<gpiod::Output>,
}

impl Debug for RequestedOutput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} out", self.line)
    }
}

impl GpioOutput for RequestedOutput<'_> {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.request.set_values([value])?;
        Ok(())
    }
}
