//! Drives the matrix one column at a time and samples the rows.
use crate::keypad::matrix::{Cell, Column, MatrixState, Row, COLUMNS, ROWS};
use crate::{GpioInput, GpioOutput, GpioPin, GpioResult};
use log::{debug, error, warn};
use std::fmt::{Debug, Formatter};
use std::thread;
use std::time::Duration;

/// Time given to the lines to settle after a column changes state, before anything is sampled.
pub const SETTLE_DELAY: Duration = Duration::from_micros(100);

fn settle() {
    thread::sleep(SETTLE_DELAY);
}

/// A column held low for as long as the guard lives.
///
/// The column is released when the guard is dropped, so an early return can't leave it driven.
struct DrivenColumn<'a> {
    line: &'a dyn GpioOutput,
    released: bool,
}

impl<'a> DrivenColumn<'a> {
    fn drive(line: &'a dyn GpioOutput) -> GpioResult<Self> {
        let guard = DrivenColumn {
            line,
            released: false,
        };
        // On failure the guard is dropped here, which still tries to release the line.
        line.write(false)?;
        Ok(guard)
    }

    fn release(mut self) -> GpioResult<()> {
        self.released = true;
        self.line.write(true)
    }
}

impl Drop for DrivenColumn<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.line.write(true) {
            error!("Failed to release {:?}: {}", self.line, e);
        }
    }
}

/// The column outputs and row inputs of a key matrix.
///
/// Columns are open-drain: `false` drives a column low, `true` releases it.
/// Rows are pulled up, so a row reads low only through a pressed key on the driven column.
pub struct MatrixLines<'a> {
    columns: [&'a dyn GpioOutput; COLUMNS],
    rows: [&'a dyn GpioInput; ROWS],
}

impl Debug for MatrixLines<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MatrixLines({:?}, {:?})", self.columns, self.rows)
    }
}

impl<'a> MatrixLines<'a> {
    pub fn new(columns: [&'a dyn GpioOutput; COLUMNS], rows: [&'a dyn GpioInput; ROWS]) -> Self {
        MatrixLines { columns, rows }
    }

    /// Puts every column in the inactive state.
    pub fn release_all(&self) -> GpioResult<()> {
        for column in self.columns {
            column.write(true)?;
        }
        Ok(())
    }

    /// Runs one full scan cycle and returns what every key reads.
    ///
    /// Columns are driven in increasing order, never two at once. If a line fails, the cycle is
    /// abandoned with the column released, and the error is returned as is.
    pub fn scan(&self) -> GpioResult<MatrixState> {
        let mut sample = MatrixState::new();

        for column in Column::all() {
            let driven = DrivenColumn::drive(self.columns[column.index()])?;
            settle();

            for row in Row::all() {
                let level = self.rows[row.index()].read()?;
                sample.set(Cell::new(column, row), !level);
            }

            driven.release()?;
            settle();
        }

        Ok(sample)
    }
}

/// Applies the debounce interval to every row pin, before the pins are turned into inputs.
///
/// Debouncing is a hint to the backend; the scan itself doesn't filter anything. A missing
/// interval, or any row without hardware debounce, only gets a warning and leaves every row
/// as it was.
///
/// Returns whether the interval was applied.
pub fn configure_debounce<'p, P>(
    rows: impl IntoIterator<Item = &'p mut P>,
    debounce: Option<Duration>,
) -> GpioResult<bool>
where
    P: GpioPin + ?Sized + 'p,
{
    let Some(debounce) = debounce else {
        warn!("No debounce interval configured");
        return Ok(false);
    };

    let rows: Vec<_> = rows.into_iter().collect();
    if let Some(row) = rows.iter().find(|row| !row.supports_debounce()) {
        warn!("No HW support for debouncing on {:?}", row);
        return Ok(false);
    }

    for row in rows {
        row.set_debounce(debounce)?;
        debug!("{:?} debounced at {:?}", row, debounce);
    }

    Ok(true)
}
