use std::fmt::{Display, Formatter};

/// Number of drivable column lines.
pub const COLUMNS: usize = 3;
/// Number of readable row lines.
pub const ROWS: usize = 4;

/// A column line of the key matrix, `0..COLUMNS`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Column(u8);

impl Column {
    pub fn new(index: u8) -> Option<Self> {
        ((index as usize) < COLUMNS).then_some(Column(index))
    }

    /// Same as [Column::new], for constants.
    ///
    /// # Panics
    /// If `index` is out of range.
    pub const fn from_value(index: u8) -> Self {
        assert!((index as usize) < COLUMNS, "column index out of range");
        Column(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// All columns, in scan order.
    pub fn all() -> impl Iterator<Item = Column> {
        (0..COLUMNS as u8).map(Column)
    }
}

/// A row line of the key matrix, `0..ROWS`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Row(u8);

impl Row {
    pub fn new(index: u8) -> Option<Self> {
        ((index as usize) < ROWS).then_some(Row(index))
    }

    /// Same as [Row::new], for constants.
    ///
    /// # Panics
    /// If `index` is out of range.
    pub const fn from_value(index: u8) -> Self {
        assert!((index as usize) < ROWS, "row index out of range");
        Row(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// All rows, in sampling order.
    pub fn all() -> impl Iterator<Item = Row> {
        (0..ROWS as u8).map(Row)
    }
}

/// One key position: the crossing of a column and a row.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Cell {
    pub column: Column,
    pub row: Row,
}

impl Cell {
    pub const fn new(column: Column, row: Row) -> Self {
        Cell { column, row }
    }

    /// Builds a cell from raw `(x, y)` coordinates, if both are in range.
    pub fn at(x: u8, y: u8) -> Option<Self> {
        Some(Cell::new(Column::new(x)?, Row::new(y)?))
    }

    /// All cells in scan order: column by column, rows within each column.
    pub fn all() -> impl Iterator<Item = Cell> {
        Column::all().flat_map(|column| Row::all().map(move |row| Cell::new(column, row)))
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.column.0, self.row.0)
    }
}

/// Press state of every key, as of the last completed scan.
///
/// Indexed `[column][row]`, matching the order in which the matrix is scanned.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MatrixState {
    pressed: [[bool; ROWS]; COLUMNS],
}

impl MatrixState {
    /// All keys released.
    pub const fn new() -> Self {
        MatrixState {
            pressed: [[false; ROWS]; COLUMNS],
        }
    }

    pub fn is_pressed(&self, cell: Cell) -> bool {
        self.pressed[cell.column.index()][cell.row.index()]
    }

    pub(crate) fn set(&mut self, cell: Cell, pressed: bool) {
        self.pressed[cell.column.index()][cell.row.index()] = pressed;
    }

    /// Pressed cells, in scan order.
    pub fn pressed(&self) -> impl Iterator<Item = Cell> + '_ {
        Cell::all().filter(|&cell| self.is_pressed(cell))
    }

    pub fn pressed_count(&self) -> usize {
        self.pressed.iter().flatten().filter(|&&pressed| pressed).count()
    }

    pub fn is_empty(&self) -> bool {
        self.pressed_count() == 0
    }
}

impl FromIterator<Cell> for MatrixState {
    fn from_iter<T: IntoIterator<Item = Cell>>(iter: T) -> Self {
        let mut state = MatrixState::new();
        for cell in iter {
            state.set(cell, true);
        }
        state
    }
}

/// Renders the matrix as it sits on the keypad, one row per line: `X` pressed, `.` released.
impl Display for MatrixState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for row in Row::all() {
            if row.index() > 0 {
                writeln!(f)?;
            }
            for column in Column::all() {
                let ch = if self.is_pressed(Cell::new(column, row)) { 'X' } else { '.' };
                write!(f, "{}", ch)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_validated() {
        assert!(Column::new(2).is_some());
        assert!(Column::new(3).is_none());
        assert!(Row::new(3).is_some());
        assert!(Row::new(4).is_none());
        assert_eq!(Cell::at(3, 0), None);
    }

    #[test]
    fn cells_come_in_scan_order() {
        let cells: Vec<_> = Cell::all().map(|c| (c.column.index(), c.row.index())).collect();
        assert_eq!(cells.len(), COLUMNS * ROWS);
        assert_eq!(&cells[..5], &[(0, 0), (0, 1), (0, 2), (0, 3), (1, 0)]);
        assert_eq!(cells.last(), Some(&(2, 3)));
    }

    #[test]
    fn starts_released() {
        let state = MatrixState::new();
        assert!(state.is_empty());
        assert_eq!(state.pressed().count(), 0);
    }

    #[test]
    fn renders_grid() {
        const CELL: Cell = Cell::new(Column::from_value(1), Row::from_value(2));
        let state: MatrixState = [CELL, Cell::at(0, 0).unwrap()].into_iter().collect();
        assert_eq!(state.to_string(), "X..\n...\n.X.\n...");
        assert_eq!(state.pressed_count(), 2);
        assert_eq!(state.pressed().collect::<Vec<_>>(), vec![Cell::at(0, 0).unwrap(), CELL]);
    }
}
