use crate::keypad::matrix::{Cell, COLUMNS, ROWS};
use crate::{GpioError, GpioResult};
use std::fmt::{Display, Formatter};

/// Represents the keys a keypad can carry.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum KeypadKey {
    /// The `1` key.
    Key1,
    /// The `2` key.
    Key2,
    /// The `3` key.
    Key3,
    /// The `4` key.
    Key4,
    /// The `5` key.
    Key5,
    /// The `6` key.
    Key6,
    /// The `7` key.
    Key7,
    /// The `8` key.
    Key8,
    /// The `9` key.
    Key9,
    /// The `0` key.
    Key0,
    /// The `*` key.
    KeyAsterisk,
    /// The `#` key.
    KeyHash,
    /// The `A` key.
    KeyA,
    /// The `B` key.
    KeyB,
    /// The `C` key.
    KeyC,
    /// The `D` key.
    KeyD,
}

impl KeypadKey {
    /// Converts the [KeypadKey] to its corresponding character.
    pub fn to_char(self) -> char {
        use KeypadKey::*;

        match self {
            Key1 => '1',
            Key2 => '2',
            Key3 => '3',
            Key4 => '4',
            Key5 => '5',
            Key6 => '6',
            Key7 => '7',
            Key8 => '8',
            Key9 => '9',
            Key0 => '0',
            KeyAsterisk => '*',
            KeyHash => '#',
            KeyA => 'A',
            KeyB => 'B',
            KeyC => 'C',
            KeyD => 'D',
        }
    }

    /// Converts a character printed on a keypad to its [KeypadKey].
    pub fn from_char(ch: char) -> Option<KeypadKey> {
        use KeypadKey::*;

        Some(match ch.to_ascii_uppercase() {
            '1' => Key1,
            '2' => Key2,
            '3' => Key3,
            '4' => Key4,
            '5' => Key5,
            '6' => Key6,
            '7' => Key7,
            '8' => Key8,
            '9' => Key9,
            '0' => Key0,
            '*' => KeyAsterisk,
            '#' => KeyHash,
            'A' => KeyA,
            'B' => KeyB,
            'C' => KeyC,
            'D' => KeyD,
            _ => return None,
        })
    }
}

impl Display for KeypadKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// Maps every cell of the matrix to the key printed on it.
///
/// The layout is stored row by row, as the keys appear on the keypad.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Keymap {
    layout: [[KeypadKey; COLUMNS]; ROWS],
}

impl Keymap {
    /// The usual telephone keypad.
    pub const PHONE: Keymap = {
        use KeypadKey::*;

        Keymap::new([
            [ Key1, Key2, Key3, ],
            [ Key4, Key5, Key6, ],
            [ Key7, Key8, Key9, ],
            [ KeyAsterisk, Key0, KeyHash, ],
        ])
    };

    pub const fn new(layout: [[KeypadKey; COLUMNS]; ROWS]) -> Self {
        Keymap { layout }
    }

    /// Builds a keymap from the characters printed on each key, row by row.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if a character doesn't name a [KeypadKey].
    pub fn from_chars(layout: [[char; COLUMNS]; ROWS]) -> GpioResult<Self> {
        let mut keys = Self::PHONE.layout;
        for (row, chars) in layout.iter().enumerate() {
            for (column, &ch) in chars.iter().enumerate() {
                keys[row][column] = KeypadKey::from_char(ch).ok_or(GpioError::InvalidArgument)?;
            }
        }
        Ok(Keymap::new(keys))
    }

    /// Gets the key at the given cell. Every cell has one.
    pub fn lookup(&self, cell: Cell) -> KeypadKey {
        self.layout[cell.row.index()][cell.column.index()]
    }
}

impl Default for Keymap {
    fn default() -> Self {
        Keymap::PHONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_layout_reference_table() {
        let expected = [
            ((0, 0), '1'), ((1, 0), '2'), ((2, 0), '3'),
            ((0, 1), '4'), ((1, 1), '5'), ((2, 1), '6'),
            ((0, 2), '7'), ((1, 2), '8'), ((2, 2), '9'),
            ((0, 3), '*'), ((1, 3), '0'), ((2, 3), '#'),
        ];
        for ((x, y), ch) in expected {
            let cell = Cell::at(x, y).unwrap();
            assert_eq!(Keymap::PHONE.lookup(cell).to_char(), ch, "cell {}", cell);
        }
    }

    #[test]
    fn lookup_is_total_and_distinct() {
        let mut seen: Vec<_> = Cell::all().map(|cell| Keymap::PHONE.lookup(cell)).collect();
        assert_eq!(seen.len(), 12);
        seen.sort_by_key(|key| key.to_char());
        seen.dedup();
        assert_eq!(seen.len(), 12);
    }

    #[test]
    fn chars_round_trip_through_keys() {
        for ch in "0123456789*#ABCD".chars() {
            assert_eq!(KeypadKey::from_char(ch).map(KeypadKey::to_char), Some(ch));
        }
        assert_eq!(KeypadKey::from_char('a'), Some(KeypadKey::KeyA));
        assert_eq!(KeypadKey::from_char('x'), None);
    }

    #[test]
    fn custom_layout_from_chars() {
        let keymap = Keymap::from_chars([
            ['A', 'B', 'C'],
            ['1', '2', '3'],
            ['4', '5', '6'],
            ['*', 'D', '#'],
        ])
        .unwrap();
        assert_eq!(keymap.lookup(Cell::at(0, 0).unwrap()), KeypadKey::KeyA);
        assert_eq!(keymap.lookup(Cell::at(1, 3).unwrap()), KeypadKey::KeyD);
    }

    #[test]
    fn unknown_symbol_is_rejected() {
        let err = Keymap::from_chars([
            ['1', '2', '3'],
            ['4', '5', '6'],
            ['7', '?', '9'],
            ['*', '0', '#'],
        ])
        .unwrap_err();
        assert_eq!(err, GpioError::InvalidArgument);
    }
}
