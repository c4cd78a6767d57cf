use std::env::var_os;
use std::ffi::OsStr;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use keymatrix_gpio::keypad::{Cell, Keymap, COLUMNS, ROWS};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {0} not found")]
    NotFound(PathBuf),
    #[error("can't read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid line list in {var}: {value:?}")]
    InvalidPins { var: &'static str, value: String },
    #[error("keymap contains a symbol that isn't on any keypad")]
    InvalidKeymap,
    #[error("no key at {0:?}")]
    InvalidCell([u8; 2]),
}

/// Which line access backend drives the keypad.
#[derive(Serialize, Deserialize, Copy, Clone, Debug, Default, Eq, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// The Linux GPIO character device.
    #[default]
    Gpiod,
    /// An in-memory matrix, for trying things out without hardware.
    Sim,
}

fn default_chip() -> String {
    "/dev/gpiochip0".to_string()
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Config {
    /// Time between two scan cycles.
    pub scan_period_ms: NonZeroU32,
    /// Hardware debounce hint for the row lines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce_delay_us: Option<u32>,
    /// Line offsets of the columns, left to right.
    pub columns: [u32; COLUMNS],
    /// Line offsets of the rows, top to bottom.
    pub rows: [u32; ROWS],
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_chip")]
    pub chip: String,
    /// Characters printed on the keys, row by row. The telephone layout if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keymap: Option<[[char; COLUMNS]; ROWS]>,
    /// Give up after this many failed scans in a row. Never gives up if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_consecutive_failures: Option<NonZeroU32>,
    /// Stop after this many seconds. Runs until killed if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_secs: Option<u64>,
    /// Keys held down in the simulated matrix, as `[x, y]`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sim_pressed: Vec<[u8; 2]>,
}

const COLUMNS_VAR: &str = "KEYMATRIX_PINS_COLS";
const ROWS_VAR: &str = "KEYMATRIX_PINS_ROWS";

/// Parses a line list such as `5, 6, 13`.
pub fn parse_pins<const N: usize>(var: &'static str, pin_str: &str) -> Result<[u32; N], ConfigError> {
    let invalid = || ConfigError::InvalidPins {
        var,
        value: pin_str.to_string(),
    };

    pin_str
        .split([',', ' ', ';'])
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u32>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| invalid())?
        .try_into()
        .map_err(|_| invalid())
}

impl Config {
    /// Where the config is read from: `KEYMATRIX_CONFIG`, or `keymatrix.json`.
    pub fn path() -> PathBuf {
        let config_str = var_os("KEYMATRIX_CONFIG");
        let config_str: &OsStr = config_str.as_deref().unwrap_or(OsStr::new("keymatrix.json"));
        PathBuf::from(config_str)
    }

    /// Loads the config file, then applies the line overrides from the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::path())?;
        config.apply_overrides(
            std::env::var(COLUMNS_VAR).ok().as_deref(),
            std::env::var(ROWS_VAR).ok().as_deref(),
        )?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn apply_overrides(&mut self, columns: Option<&str>, rows: Option<&str>) -> Result<(), ConfigError> {
        if let Some(columns) = columns {
            self.columns = parse_pins(COLUMNS_VAR, columns)?;
        }
        if let Some(rows) = rows {
            self.rows = parse_pins(ROWS_VAR, rows)?;
        }
        Ok(())
    }

    pub fn scan_period(&self) -> Duration {
        Duration::from_millis(self.scan_period_ms.get() as u64)
    }

    pub fn debounce(&self) -> Option<Duration> {
        self.debounce_delay_us.map(|us| Duration::from_micros(us as u64))
    }

    pub fn keymap(&self) -> Result<Keymap, ConfigError> {
        match self.keymap {
            Some(layout) => Keymap::from_chars(layout).map_err(|_| ConfigError::InvalidKeymap),
            None => Ok(Keymap::PHONE),
        }
    }

    pub fn sim_cells(&self) -> Result<Vec<Cell>, ConfigError> {
        self.sim_pressed
            .iter()
            .map(|&[x, y]| Cell::at(x, y).ok_or(ConfigError::InvalidCell([x, y])))
            .collect()
    }
}
