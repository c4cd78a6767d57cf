mod config;
mod poller;

use std::thread;
use std::time::Duration;
use dotenv::dotenv;
use log::{debug, info};
use keymatrix_gpio::{GpioDriver, GpioResult};
use keymatrix_gpio::GpioBias::PullUp;
use keymatrix_gpio::GpioDriveMode::OpenDrain;
use keymatrix_gpio::gpiod::GpiodDriver;
use keymatrix_gpio::keypad::{configure_debounce, GpioKeypad, KeyPress, KeypadKey};
use keymatrix_gpio::sim::SimGpioDriver;
use crate::config::{Backend, Config};
use crate::poller::Poller;

fn main() -> eyre::Result<()> {
    // Initialize environment and logger
    dotenv().ok();
    pretty_env_logger::init();

    info!("keymatrix starting...");

    let config = Config::load()?;

    info!("Keypad @ Cols: {:?}, Rows: {:?}", config.columns, config.rows);
    info!("Scan period: {:?}, debounce: {:?}", config.scan_period(), config.debounce());

    match config.backend {
        Backend::Gpiod => {
            debug!("Opening {}...", config.chip);
            let gpio = GpiodDriver::open(&config.chip)?;
            debug!("{:?} initialized.", gpio);
            run(&gpio, &config)
        }
        Backend::Sim => {
            let lines = config.columns.iter().chain(&config.rows).max().map_or(0, |&n| n as usize + 1);
            let gpio = SimGpioDriver::new(lines);
            for cell in config.sim_cells()? {
                gpio.connect(
                    config.columns[cell.column.index()] as usize,
                    config.rows[cell.row.index()] as usize,
                )?;
                info!("Simulating a held key at {}", cell);
            }
            debug!("{:?} initialized.", gpio);
            run(&gpio, &config)
        }
    }
}

fn run(gpio: &dyn GpioDriver, config: &Config) -> eyre::Result<()> {
    debug!("Initializing keypad driver...");
    let keymap = config.keymap()?;

    let mut column_pins = config
        .columns
        .iter()
        .map(|&n| gpio.get_pin(n as usize))
        .collect::<GpioResult<Vec<_>>>()?;
    let mut row_pins = config
        .rows
        .iter()
        .map(|&n| gpio.get_pin(n as usize))
        .collect::<GpioResult<Vec<_>>>()?;

    for pin in &mut column_pins {
        pin.set_drive_mode(OpenDrain)?;
    }
    for pin in &mut row_pins {
        pin.set_bias(PullUp)?;
    }
    configure_debounce(row_pins.iter_mut().map(|pin| &mut **pin), config.debounce())?;

    let column_outs = column_pins
        .iter_mut()
        .map(|pin| pin.as_output())
        .collect::<GpioResult<Vec<_>>>()?;
    let row_ins = row_pins
        .iter_mut()
        .map(|pin| pin.as_input())
        .collect::<GpioResult<Vec<_>>>()?;

    let mut keypad = GpioKeypad::new(
        std::array::from_fn(|i| &*column_outs[i]),
        std::array::from_fn(|i| &*row_ins[i]),
    )
    .with_keymap(keymap);
    keypad.lines().release_all()?;

    debug!("{:?} initialized.", keypad);

    let poller = Poller::new(config.scan_period())
        .with_max_failures(config.max_consecutive_failures);

    if let Some(secs) = config.run_secs {
        let handle = poller.stop_handle();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(secs));
            info!("Ran for {}s, stopping...", secs);
            handle.stop();
        });
    }

    info!("Starting scan loop...");

    let stats = poller.run(&mut keypad, &mut |press: &KeyPress<KeypadKey>| {
        info!("Key pressed: {}", press);
    })?;

    info!("Stopped after {} cycles ({} failed), {} keys pressed.", stats.cycles, stats.failures, stats.presses);

    Ok(())
}
