use keymatrix_gpio::keypad::{
    Cell, GpioKeypad, KeyPress, Keypad, KeypadKey, Keymap, COLUMNS, ROWS, SETTLE_DELAY,
};
use keymatrix_gpio::sim::{SimAccess, SimGpioDriver, SimLineMode};
use keymatrix_gpio::{GpioBias, GpioDriveMode, GpioDriver, GpioError};
use std::io::ErrorKind;
use std::sync::mpsc;

const COLUMN_LINES: [usize; COLUMNS] = [0, 1, 2];
const ROW_LINES: [usize; ROWS] = [3, 4, 5, 6];

fn new_sim() -> SimGpioDriver {
    SimGpioDriver::new(COLUMN_LINES.len() + ROW_LINES.len())
}

fn press(sim: &SimGpioDriver, x: usize, y: usize) {
    sim.connect(COLUMN_LINES[x], ROW_LINES[y]).unwrap();
}

fn release(sim: &SimGpioDriver, x: usize, y: usize) {
    sim.disconnect(COLUMN_LINES[x], ROW_LINES[y]);
}

/// Wires a keypad to the simulated lines the way the daemon wires it to real ones.
fn with_keypad<R>(sim: &SimGpioDriver, keymap: Keymap, f: impl FnOnce(&mut GpioKeypad<'_>) -> R) -> R {
    let mut column_pins: Vec<_> = COLUMN_LINES.iter().map(|&n| sim.get_pin(n).unwrap()).collect();
    let mut row_pins: Vec<_> = ROW_LINES.iter().map(|&n| sim.get_pin(n).unwrap()).collect();
    for pin in &mut column_pins {
        pin.set_drive_mode(GpioDriveMode::OpenDrain).unwrap();
    }
    for pin in &mut row_pins {
        pin.set_bias(GpioBias::PullUp).unwrap();
    }
    let columns: Vec<_> = column_pins.iter_mut().map(|p| p.as_output().unwrap()).collect();
    let rows: Vec<_> = row_pins.iter_mut().map(|p| p.as_input().unwrap()).collect();

    let mut keypad = GpioKeypad::new(
        std::array::from_fn(|i| &*columns[i]),
        std::array::from_fn(|i| &*rows[i]),
    )
    .with_keymap(keymap);
    keypad.lines().release_all().unwrap();
    f(&mut keypad)
}

fn keys(presses: &[KeyPress<KeypadKey>]) -> String {
    presses.iter().map(|p| p.key.to_char()).collect()
}

fn is_column(line: usize) -> bool {
    COLUMN_LINES.contains(&line)
}

#[test]
fn empty_matrix_stays_silent() {
    let sim = new_sim();
    with_keypad(&sim, Keymap::PHONE, |keypad| {
        for _ in 0..5 {
            assert!(keypad.on_tick().unwrap().is_empty());
        }
        assert!(keypad.state().is_empty());
        assert_eq!(keypad.cycles(), 5);
    });
}

#[test]
fn scan_reads_every_cell() {
    let sim = new_sim();
    press(&sim, 0, 0);
    press(&sim, 2, 1);
    press(&sim, 1, 3);
    with_keypad(&sim, Keymap::PHONE, |keypad| {
        let sample = keypad.lines().scan().unwrap();
        let pressed: Vec<_> = sample.pressed().collect();
        assert_eq!(
            pressed,
            vec![Cell::at(0, 0).unwrap(), Cell::at(1, 3).unwrap(), Cell::at(2, 1).unwrap()]
        );
    });
}

#[test]
fn held_key_reports_once() {
    let sim = new_sim();
    with_keypad(&sim, Keymap::PHONE, |keypad| {
        press(&sim, 1, 2);
        let first = keypad.on_tick().unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].cell, Cell::at(1, 2).unwrap());
        assert_eq!(first[0].key, KeypadKey::Key8);

        assert!(keypad.on_tick().unwrap().is_empty());
        assert!(keypad.on_tick().unwrap().is_empty());
        assert!(keypad.state().is_pressed(Cell::at(1, 2).unwrap()));

        release(&sim, 1, 2);
        for _ in 0..3 {
            assert!(keypad.on_tick().unwrap().is_empty());
        }
        assert!(keypad.state().is_empty());
    });
}

#[test]
fn each_repress_reports_again() {
    let sim = new_sim();
    with_keypad(&sim, Keymap::PHONE, |keypad| {
        let mut reported = String::new();
        for _ in 0..3 {
            press(&sim, 0, 3);
            reported += &keys(&keypad.on_tick().unwrap());
            reported += &keys(&keypad.on_tick().unwrap());
            release(&sim, 0, 3);
            reported += &keys(&keypad.on_tick().unwrap());
        }
        assert_eq!(reported, "***");
    });
}

#[test]
fn simultaneous_presses_come_in_scan_order() {
    let sim = new_sim();
    with_keypad(&sim, Keymap::PHONE, |keypad| {
        press(&sim, 2, 3);
        press(&sim, 0, 0);
        press(&sim, 1, 1);
        assert_eq!(keys(&keypad.on_tick().unwrap()), "15#");

        press(&sim, 0, 1);
        assert_eq!(keys(&keypad.on_tick().unwrap()), "4");
    });
}

#[test]
fn custom_keymap_is_used() {
    let sim = new_sim();
    let keymap = Keymap::from_chars([
        ['A', 'B', 'C'],
        ['D', '1', '2'],
        ['3', '4', '5'],
        ['6', '7', '8'],
    ])
    .unwrap();
    press(&sim, 1, 0);
    press(&sim, 0, 3);
    with_keypad(&sim, keymap, |keypad| {
        assert_eq!(keys(&keypad.on_tick().unwrap()), "6B");
    });
}

#[test]
fn one_column_driven_at_a_time() {
    let sim = new_sim();
    press(&sim, 0, 0);
    press(&sim, 1, 0);
    press(&sim, 2, 2);
    with_keypad(&sim, Keymap::PHONE, |keypad| {
        sim.clear_journal();
        for _ in 0..3 {
            keypad.on_tick().unwrap();
        }
    });

    let journal = sim.journal();
    let mut low = [false; COLUMNS];
    let mut drives = Vec::new();
    for event in &journal {
        if let (Some(x), SimAccess::Write(state)) =
            (COLUMN_LINES.iter().position(|&l| l == event.line), event.access)
        {
            low[x] = state == Some(false);
            assert!(low.iter().filter(|&&l| l).count() <= 1, "two columns driven at once");
            if low[x] {
                drives.push(x);
            }
        }
    }
    assert_eq!(drives, vec![0, 1, 2, 0, 1, 2, 0, 1, 2]);
    assert_eq!(low, [false; COLUMNS]);
}

#[test]
fn rows_settle_before_sampling() {
    let sim = new_sim();
    with_keypad(&sim, Keymap::PHONE, |keypad| {
        sim.clear_journal();
        keypad.on_tick().unwrap();
    });

    let journal = sim.journal();
    let mut last_change = None;
    let mut reads_after_change = 0;
    for event in &journal {
        match event.access {
            SimAccess::Write(_) if is_column(event.line) => {
                if let Some(changed) = last_change {
                    assert!(event.at.duration_since(changed) >= SETTLE_DELAY);
                }
                last_change = Some(event.at);
            }
            SimAccess::Read(_) => {
                let changed = last_change.expect("row read before any column was driven");
                assert!(event.at.duration_since(changed) >= SETTLE_DELAY);
                reads_after_change += 1;
            }
            SimAccess::Write(_) => {}
        }
    }
    assert_eq!(reads_after_change, COLUMNS * ROWS);
}

#[test]
fn failed_read_aborts_cycle_and_releases_column() {
    let sim = new_sim();
    with_keypad(&sim, Keymap::PHONE, |keypad| {
        assert!(keypad.on_tick().unwrap().is_empty());

        press(&sim, 1, 2);
        // Row 2 is read once for column 0, then fails while column 1 is driven.
        sim.fail_line_after(ROW_LINES[2], 1, ErrorKind::BrokenPipe).unwrap();
        sim.clear_journal();
        let err = keypad.on_tick().unwrap_err();
        assert_eq!(err, GpioError::Io(ErrorKind::BrokenPipe));

        for line in COLUMN_LINES {
            assert_ne!(sim.mode(line), Some(SimLineMode::Output(Some(false))));
        }
        let last_write = sim
            .journal()
            .iter()
            .rev()
            .find(|e| matches!(e.access, SimAccess::Write(_)))
            .map(|e| (e.line, e.access));
        assert_eq!(last_write, Some((COLUMN_LINES[1], SimAccess::Write(None))));
        assert!(keypad.state().is_empty(), "aborted cycle must not touch the state");
        assert_eq!(keypad.cycles(), 1);

        sim.clear_fault(ROW_LINES[2]);
        let presses = keypad.on_tick().unwrap();
        assert_eq!(keys(&presses), "8");
        assert_eq!(keypad.cycles(), 2);
    });
}

#[test]
fn failed_drive_is_reported_and_released() {
    let sim = new_sim();
    with_keypad(&sim, Keymap::PHONE, |keypad| {
        // Both the drive and the release attempt fail, the column never leaves its released state.
        sim.fail_line(COLUMN_LINES[0], ErrorKind::PermissionDenied).unwrap();
        assert_eq!(keypad.on_tick().unwrap_err(), GpioError::Io(ErrorKind::PermissionDenied));
        sim.clear_fault(COLUMN_LINES[0]);
        for line in COLUMN_LINES {
            assert_ne!(sim.mode(line), Some(SimLineMode::Output(Some(false))));
        }
        assert!(keypad.on_tick().is_ok());
    });
}

#[test]
fn presses_reach_channel_sink() {
    let sim = new_sim();
    let (tx, rx) = mpsc::channel::<KeyPress<KeypadKey>>();
    with_keypad(&sim, Keymap::PHONE, |keypad| {
        let mut tx = tx;
        press(&sim, 2, 0);
        assert_eq!(keypad.tick_into(&mut tx).unwrap(), 1);
        assert_eq!(keypad.tick_into(&mut tx).unwrap(), 0);
    });
    let received: Vec<_> = rx.try_iter().collect();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].key, KeypadKey::Key3);
    assert_eq!(received[0].to_string(), "3 at (2,0)");
}

#[test]
fn keypads_are_independent() {
    let left = new_sim();
    let right = new_sim();
    press(&left, 0, 0);
    with_keypad(&left, Keymap::PHONE, |a| {
        with_keypad(&right, Keymap::PHONE, |b| {
            assert_eq!(keys(&a.on_tick().unwrap()), "1");
            assert!(b.on_tick().unwrap().is_empty());
            press(&right, 0, 0);
            assert_eq!(keys(&b.on_tick().unwrap()), "1");
            assert!(a.on_tick().unwrap().is_empty());
        });
    });
}
