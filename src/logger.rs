//! Console display helpers and history dumps.
//!
//! Run events (progress lines, estimates, the abort notice) go through
//! `tracing`; the pretty schedule tables printed before a run use the ansi
//! helpers here.

use std::{
    fmt::Display,
    fs::File,
    io::{self, BufWriter, Write},
    sync::atomic::{AtomicBool, Ordering::SeqCst},
};

static CBCS: AtomicBool = AtomicBool::new(false);

pub fn ansi<T: Display, U: Display>(x: T, y: U) -> String {
    format!("\x1b[{y}m{x}\x1b[0m{}", esc())
}

pub fn set_cbcs(val: bool) {
    CBCS.store(val, SeqCst)
}

pub fn clear_colours() {
    print!("{}", esc());
}

pub fn num_cs() -> i32 {
    if CBCS.load(SeqCst) {
        35
    } else {
        36
    }
}

fn esc() -> &'static str {
    if CBCS.load(SeqCst) {
        "\x1b[38;5;225m"
    } else {
        ""
    }
}

pub fn seconds_to_hms(mut seconds: u64) -> (u64, u64, u64) {
    let mut minutes = seconds / 60;
    let hours = minutes / 60;
    seconds -= minutes * 60;
    minutes -= hours * 60;

    (hours, minutes, seconds)
}

/// Dump a (progress, value) history as CSV, one pair per line.
pub fn write_history(path: &str, records: &[(f64, f64)]) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for (progress, value) in records {
        writeln!(writer, "{progress},{value}")?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cbcs_toggles_colour_scheme() {
        assert_eq!(num_cs(), 36);
        assert_eq!(ansi(7, num_cs()), "\x1b[36m7\x1b[0m");

        set_cbcs(true);
        assert_eq!(num_cs(), 35);
        assert!(ansi(7, num_cs()).ends_with(esc()));

        set_cbcs(false);
        assert_eq!(num_cs(), 36);
    }

    #[test]
    fn test_seconds_to_hms() {
        assert_eq!(seconds_to_hms(0), (0, 0, 0));
        assert_eq!(seconds_to_hms(59), (0, 0, 59));
        assert_eq!(seconds_to_hms(60), (0, 1, 0));
        assert_eq!(seconds_to_hms(3661), (1, 1, 1));
    }
}
