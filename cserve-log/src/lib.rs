//! Process-wide leveled logging for cserve.
//!
//! This is the one mutable global the server keeps: a single atomic filter
//! level, initialised once at startup from the resolved `loglevel` option
//! and consulted by every `log!`-family call site thereafter.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// The seven levels from the configuration spec, ordered from loudest to silent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Err = 4,
    Critical = 5,
    Off = 6,
}

impl Level {
    pub fn from_name(s: &str) -> Option<Level> {
        match s {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" => Some(Level::Warn),
            "err" => Some(Level::Err),
            "critical" => Some(Level::Critical),
            "off" => Some(Level::Off),
            _ => None,
        }
    }

    fn color(self) -> &'static str {
        match self {
            Level::Trace => "34",
            Level::Debug => "36",
            Level::Info => "32",
            Level::Warn => "33",
            Level::Err => "31",
            Level::Critical => "35",
            Level::Off => "0",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Level::Trace => "TRACE",
            Level::Debug => "DEBUG",
            Level::Info => "INFO ",
            Level::Warn => "WARN ",
            Level::Err => "ERR  ",
            Level::Critical => "CRIT ",
            Level::Off => "OFF  ",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label().trim())
    }
}

static FILTER: AtomicU8 = AtomicU8::new(Level::Info as u8);

/// Sets the process-wide filter level. Called once, from `main`, after the
/// `loglevel` configuration option has been resolved.
pub fn init(level: Level) {
    FILTER.store(level as u8, Ordering::Relaxed);
}

pub fn enabled(level: Level) -> bool {
    (level as u8) >= FILTER.load(Ordering::Relaxed)
}

pub fn format_time(now: SystemTime) -> String {
    let duration = now.duration_since(UNIX_EPOCH).unwrap_or_default();
    let secs = duration.as_secs();

    let year = 1970 + (secs / 31_557_600);
    let month = ((secs % 31_557_600) / 2_628_000) + 1;
    let day = ((secs % 2_628_000) / 86_400) + 1;
    let hour = (secs % 86_400) / 3600;
    let minute = (secs % 3600) / 60;
    let second = secs % 60;

    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
        year, month, day, hour, minute, second
    )
}

#[doc(hidden)]
pub fn emit(level: Level, args: fmt::Arguments<'_>) {
    if !enabled(level) {
        return;
    }
    let ts = format_time(SystemTime::now());
    eprintln!(
        "[{}] \x1b[38;5;244mcserve\x1b[0m \x1b[{}m{}\x1b[0m: {}",
        ts,
        level.color(),
        level.label(),
        args
    );
}

#[macro_export]
macro_rules! log {
    ($level:expr, $($arg:tt)*) => {
        $crate::emit($level, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! trace { ($($arg:tt)*) => { $crate::log!($crate::Level::Trace, $($arg)*) }; }
#[macro_export]
macro_rules! debug { ($($arg:tt)*) => { $crate::log!($crate::Level::Debug, $($arg)*) }; }
#[macro_export]
macro_rules! info { ($($arg:tt)*) => { $crate::log!($crate::Level::Info, $($arg)*) }; }
#[macro_export]
macro_rules! warn { ($($arg:tt)*) => { $crate::log!($crate::Level::Warn, $($arg)*) }; }
#[macro_export]
macro_rules! err { ($($arg:tt)*) => { $crate::log!($crate::Level::Err, $($arg)*) }; }
#[macro_export]
macro_rules! critical { ($($arg:tt)*) => { $crate::log!($crate::Level::Critical, $($arg)*) }; }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_ordering_is_loudest_to_silent() {
        assert!(Level::Trace < Level::Debug);
        assert!(Level::Critical < Level::Off);
    }

    #[test]
    fn from_name_round_trips_known_levels() {
        for name in ["trace", "debug", "info", "warn", "err", "critical", "off"] {
            assert!(Level::from_name(name).is_some());
        }
        assert!(Level::from_name("bogus").is_none());
    }

    #[test]
    fn init_changes_enabled_threshold() {
        init(Level::Critical);
        assert!(!enabled(Level::Info));
        assert!(enabled(Level::Critical));
        init(Level::Trace);
        assert!(enabled(Level::Info));
    }
}
