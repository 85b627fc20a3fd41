use chrono::Local;
use std::fmt;
use std::sync::OnceLock;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    fn label(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

static DEBUG_ENABLED: OnceLock<bool> = OnceLock::new();

/// Debug lines are only written when `REFMAT_DEBUG` is set in the environment.
pub fn debug_enabled() -> bool {
    *DEBUG_ENABLED.get_or_init(|| std::env::var_os("REFMAT_DEBUG").is_some())
}

pub fn format_line(level: Level, args: fmt::Arguments) -> String {
    let now = Local::now();
    format!("[{}] {} {}", now.format("%Y-%m-%d %H:%M:%S"), level.label(), args)
}

pub fn emit(level: Level, args: fmt::Arguments) {
    match level {
        Level::Debug if !debug_enabled() => {}
        Level::Warn | Level::Error => eprintln!("{}", format_line(level, args)),
        _ => println!("{}", format_line(level, args)),
    }
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::logger::emit($crate::logger::Level::Debug, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::logger::emit($crate::logger::Level::Info, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::logger::emit($crate::logger::Level::Warn, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::logger::emit($crate::logger::Level::Error, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_carries_level_and_message() {
        let line = format_line(Level::Warn, format_args!("skipped {} groups", 3));
        assert!(line.starts_with('['));
        assert!(line.ends_with("WARN skipped 3 groups"));
    }
}
