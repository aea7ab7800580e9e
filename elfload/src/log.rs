//! Severity-tagged logging to standard error.
use std::{
    io::Write,
    sync::atomic::{AtomicBool, AtomicU8, Ordering},
};

static MIN_SEVERITY: AtomicU8 = AtomicU8::new(Severity::Warn as u8);
static COLOR: AtomicBool = AtomicBool::new(false);

/// Set the least severe level that still gets written.
#[inline]
pub fn set_min_severity(severity: Severity) {
    MIN_SEVERITY.store(severity as u8, Ordering::Release);
}

#[inline]
pub fn set_color(enable: bool) {
    COLOR.store(enable, Ordering::Release);
}

#[must_use]
#[inline]
pub fn enabled(severity: Severity) -> bool {
    severity as u8 >= MIN_SEVERITY.load(Ordering::Acquire)
}

pub fn log(severity: Severity, args: core::fmt::Arguments) {
    if !enabled(severity) {
        return;
    }

    let mut stderr = std::io::stderr().lock();
    // A closed stderr leaves nowhere to report the failure.
    let _ = if COLOR.load(Ordering::Acquire) {
        writeln!(
            stderr,
            "[{}{}\x1b[0m] {}",
            severity.color(),
            severity.as_str(),
            args
        )
    } else {
        writeln!(stderr, "[{}] {}", severity.as_str(), args)
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Severity {
    Debug,
    Info,
    Warn,
    Error,
}

impl Severity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO ",
            Self::Warn => "WARN ",
            Self::Error => "ERROR",
        }
    }

    /// ANSI escape selecting the foreground color of the level tag.
    #[must_use]
    pub const fn color(self) -> &'static str {
        match self {
            Self::Debug => "\x1b[34m",
            Self::Info => "\x1b[32m",
            Self::Warn => "\x1b[33m",
            Self::Error => "\x1b[31m",
        }
    }
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::log::log($crate::log::Severity::Debug, format_args!($($arg)*));
    };
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::log::log($crate::log::Severity::Info, format_args!($($arg)*));
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::log::log($crate::log::Severity::Warn, format_args!($($arg)*));
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::log::log($crate::log::Severity::Error, format_args!($($arg)*));
    };
}
