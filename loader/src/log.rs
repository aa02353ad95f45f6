//! Console output for the boot pipeline.
//!
//! Provides [`bprint!`] / [`bprintln!`] for raw output and the leveled
//! convenience macros (`binfo!`, `bwarn!`, `berror!`) used for load
//! diagnostics. The actual byte sink is whatever the platform entry crate
//! registers via [`set_print_fn`], a polled UART or a ROM-monitor syscall
//! shim. Before registration, output is silently discarded, which is the
//! right behavior for unit tests and for the first few instructions after
//! reset.

use core::fmt;
use core::sync::atomic::{AtomicPtr, Ordering};

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Something failed; the current load attempt is abandoned.
    Error,
    /// Unexpected but tolerable; the load continues.
    Warn,
    /// High-level progress messages.
    Info,
}

impl LogLevel {
    /// Human-readable prefix.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warning",
            Self::Info => "",
        }
    }
}

/// The signature of the global print function.
pub type PrintFn = fn(fmt::Arguments<'_>);

fn null_print(_args: fmt::Arguments<'_>) {}

static PRINT_FN: AtomicPtr<()> = AtomicPtr::new(null_print as *mut ());

/// Registers the global print function.
///
/// May be called more than once; the last registration wins. Uses `Release`
/// ordering so subsequent loads observe the new function.
pub fn set_print_fn(f: PrintFn) {
    PRINT_FN.store(f as *mut (), Ordering::Release);
}

/// Loads the current print function from the atomic pointer.
#[inline]
fn load_print_fn() -> PrintFn {
    let ptr = PRINT_FN.load(Ordering::Acquire);
    // SAFETY: only valid `PrintFn` pointers (or the initial `null_print`)
    // are ever stored into PRINT_FN.
    unsafe { core::mem::transmute::<*mut (), PrintFn>(ptr) }
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments<'_>) {
    load_print_fn()(args);
}

#[doc(hidden)]
pub fn _log(level: LogLevel, args: fmt::Arguments<'_>) {
    let print = load_print_fn();
    match level {
        LogLevel::Info => print(format_args!("{args}\n")),
        _ => print(format_args!("{}: {args}\n", level.name())),
    }
}

/// Prints to the registered console, without a trailing newline.
#[macro_export]
macro_rules! bprint {
    ($($arg:tt)*) => {
        $crate::log::_print(core::format_args!($($arg)*))
    };
}

/// Prints to the registered console, with a trailing newline.
#[macro_export]
macro_rules! bprintln {
    () => { $crate::bprint!("\n") };
    ($($arg:tt)*) => {
        $crate::log::_print(core::format_args!("{}\n", core::format_args!($($arg)*)))
    };
}

/// Logs a progress message.
#[macro_export]
macro_rules! binfo {
    ($($arg:tt)*) => {
        $crate::log::_log($crate::log::LogLevel::Info, core::format_args!($($arg)*))
    };
}

/// Logs an advisory warning; the operation in progress continues.
#[macro_export]
macro_rules! bwarn {
    ($($arg:tt)*) => {
        $crate::log::_log($crate::log::LogLevel::Warn, core::format_args!($($arg)*))
    };
}

/// Logs a failure diagnostic.
#[macro_export]
macro_rules! berror {
    ($($arg:tt)*) => {
        $crate::log::_log($crate::log::LogLevel::Error, core::format_args!($($arg)*))
    };
}
