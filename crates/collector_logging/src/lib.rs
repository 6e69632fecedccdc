#![deny(missing_docs)]
//! Shared logging utilities for the collector workspace.
//!
//! This crate provides the `collector_*` logging macros used across the codebase
//! and a minimal test initializer for the global logger. Every message is prefixed
//! with the session label of the current thread, so interleaved output from
//! several collection sessions stays attributable.

use std::cell::RefCell;

#[doc(hidden)]
pub use log as __log;

thread_local! {
    /// Thread-local label of the collection session running on this thread.
    static SESSION_LABEL: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Sets the session label for the current thread.
/// Collector workers call this once when a session starts; `None` clears it.
pub fn set_session_label(label: Option<&str>) {
    SESSION_LABEL.with(|cell| *cell.borrow_mut() = label.map(ToOwned::to_owned));
}

/// Retrieves the session label for the current thread, if any.
pub fn session_label() -> Option<String> {
    SESSION_LABEL.with(|cell| cell.borrow().clone())
}

/// Returns the `[label] ` prefix used by the logging macros, or an empty string.
#[doc(hidden)]
pub fn session_prefix() -> String {
    SESSION_LABEL.with(|cell| match cell.borrow().as_deref() {
        Some(label) => format!("[{label}] "),
        None => String::new(),
    })
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! collector_trace {
    ($($arg:tt)*) => {{
        $crate::__log::trace!("{}{}", $crate::session_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! collector_debug {
    ($($arg:tt)*) => {{
        $crate::__log::debug!("{}{}", $crate::session_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! collector_info {
    ($($arg:tt)*) => {{
        $crate::__log::info!("{}{}", $crate::session_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! collector_warn {
    ($($arg:tt)*) => {{
        $crate::__log::warn!("{}{}", $crate::session_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! collector_error {
    ($($arg:tt)*) => {{
        $crate::__log::error!("{}{}", $crate::session_prefix(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}
