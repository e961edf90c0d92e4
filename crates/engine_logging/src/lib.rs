#![deny(missing_docs)]
//! Shared logging utilities for the article import workspace.
//!
//! This crate provides the `engine_*` logging macros used across the codebase,
//! a per-thread feed item context that prefixes every line, and a minimal test
//! initializer for the global logger.

use std::cell::RefCell;

#[doc(hidden)]
pub use log;

thread_local! {
    /// Label of the feed item currently being processed on this thread.
    static ITEM_CONTEXT: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Guard that tags log lines emitted on the current thread with an item label.
///
/// The previous label is restored when the guard drops, so scopes nest.
#[must_use = "the item context is cleared as soon as the guard is dropped"]
pub struct ItemScope {
    previous: Option<String>,
}

impl ItemScope {
    /// Sets `label` as the item context for the current thread.
    pub fn enter(label: impl Into<String>) -> Self {
        let label = label.into();
        let previous = ITEM_CONTEXT.with(|ctx| ctx.borrow_mut().replace(label));
        Self { previous }
    }
}

impl Drop for ItemScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        ITEM_CONTEXT.with(|ctx| *ctx.borrow_mut() = previous);
    }
}

/// Prefix prepended to log lines by the `engine_*` macros.
#[doc(hidden)]
pub fn item_prefix() -> String {
    ITEM_CONTEXT.with(|ctx| match ctx.borrow().as_deref() {
        Some(label) => format!("[{label}] "),
        None => String::new(),
    })
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! engine_trace {
    ($($arg:tt)*) => {{
        $crate::log::trace!("{}{}", $crate::item_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! engine_info {
    ($($arg:tt)*) => {{
        $crate::log::info!("{}{}", $crate::item_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! engine_debug {
    ($($arg:tt)*) => {{
        $crate::log::debug!("{}{}", $crate::item_prefix(), format_args!($($arg)*));
    }};
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! engine_warn {
    ($($arg:tt)*) => {{
        $crate::log::warn!("{}{}", $crate::item_prefix(), format_args!($($arg)*));
    }};
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! engine_error {
    ($($arg:tt)*) => {{
        $crate::log::error!("{}{}", $crate::item_prefix(), format_args!($($arg)*));
    }};
}

/// Initializes a simple terminal logger for use in unit tests.
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
