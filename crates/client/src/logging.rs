//! Logging macros.
//!
//! The engine logs through these rather than calling `tracing` directly so
//! call sites stay one line; everything ends up in the `tracing` subscriber
//! installed by the host binary.

pub fn log_info_impl(msg: &str) {
    tracing::info!(target: "gupshup_client", "{}", msg);
}

pub fn log_error_impl(msg: &str) {
    tracing::error!(target: "gupshup_client", "{}", msg);
}

pub fn log_warn_impl(msg: &str) {
    tracing::warn!(target: "gupshup_client", "{}", msg);
}

pub fn log_debug_impl(msg: &str) {
    tracing::debug!(target: "gupshup_client", "{}", msg);
}

/// Log an info message
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logging::log_info_impl(&format!($($arg)*))
    };
}

/// Log an error message
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::logging::log_error_impl(&format!($($arg)*))
    };
}

/// Log a warning message
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logging::log_warn_impl(&format!($($arg)*))
    };
}

/// Log a debug message
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::logging::log_debug_impl(&format!($($arg)*))
    };
}

/// Install the default subscriber: `RUST_LOG` if set, else debug for this crate.
pub fn init() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("gupshup_client=debug")),
        )
        .try_init();
}
