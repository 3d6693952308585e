//! Logging macros used by every generator stage.
//!
//! With the `logging` feature they expand to the matching `tracing` macro;
//! without it they expand to nothing, so the library carries no subscriber
//! dependency.
//!
//! Levels used by the pipeline:
//!
//! | Level | Events |
//! |-------|--------|
//! | trace | entity registration, each entity the closure marks, each extension enum value, each planned helper |
//! | debug | registry resolved, features and extensions included, records ordered, plan built, artifacts staged |
//! | info  | registry loaded, generation finished, artifacts written, routines verified |
//! | warn  | every [`Diagnostic`](crate::Diagnostic) as it is reported |
//!
//! Fatal conditions are not logged here; they propagate as
//! [`Error`](crate::Error) and the binary reports them.
//!
//! # Example
//!
//! ```rust,ignore
//! use crate::logging::{debug, warn};
//!
//! debug!(functions = count, "selected required functions");
//! warn!(record = %name, "member shape not converted");
//! ```

/// Per-entity detail: registrations, closure steps.
#[cfg(feature = "logging")]
macro_rules! log_trace {
    ($($arg:tt)*) => { tracing::trace!($($arg)*) }
}

#[cfg(not(feature = "logging"))]
macro_rules! log_trace {
    ($($arg:tt)*) => {};
}

/// Per-stage summaries.
#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) }
}

#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {};
}

/// Run lifecycle: registry loaded, files written.
#[cfg(feature = "logging")]
macro_rules! log_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) }
}

#[cfg(not(feature = "logging"))]
macro_rules! log_info {
    ($($arg:tt)*) => {};
}

/// Tolerated registry defects and unsupported shapes.
#[cfg(feature = "logging")]
macro_rules! log_warn {
    ($($arg:tt)*) => { tracing::warn!($($arg)*) }
}

#[cfg(not(feature = "logging"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {};
}

pub(crate) use log_debug as debug;
pub(crate) use log_info as info;
pub(crate) use log_trace as trace;
pub(crate) use log_warn as warn;
