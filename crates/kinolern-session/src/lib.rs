#![warn(clippy::unwrap_used, clippy::expect_used)]

//! Session controller for interactive recommendation refinement.
//!
//! A [`Session`] owns the round history, the active round and the exclusion
//! set, and talks to a [`RecommendationService`] one request at a time. The
//! presentation layer reads [`Session::view`] and calls the mutation methods;
//! nothing else changes session state.

// Warnings go through `tracing` with the `telemetry` feature, otherwise to stderr.
macro_rules! warn_event {
    ($($arg:tt)*) => {{
        #[cfg(feature = "telemetry")]
        tracing::warn!($($arg)*);
        #[cfg(not(feature = "telemetry"))]
        eprintln!($($arg)*);
    }};
}

// Debug events are dropped without the `telemetry` feature.
macro_rules! debug_event {
    ($($arg:tt)*) => {{
        #[cfg(feature = "telemetry")]
        tracing::debug!($($arg)*);
        #[cfg(not(feature = "telemetry"))]
        {
            let _ = format_args!($($arg)*);
        }
    }};
}

pub mod error;
pub mod service;
mod session;
mod view;

pub use error::{Result, ServiceError, SessionError};
pub use service::{build_api_url, HttpRecommender, RecommendationService, API_URL_ENV, DEFAULT_TIMEOUT};
pub use session::{Operation, PendingCall, RoundSnapshot, Session};
pub use view::SessionView;
