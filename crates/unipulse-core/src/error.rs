// ── Core error types ──
//
// Only two things can go wrong in this crate: a token fails its grammar
// before a query is built, or the injected telemetry source fails. Shape
// irregularities in returned data are never errors; they resolve to
// documented defaults instead.

use thiserror::Error;

/// A user- or config-supplied token failed its grammar check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid time range '{token}': expected an integer followed by m, h or d")]
    TimeRange { token: String },

    #[error(
        "invalid identifier '{token}': expected a letter or underscore followed by letters, digits, '_' or '-'"
    )]
    Identifier { token: String },
}

impl ValidationError {
    /// The offending token, verbatim.
    pub fn token(&self) -> &str {
        match self {
            Self::TimeRange { token } | Self::Identifier { token } => token,
        }
    }
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Rejected before any query string was built.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Telemetry store failure, passed through unmodified.
    #[error(transparent)]
    Transport(#[from] unipulse_api::Error),
}
