//! CLI error types with miette diagnostics.
//!
//! Maps core, config and transport failures into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use unipulse_config::ConfigError;
use unipulse_core::{CoreError, ValidationError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the telemetry store at {url}")]
    #[diagnostic(
        code(unipulse::connection_failed),
        help(
            "Check that the store is running and reachable.\n\
             URL: {url}\n\
             Try: unipulse --url http://<host>:8086 traffic"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: unipulse_api::Error,
    },

    #[error("Request timed out")]
    #[diagnostic(
        code(unipulse::timeout),
        help("Increase timeout with --timeout or shorten the --range.")
    )]
    Timeout {
        #[source]
        source: unipulse_api::Error,
    },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed ({status})")]
    #[diagnostic(
        code(unipulse::auth_failed),
        help(
            "Verify the username and password for profile '{profile}'.\n\
             The password is read from password_env, then UNIPULSE_PASSWORD, then the config file."
        )
    )]
    AuthFailed { status: u16, profile: String },

    #[error("No password configured for user '{username}' in profile '{profile}'")]
    #[diagnostic(
        code(unipulse::no_credentials),
        help("Set UNIPULSE_PASSWORD, or add password_env to the profile.")
    )]
    NoCredentials { profile: String, username: String },

    // ── Store ────────────────────────────────────────────────────────
    #[error("Store returned HTTP {status}: {message}")]
    #[diagnostic(code(unipulse::http_status))]
    Status { status: u16, message: String },

    #[error("Store rejected the query: {message}")]
    #[diagnostic(
        code(unipulse::query_rejected),
        help("Run the same command with `unipulse query` to see the statement that was sent.")
    )]
    QueryRejected { message: String },

    #[error("Unreadable response from the store: {message}")]
    #[diagnostic(code(unipulse::bad_response))]
    BadResponse { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(
        code(unipulse::validation),
        help("Ranges look like 15m, 24h or 7d. Names start with a letter or '_' and use only letters, digits, '_' or '-'.")
    )]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(unipulse::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: unipulse config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No store configured")]
    #[diagnostic(
        code(unipulse::no_config),
        help(
            "Create a profile with: unipulse config init\n\
             Or pass --url. Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(unipulse::config))]
    Config(Box<ConfigError>),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON input: {0}")]
    #[diagnostic(
        code(unipulse::json),
        help("--input expects a recorded store response: {{\"results\": [{{\"series\": [...]}}]}}")
    )]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the store URL and profile to a transport failure.
    pub fn from_transport(err: unipulse_api::Error, url: &str, profile: &str) -> Self {
        use unipulse_api::Error as Api;

        if matches!(&err, Api::Transport(e) if e.is_timeout()) {
            return Self::Timeout { source: err };
        }
        let unauthorized = err.is_unauthorized();
        match err {
            Api::Transport(_) | Api::Tls(_) | Api::InvalidUrl(_) => Self::ConnectionFailed {
                url: url.into(),
                source: err,
            },
            Api::Status { status, .. } if unauthorized => Self::AuthFailed {
                status,
                profile: profile.into(),
            },
            Api::Status { status, message } => Self::Status { status, message },
            Api::Query { message } => Self::QueryRejected { message },
            Api::Deserialization { message, .. } => Self::BadResponse { message },
        }
    }

    /// Wrap a core failure with connection context.
    pub fn from_core(err: CoreError, url: &str, profile: &str) -> Self {
        match err {
            CoreError::Validation(v) => v.into(),
            CoreError::Transport(e) => Self::from_transport(e, url, profile),
        }
    }
}

impl From<ValidationError> for CliError {
    fn from(err: ValidationError) -> Self {
        let field = match err {
            ValidationError::TimeRange { .. } => "time range",
            ValidationError::Identifier { .. } => "identifier",
        };
        Self::Validation {
            field: field.into(),
            reason: err.to_string(),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoCredentials { profile, username } => {
                Self::NoCredentials { profile, username }
            }
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config(Box::new(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_usage_errors() {
        let err: CliError = ValidationError::TimeRange {
            token: "1w".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::USAGE);
        assert!(err.to_string().contains("1w"));
    }

    #[test]
    fn unauthorized_status_maps_to_auth() {
        let err = CliError::from_transport(
            unipulse_api::Error::Status {
                status: 401,
                message: "authorization failed".into(),
            },
            "http://x",
            "home",
        );
        assert!(matches!(err, CliError::AuthFailed { status: 401, .. }));
        assert_eq!(err.exit_code(), exit_code::AUTH);
    }

    #[test]
    fn statement_errors_are_general_failures() {
        let err = CliError::from_core(
            CoreError::Transport(unipulse_api::Error::Query {
                message: "measurement not found".into(),
            }),
            "http://x",
            "home",
        );
        assert!(matches!(err, CliError::QueryRejected { .. }));
        assert_eq!(err.exit_code(), exit_code::GENERAL);
    }
}
