//! Shared configuration for unipulse.
//!
//! TOML profiles layered under environment variables, credential resolution
//! (env + plaintext), and translation to a ready-to-use
//! [`unipulse_api::QueryClient`]. Tunables that feed query construction
//! (interval overrides, VAP field map) are validated here with the same
//! grammar the query builder enforces, so a bad config never reaches the
//! store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

use unipulse_api::{Credentials, QueryClient, TlsMode, TransportConfig};
use unipulse_core::query::safety::validate_time_range;
use unipulse_core::{IntervalTable, ValidationError, VapFieldMap};

/// Prefix for environment overrides. Nested keys use `__`, e.g.
/// `UNIPULSE_DEFAULTS__RANGE=7d`.
pub const ENV_PREFIX: &str = "UNIPULSE_";

/// Environment variable consulted for the store password.
pub const PASSWORD_ENV: &str = "UNIPULSE_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found in config")]
    UnknownProfile { name: String },

    #[error("no password configured for user '{username}' in profile '{profile}'")]
    NoCredentials { profile: String, username: String },

    #[error("failed to build query client: {0}")]
    Client(#[from] unipulse_api::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn token(field: impl Into<String>, err: &ValidationError) -> Self {
        Self::Validation {
            field: field.into(),
            reason: err.to_string(),
        }
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named store profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,

    /// Lookback → bucket width overrides merged over the built-in table.
    #[serde(default)]
    pub intervals: BTreeMap<String, String>,

    /// Per-measurement field mappings.
    #[serde(default)]
    pub fields: Fields,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
            intervals: BTreeMap::new(),
            fields: Fields::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    /// Lookback used when a command is given no `--range`.
    #[serde(default = "default_range")]
    pub range: String,

    #[serde(default = "default_timeout")]
    pub timeout: u64,

    #[serde(default)]
    pub include_idle_ssids: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            range: default_range(),
            timeout: default_timeout(),
            include_idle_ssids: false,
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_range() -> String {
    "24h".into()
}
fn default_timeout() -> u64 {
    30
}

/// Field mappings, one table per source measurement family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Fields {
    #[serde(default)]
    pub vaps: VapFieldMap,
}

/// A named telemetry store profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Profile {
    /// Store base URL (e.g., "http://192.168.1.10:8086").
    pub url: String,

    #[serde(default = "default_database")]
    pub database: String,

    /// Restrict every query to one site (`site_name` tag).
    pub site: Option<String>,

    pub username: Option<String>,

    /// Password (plaintext; prefer `password_env`).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Accept invalid TLS certificates.
    pub insecure: Option<bool>,

    /// Override the default timeout (seconds).
    pub timeout: Option<u64>,
}

fn default_database() -> String {
    "unifi".into()
}

impl Profile {
    /// A profile for `url` with every other setting defaulted.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: default_database(),
            site: None,
            username: None,
            password: None,
            password_env: None,
            ca_cert: None,
            insecure: None,
            timeout: None,
        }
    }
}

impl Config {
    /// Profile name to use: explicit override, then `default_profile`, then
    /// `"default"`.
    pub fn active_profile_name<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .or(self.default_profile.as_deref())
            .unwrap_or("default")
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }

    /// Check every token that ends up inside a query.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_time_range(&self.defaults.range)
            .map_err(|e| ConfigError::token("defaults.range", &e))?;
        self.interval_table()?;
        self.fields
            .vaps
            .validate()
            .map_err(|e| ConfigError::token("fields.vaps", &e))?;
        for (name, profile) in &self.profiles {
            if profile.database.trim().is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("profiles.{name}.database"),
                    reason: "must not be empty".into(),
                });
            }
        }
        Ok(())
    }

    /// Built-in intervals with `[intervals]` overrides applied.
    pub fn interval_table(&self) -> Result<IntervalTable, ConfigError> {
        self.intervals
            .iter()
            .try_fold(IntervalTable::default(), |table, (range, interval)| {
                table
                    .with_override(range, interval)
                    .map_err(|e| ConfigError::token(format!("intervals.{range}"), &e))
            })
    }
}

/// Tag that holds the site name in every measurement.
pub const SITE_TAG: &str = "site_name";

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "unipulse", "unipulse").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("unipulse");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load defaults ← `path` ← environment, then validate.
///
/// A missing file is not an error; the defaults and environment still apply.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

/// Read `path` over the defaults without environment overrides.
///
/// Used when the result is written back, so env values never leak into
/// the file.
pub fn read_config_file(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .extract()?;
    config.validate()?;
    Ok(config)
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML at `path`, creating parent directories.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the store password: `password_env` → `UNIPULSE_PASSWORD` →
/// plaintext `password`.
pub fn resolve_password(profile: &Profile) -> Option<SecretString> {
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }
    if let Ok(val) = std::env::var(PASSWORD_ENV) {
        return Some(SecretString::from(val));
    }
    profile.password.clone().map(SecretString::from)
}

/// Basic-auth credentials for a profile, or `None` for an open store.
pub fn resolve_credentials(
    profile: &Profile,
    profile_name: &str,
) -> Result<Option<Credentials>, ConfigError> {
    let Some(username) = profile.username.clone() else {
        return Ok(None);
    };
    let password = resolve_password(profile).ok_or_else(|| ConfigError::NoCredentials {
        profile: profile_name.into(),
        username: username.clone(),
    })?;
    Ok(Some(Credentials { username, password }))
}

// ── Connection settings ─────────────────────────────────────────────

/// Everything needed to reach one store.
#[derive(Debug, Clone)]
pub struct Connection {
    pub url: Url,
    pub database: String,
    pub site: Option<String>,
    pub credentials: Option<Credentials>,
    pub transport: TransportConfig,
}

impl Connection {
    pub fn into_client(self) -> Result<QueryClient, ConfigError> {
        Ok(QueryClient::new(
            self.url,
            self.database,
            self.credentials,
            &self.transport,
        )?)
    }
}

/// Parse a store URL.
pub fn parse_url(raw: &str) -> Result<Url, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Validation {
        field: "url".into(),
        reason: format!("invalid URL: {raw}"),
    })
}

/// Build connection settings from a profile, no CLI overrides.
pub fn profile_to_connection(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<Connection, ConfigError> {
    let url = parse_url(&profile.url)?;
    let credentials = resolve_credentials(profile, profile_name)?;

    let tls = if profile.insecure.unwrap_or(false) {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::System
    };
    let timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));

    Ok(Connection {
        url,
        database: profile.database.clone(),
        site: profile.site.clone(),
        credentials,
        transport: TransportConfig { tls, timeout },
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    const SAMPLE: &str = r#"
        default_profile = "home"

        [defaults]
        range = "7d"
        output = "json"

        [profiles.home]
        url = "http://influx.lan:8086"
        username = "grafana"
        password = "hunter2"
        site = "Main Office"

        [profiles.lab]
        url = "https://lab.example:8086"
        database = "lab"
        insecure = true
        timeout = 5

        [intervals]
        "1h" = "1m"
        "60d" = "12h"

        [fields.vaps]
        signal = "avg_client_rssi"
    "#;

    #[test]
    fn loads_file_and_fills_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", SAMPLE)?;
            let cfg = load_config_from(Path::new("config.toml")).map_err(|e| e.to_string())?;

            assert_eq!(cfg.active_profile_name(None), "home");
            assert_eq!(cfg.active_profile_name(Some("lab")), "lab");
            assert_eq!(cfg.defaults.range, "7d");
            assert_eq!(cfg.defaults.timeout, 30);

            let home = cfg.profile("home").unwrap();
            assert_eq!(home.database, "unifi");
            assert_eq!(home.site.as_deref(), Some("Main Office"));

            assert_eq!(cfg.fields.vaps.signal, "avg_client_rssi");
            assert_eq!(cfg.fields.vaps.measurement, "uap_vaps");

            let table = cfg.interval_table().unwrap();
            assert_eq!(table.interval_for("1h"), "1m");
            assert_eq!(table.interval_for("60d"), "12h");
            assert_eq!(table.interval_for("24h"), "30m");
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", SAMPLE)?;
            jail.set_env("UNIPULSE_DEFAULTS__RANGE", "1h");
            jail.set_env("UNIPULSE_DEFAULT_PROFILE", "lab");
            let cfg = load_config_from(Path::new("config.toml")).map_err(|e| e.to_string())?;
            assert_eq!(cfg.defaults.range, "1h");
            assert_eq!(cfg.active_profile_name(None), "lab");
            Ok(())
        });
    }

    #[test]
    fn file_only_read_ignores_environment() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", SAMPLE)?;
            jail.set_env("UNIPULSE_DEFAULTS__RANGE", "1h");
            let cfg = read_config_file(Path::new("config.toml")).map_err(|e| e.to_string())?;
            assert_eq!(cfg.defaults.range, "7d");
            Ok(())
        });
    }

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|_| {
            let cfg = load_config_from(Path::new("nope.toml")).map_err(|e| e.to_string())?;
            assert_eq!(cfg, Config::default());
            Ok(())
        });
    }

    #[test]
    fn invalid_tokens_are_rejected_at_load() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", "[intervals]\n\"1h\" = \"30s\"\n")?;
            let err = load_config_from(Path::new("config.toml")).unwrap_err();
            assert!(
                matches!(&err, ConfigError::Validation { field, .. } if field == "intervals.1h"),
                "{err}"
            );

            jail.create_file("config.toml", "[defaults]\nrange = \"1h; DROP\"\n")?;
            let err = load_config_from(Path::new("config.toml")).unwrap_err();
            assert!(matches!(&err, ConfigError::Validation { field, .. } if field == "defaults.range"));

            jail.create_file("config.toml", "[fields.vaps]\nessid = \"ssid name\"\n")?;
            let err = load_config_from(Path::new("config.toml")).unwrap_err();
            assert!(err.to_string().contains("ssid name"));
            Ok(())
        });
    }

    #[test]
    fn save_then_load_preserves_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.profiles
            .insert("default".into(), Profile::new("http://127.0.0.1:8086"));
        cfg.intervals.insert("3h".into(), "3m".into());
        save_config_to(&cfg, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("[profiles.default]"));

        let loaded: Config = toml::from_str(&text).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn password_chain_prefers_named_env() {
        Jail::expect_with(|jail| {
            let mut profile = Profile::new("http://x");
            profile.username = Some("reader".into());
            profile.password = Some("plain".into());
            profile.password_env = Some("HOME_STORE_PW".into());

            let creds = resolve_credentials(&profile, "home").unwrap().unwrap();
            assert_eq!(creds.password.expose_secret(), "plain");

            jail.set_env(PASSWORD_ENV, "shared");
            let creds = resolve_credentials(&profile, "home").unwrap().unwrap();
            assert_eq!(creds.password.expose_secret(), "shared");

            jail.set_env("HOME_STORE_PW", "specific");
            let creds = resolve_credentials(&profile, "home").unwrap().unwrap();
            assert_eq!(creds.username, "reader");
            assert_eq!(creds.password.expose_secret(), "specific");
            Ok(())
        });
    }

    #[test]
    fn username_without_password_is_an_error() {
        Jail::expect_with(|_| {
            let mut profile = Profile::new("http://x");
            assert!(resolve_credentials(&profile, "p").unwrap().is_none());

            profile.username = Some("reader".into());
            let err = resolve_credentials(&profile, "p").unwrap_err();
            assert!(matches!(err, ConfigError::NoCredentials { .. }));
            Ok(())
        });
    }

    #[test]
    fn connection_from_profile() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", SAMPLE)?;
            let cfg = load_config_from(Path::new("config.toml")).map_err(|e| e.to_string())?;

            let lab = profile_to_connection(cfg.profile("lab").unwrap(), "lab", &cfg.defaults).unwrap();
            assert_eq!(lab.url.as_str(), "https://lab.example:8086/");
            assert_eq!(lab.database, "lab");
            assert!(matches!(lab.transport.tls, TlsMode::DangerAcceptInvalid));
            assert_eq!(lab.transport.timeout, Duration::from_secs(5));
            assert!(lab.credentials.is_none());

            let home = profile_to_connection(cfg.profile("home").unwrap(), "home", &cfg.defaults).unwrap();
            assert!(matches!(home.transport.tls, TlsMode::System));
            assert_eq!(home.transport.timeout, Duration::from_secs(30));
            assert_eq!(home.credentials.unwrap().username, "grafana");

            let err = profile_to_connection(&Profile::new("not a url"), "x", &cfg.defaults).unwrap_err();
            assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "url"));
            assert!(matches!(
                cfg.profile("missing"),
                Err(ConfigError::UnknownProfile { .. })
            ));
            Ok(())
        });
    }
}
