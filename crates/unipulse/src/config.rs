//! Resolve CLI flags against the shared config into a ready session.
//!
//! Flags win over the active profile, the profile wins over `[defaults]`.
//! With `--input` no store is contacted; the recorded response answers
//! every query.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use tracing::debug;

use unipulse_api::{ColumnarResponse, QueryClient};
use unipulse_config::{Config, Profile, SITE_TAG, load_config_from, profile_to_connection};
use unipulse_core::{
    CoreError, Dashboard, EntityKeySpec, Scope, StaticSource, TelemetrySource,
};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

// ── Config file ──────────────────────────────────────────────────────

/// `--config`, or the platform default path.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(unipulse_config::config_path)
}

/// Load and validate the config the flags point at.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    Ok(load_config_from(&config_path(global))?)
}

// ── Presentation settings ────────────────────────────────────────────

/// How results are printed.
#[derive(Debug, Clone, Copy)]
pub struct Presentation {
    pub format: OutputFormat,
    pub color: bool,
    pub quiet: bool,
}

impl Presentation {
    pub fn resolve(global: &GlobalOpts, cfg: &Config) -> Result<Self, CliError> {
        let format = match global.output {
            Some(format) => format,
            None => OutputFormat::from_str(&cfg.defaults.output, true).map_err(|_| {
                CliError::Validation {
                    field: "defaults.output".into(),
                    reason: format!("unknown output format '{}'", cfg.defaults.output),
                }
            })?,
        };
        Ok(Self {
            format,
            color: output::should_color(global.color),
            quiet: global.quiet,
        })
    }

    pub fn print(&self, rendered: &str) {
        output::print_output(rendered, self.quiet);
    }
}

/// The lookback to use: the flag, else `defaults.range`.
pub fn range(requested: Option<&str>, cfg: &Config) -> String {
    requested.map_or_else(|| cfg.defaults.range.clone(), ToOwned::to_owned)
}

/// Build a query scope, restricted to the site when one is configured.
pub fn scope(measurement: &str, by: &[String], site: Option<&str>) -> Scope {
    let key = match by {
        [tag] => EntityKeySpec::single(tag.clone()),
        tags => EntityKeySpec::composite(tags.iter().cloned()),
    };
    let scope = Scope::new(measurement, key);
    match site {
        Some(site) => scope.filter(SITE_TAG, site),
        None => scope,
    }
}

// ── Telemetry source ─────────────────────────────────────────────────

/// Where query results come from.
pub enum Source {
    Live(QueryClient),
    Recorded(StaticSource),
}

impl TelemetrySource for Source {
    fn query(
        &self,
        statement: &str,
    ) -> impl Future<Output = Result<ColumnarResponse, unipulse_api::Error>> + Send {
        async move {
            match self {
                Self::Live(client) => client.query(statement).await,
                Self::Recorded(recorded) => recorded.query(statement).await,
            }
        }
    }
}

/// A dashboard plus the context needed to explain its failures.
pub struct Session {
    pub dashboard: Dashboard<Source>,
    pub site: Option<String>,
    url: String,
    profile: String,
}

impl Session {
    /// Open a session from flags and config.
    pub fn open(global: &GlobalOpts, cfg: &Config) -> Result<Self, CliError> {
        let profile_name = cfg.active_profile_name(global.profile.as_deref()).to_owned();

        let (source, site, url) = if let Some(ref path) = global.input {
            debug!(path = %path.display(), "replaying recorded response");
            let body = std::fs::read_to_string(path)?;
            let response: ColumnarResponse = serde_json::from_str(&body)?;
            let site = global
                .site
                .clone()
                .or_else(|| cfg.profiles.get(&profile_name).and_then(|p| p.site.clone()));
            (
                Source::Recorded(StaticSource::new(response)),
                site,
                path.display().to_string(),
            )
        } else {
            let profile = resolve_profile(global, cfg, &profile_name)?;
            let conn = profile_to_connection(&profile, &profile_name, &cfg.defaults)?;
            let url = conn.url.to_string();
            let site = conn.site.clone();
            debug!(%url, db = %conn.database, profile = %profile_name, "connecting");
            (Source::Live(conn.into_client()?), site, url)
        };

        let dashboard = Dashboard::new(source)
            .with_intervals(cfg.interval_table()?)
            .with_vap_fields(cfg.fields.vaps.clone())?;

        Ok(Self {
            dashboard,
            site,
            url,
            profile: profile_name,
        })
    }

    /// Attach connection context to a core failure.
    pub fn fail(&self, err: CoreError) -> CliError {
        CliError::from_core(err, &self.url, &self.profile)
    }
}

/// The active profile with flag overrides applied.
///
/// Without a matching profile, `--url` alone is enough to reach an open store.
fn resolve_profile(global: &GlobalOpts, cfg: &Config, name: &str) -> Result<Profile, CliError> {
    let mut profile = match (cfg.profiles.get(name), global.url.as_deref()) {
        (Some(profile), _) => profile.clone(),
        (None, Some(url)) => Profile::new(url),
        (None, None) if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: name.into(),
                available: available_profiles(cfg),
            });
        }
        (None, None) => {
            return Err(CliError::NoConfig {
                path: config_path(global).display().to_string(),
            });
        }
    };

    if let Some(ref url) = global.url {
        profile.url.clone_from(url);
    }
    if let Some(ref database) = global.database {
        profile.database.clone_from(database);
    }
    if global.site.is_some() {
        profile.site.clone_from(&global.site);
    }
    if global.insecure {
        profile.insecure = Some(true);
    }
    if let Some(secs) = global.timeout {
        profile.timeout = Some(secs);
    }
    Ok(profile)
}

fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        "(none)".into()
    } else {
        cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Request timeout for display.
pub fn timeout_for(profile: &Profile, cfg: &Config) -> Duration {
    Duration::from_secs(profile.timeout.unwrap_or(cfg.defaults.timeout))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::Parser;

    use crate::cli::Cli;

    fn global(args: &[&str]) -> GlobalOpts {
        let mut argv = vec!["unipulse"];
        argv.extend_from_slice(args);
        argv.push("ssids");
        Cli::parse_from(argv).global
    }

    fn with_profile() -> Config {
        let mut cfg = Config::default();
        let mut home = Profile::new("http://influx.lan:8086");
        home.site = Some("Main".into());
        cfg.profiles.insert("default".into(), home);
        cfg
    }

    #[test]
    fn flags_override_profile() {
        let cfg = with_profile();
        let g = global(&["--database", "telegraf", "--site", "Branch", "-k", "--timeout", "3"]);
        let profile = resolve_profile(&g, &cfg, "default").unwrap();
        assert_eq!(profile.url, "http://influx.lan:8086");
        assert_eq!(profile.database, "telegraf");
        assert_eq!(profile.site.as_deref(), Some("Branch"));
        assert_eq!(profile.insecure, Some(true));
        assert_eq!(timeout_for(&profile, &cfg), Duration::from_secs(3));
    }

    #[test]
    fn url_alone_is_enough_without_profiles() {
        let g = global(&["--url", "http://10.0.0.2:8086"]);
        let profile = resolve_profile(&g, &Config::default(), "default").unwrap();
        assert_eq!(profile.url, "http://10.0.0.2:8086");
        assert_eq!(profile.database, "unifi");
    }

    #[test]
    fn missing_profile_is_reported() {
        let cfg = with_profile();
        let g = global(&["--profile", "lab"]);
        let err = resolve_profile(&g, &cfg, "lab").unwrap_err();
        match err {
            CliError::ProfileNotFound { name, available } => {
                assert_eq!(name, "lab");
                assert_eq!(available, "default");
            }
            other => panic!("unexpected {other:?}"),
        }

        let err = resolve_profile(&global(&[]), &Config::default(), "default").unwrap_err();
        assert!(matches!(err, CliError::NoConfig { .. }));
    }

    #[test]
    fn output_falls_back_to_config() {
        let mut cfg = Config::default();
        cfg.defaults.output = "yaml".into();
        let p = Presentation::resolve(&global(&[]), &cfg).unwrap();
        assert_eq!(p.format, OutputFormat::Yaml);

        let p = Presentation::resolve(&global(&["-o", "json"]), &cfg).unwrap();
        assert_eq!(p.format, OutputFormat::Json);

        cfg.defaults.output = "xml".into();
        assert!(Presentation::resolve(&global(&[]), &cfg).is_err());
    }

    #[test]
    fn composite_scope_from_repeated_tags() {
        let s = scope("usw_ports", &["device_name".into(), "port_idx".into()], Some("Main"));
        assert_eq!(
            s.key,
            EntityKeySpec::composite(["device_name", "port_idx"])
        );
        assert_eq!(s.filter, Some((SITE_TAG.to_owned(), "Main".to_owned())));

        let s = scope("clients", &["mac".into()], None);
        assert_eq!(s.key, EntityKeySpec::single("mac"));
        assert!(s.filter.is_none());
    }
}
