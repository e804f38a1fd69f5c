//! Config subcommand handlers.

use serde::Serialize;

use unipulse_config::{Config, Profile, parse_url, read_config_file, save_config_to};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Presentation};
use crate::error::CliError;
use crate::output;

const MASK: &str = "********";

#[derive(Serialize)]
struct Resolved {
    path: String,
    active_profile: String,
    timeout_secs: Option<u64>,
    config: Config,
}

/// Copy of `cfg` with plaintext passwords masked.
fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    for profile in cfg.profiles.values_mut() {
        if profile.password.is_some() {
            profile.password = Some(MASK.into());
        }
    }
    cfg
}

fn detail(r: &Resolved, color: bool) -> String {
    let body = toml::to_string_pretty(&r.config).unwrap_or_default();
    let timeout = r
        .timeout_secs
        .map_or_else(|| output::missing(color), |s| format!("{s}s"));
    format!(
        "{}\nConfig path:    {}\nActive profile: {}\nTimeout:        {timeout}\n\n{body}",
        output::heading("Configuration", color),
        r.path,
        r.active_profile,
    )
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let path = config::config_path(global);

    match args.command {
        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let out = Presentation::resolve(global, &cfg)?;
            let active = cfg.active_profile_name(global.profile.as_deref()).to_owned();
            let timeout_secs = cfg
                .profiles
                .get(&active)
                .map(|p| config::timeout_for(p, &cfg).as_secs());
            let resolved = Resolved {
                path: path.display().to_string(),
                active_profile: active,
                timeout_secs,
                config: redacted(&cfg),
            };
            let rendered = output::render_single(
                out.format,
                &resolved,
                |r| detail(r, out.color),
                |r| r.path.clone(),
            );
            out.print(&rendered);
            Ok(())
        }

        ConfigCommand::Path => {
            output::print_output(&path.display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Init {
            store_url,
            db,
            username,
            password_env,
            force,
        } => {
            parse_url(&store_url)?;
            if db.trim().is_empty() {
                return Err(CliError::Validation {
                    field: "db".into(),
                    reason: "must not be empty".into(),
                });
            }

            let mut cfg = read_config_file(&path)?;
            let name = global.profile.clone().unwrap_or_else(|| "default".into());
            if cfg.profiles.contains_key(&name) && !force {
                return Err(CliError::Validation {
                    field: "profile".into(),
                    reason: format!("profile '{name}' already exists (use --force to replace it)"),
                });
            }

            let mut profile = Profile::new(store_url);
            profile.database = db;
            profile.username = username;
            profile.password_env = password_env;
            profile.site.clone_from(&global.site);
            cfg.profiles.insert(name.clone(), profile);
            if cfg.profiles.len() == 1 {
                cfg.default_profile = Some(name.clone());
            }

            save_config_to(&cfg, &path)?;
            if !global.quiet {
                eprintln!("Saved profile '{name}' to {}", path.display());
            }
            Ok(())
        }
    }
}
