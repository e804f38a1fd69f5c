//! `query`: print a validated preset statement without sending it.

use serde::Serialize;

use unipulse_config::{Config, SITE_TAG};
use unipulse_core::query::presets::{self, CounterColumns, VAP_SNAPSHOT_RANGE};
use unipulse_core::query::validate_time_range;

use crate::cli::{GlobalOpts, QueryArgs, QueryPreset};
use crate::config::{self, Presentation};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct Statement {
    query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    interval: Option<String>,
}

pub fn handle(
    args: &QueryArgs,
    cfg: &Config,
    global: &GlobalOpts,
    out: Presentation,
) -> Result<(), CliError> {
    let site = global
        .site
        .clone()
        .or_else(|| {
            cfg.profiles
                .get(cfg.active_profile_name(global.profile.as_deref()))
                .and_then(|p| p.site.clone())
        });
    let site = site.as_deref();

    let statement = match &args.preset {
        QueryPreset::Totals {
            scope,
            range,
            name_tag,
        } => {
            let range = config::range(range.range.as_deref(), cfg);
            let scope = config::scope(&scope.measurement, &scope.by, site).carry(name_tag.clone());
            Statement {
                query: presets::window_totals(&scope, &CounterColumns::default(), &range)?,
                interval: None,
            }
        }
        QueryPreset::Rates {
            scope,
            range,
            columns,
        } => {
            let range = config::range(range.range.as_deref(), cfg);
            let interval = bucket_interval(cfg, &range)?;
            let scope = config::scope(&scope.measurement, &scope.by, site);
            Statement {
                query: presets::rate_trend(&scope, columns.as_slice(), &range, &interval)?,
                interval: Some(interval),
            }
        }
        QueryPreset::Counter {
            scope,
            range,
            column,
        } => {
            let range = config::range(range.range.as_deref(), cfg);
            let interval = bucket_interval(cfg, &range)?;
            let scope = config::scope(&scope.measurement, &scope.by, site);
            Statement {
                query: presets::counter_trend(&scope, column, &range, &interval)?,
                interval: Some(interval),
            }
        }
        QueryPreset::Vaps => Statement {
            query: presets::latest_vaps(
                &cfg.fields.vaps,
                VAP_SNAPSHOT_RANGE,
                site.map(|s| (SITE_TAG, s)),
            )?,
            interval: None,
        },
    };

    let rendered = output::render_single(
        out.format,
        &statement,
        |s| s.query.clone(),
        |s| s.query.clone(),
    );
    out.print(&rendered);
    Ok(())
}

fn bucket_interval(cfg: &Config, range: &str) -> Result<String, CliError> {
    let table = cfg.interval_table()?;
    Ok(table.interval_for(validate_time_range(range)?).to_owned())
}
