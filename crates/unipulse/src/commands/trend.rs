//! `trend`: time-bucketed rate per entity, plus a current/average summary.

use chrono::DateTime;

use unipulse_config::Config;
use unipulse_core::timeseries::entity_field;
use unipulse_core::{Timestamp, Trend};

use crate::cli::TrendArgs;
use crate::config::{self, Presentation, Session};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    session: &Session,
    args: &TrendArgs,
    cfg: &Config,
    out: Presentation,
) -> Result<(), CliError> {
    let range = config::range(args.range.range.as_deref(), cfg);
    let scope = config::scope(&args.measurement, &args.by, session.site.as_deref());

    let (trend, columns) = match args.counter {
        Some(ref counter) => (
            session.dashboard.counter_trend(&scope, counter, &range).await,
            vec![counter.clone()],
        ),
        None => (
            session.dashboard.rate_trend(&scope, args.columns.as_slice(), &range).await,
            args.columns.clone(),
        ),
    };
    let trend = trend.map_err(|e| session.fail(e))?;

    let rendered = output::render_single(
        out.format,
        &trend,
        |t| detail(t, &columns, out.color),
        |t| plain(t, &columns),
    );
    out.print(&rendered);
    Ok(())
}

/// Chart fields in entity-major order.
fn fields(trend: &Trend, columns: &[String]) -> Vec<String> {
    trend
        .merged
        .entities
        .iter()
        .flat_map(|entity| columns.iter().map(move |c| entity_field(entity, c)))
        .collect()
}

fn fmt_time(time: &Timestamp) -> String {
    time.epoch_millis()
        .and_then(DateTime::from_timestamp_millis)
        .map_or_else(|| time.to_string(), |dt| dt.format("%Y-%m-%d %H:%M").to_string())
}

fn detail(trend: &Trend, columns: &[String], color: bool) -> String {
    if trend.merged.points.is_empty() {
        return "No data in range".into();
    }
    let fields = fields(trend, columns);

    let mut header = vec!["Time".to_owned()];
    header.extend(fields.iter().cloned());
    let rows = trend
        .merged
        .points
        .iter()
        .map(|p| {
            let mut row = vec![fmt_time(&p.time)];
            row.extend(fields.iter().map(|f| {
                p.get(f)
                    .map_or_else(|| output::missing(color), output::fmt_rate)
            }));
            row
        })
        .collect();
    let chart = output::render_dynamic_table(header, rows);

    let summary_rows = trend
        .summary
        .iter()
        .map(|(column, s)| {
            vec![
                column.clone(),
                output::fmt_rate(s.current),
                output::fmt_rate(s.average),
                s.entities.to_string(),
            ]
        })
        .collect();
    let summary = output::render_dynamic_table(
        ["Column", "Current", "Average", "Entities"]
            .map(str::to_owned)
            .to_vec(),
        summary_rows,
    );

    format!(
        "{}\n{chart}\n\n{}\n{summary}",
        output::heading(&format!("Interval {}", trend.interval), color),
        output::heading("Summary", color),
    )
}

/// `time field=value ...`, one bucket per line.
fn plain(trend: &Trend, columns: &[String]) -> String {
    let fields = fields(trend, columns);
    trend
        .merged
        .points
        .iter()
        .map(|p| {
            let mut line = p.time.to_string();
            for f in &fields {
                if let Some(v) = p.get(f) {
                    line.push_str(&format!(" {f}={v}"));
                }
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}
