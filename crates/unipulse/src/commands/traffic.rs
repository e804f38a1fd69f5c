//! `traffic`: bytes moved per entity over a window.

use tabled::Tabled;

use unipulse_config::Config;
use unipulse_core::{BandwidthTotal, SortDirection, SortState, TotalsOptions, sort_data};

use crate::cli::TrafficArgs;
use crate::config::{self, Presentation, Session};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct TrafficRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "RX")]
    rx: String,
    #[tabled(rename = "TX")]
    tx: String,
    #[tabled(rename = "Total")]
    total: String,
}

impl From<&BandwidthTotal> for TrafficRow {
    fn from(t: &BandwidthTotal) -> Self {
        Self {
            id: t.id.clone(),
            name: t.name.clone(),
            rx: output::fmt_bytes(t.rx_bytes),
            tx: output::fmt_bytes(t.tx_bytes),
            total: output::fmt_bytes(t.total_bytes),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    session: &Session,
    args: &TrafficArgs,
    cfg: &Config,
    out: Presentation,
) -> Result<(), CliError> {
    let range = config::range(args.range.range.as_deref(), cfg);
    let scope = config::scope(&args.scope.measurement, &args.scope.by, session.site.as_deref());
    let options = TotalsOptions {
        name_tag: Some(args.name_tag.clone()),
        carry_tags: true,
        include_zero: args.include_zero,
    };

    let totals = session
        .dashboard
        .traffic_totals(&scope, &range, &options)
        .await
        .map_err(|e| session.fail(e))?;

    let mut rows = match args.sort.as_deref() {
        // Already total-descending from the aggregator.
        None if !args.asc => totals,
        key => {
            let direction = if args.asc {
                SortDirection::Asc
            } else {
                SortDirection::Desc
            };
            let state = SortState::by(key.unwrap_or("total"), direction);
            sort_data(&totals, &state, &[])
        }
    };
    if let Some(limit) = args.limit {
        rows.truncate(limit);
    }

    let rendered = output::render_list(out.format, &rows, |t| TrafficRow::from(t), |t| t.id.clone());
    out.print(&rendered);
    Ok(())
}
