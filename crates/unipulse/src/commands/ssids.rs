//! `ssids`: per-network summaries across APs and radios.

use strum::IntoEnumIterator;
use tabled::Tabled;

use unipulse_config::{Config, SITE_TAG};
use unipulse_core::{Band, NormalizedSsid, SsidOptions, SsidSort};

use crate::cli::{SsidSortArg, SsidsArgs};
use crate::config::{Presentation, Session};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct SsidRow {
    #[tabled(rename = "SSID")]
    name: String,
    #[tabled(rename = "Guest")]
    guest: String,
    #[tabled(rename = "Clients")]
    clients: u64,
    #[tabled(rename = "APs")]
    aps: usize,
    #[tabled(rename = "Bands")]
    bands: String,
    #[tabled(rename = "Traffic")]
    traffic: String,
    #[tabled(rename = "Satisfaction")]
    satisfaction: String,
    #[tabled(rename = "Signal")]
    signal: String,
}

fn channels(n: &NormalizedSsid) -> String {
    Band::iter()
        .filter(|b| !n.channels.get(*b).is_empty())
        .map(|b| {
            let chans = n
                .channels
                .get(b)
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
            format!("{b} ({chans})")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn row(n: &NormalizedSsid, color: bool) -> SsidRow {
    let opt = |v: Option<f64>, unit: &str| {
        v.map_or_else(|| output::missing(color), |v| format!("{v:.0}{unit}"))
    };
    SsidRow {
        name: n.name.clone(),
        guest: if n.is_guest { "yes" } else { "no" }.into(),
        clients: n.client_count,
        aps: n.aps.len(),
        bands: channels(n),
        traffic: output::fmt_bytes(n.total_bytes()),
        satisfaction: opt(n.avg_satisfaction, "%"),
        signal: opt(n.avg_signal, " dBm"),
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    session: &Session,
    args: &SsidsArgs,
    cfg: &Config,
    out: Presentation,
) -> Result<(), CliError> {
    let options = SsidOptions {
        include_idle: args.include_idle || cfg.defaults.include_idle_ssids,
        sort: match args.sort {
            SsidSortArg::Clients => SsidSort::ClientCount,
            SsidSortArg::Name => SsidSort::Name,
            SsidSortArg::Traffic => SsidSort::Traffic,
        },
        descending: !args.asc,
    };
    let filter = session.site.as_deref().map(|site| (SITE_TAG, site));

    let networks = session
        .dashboard
        .ssids(&options, filter)
        .await
        .map_err(|e| session.fail(e))?;

    let rendered = output::render_list(
        out.format,
        &networks,
        |n| row(n, out.color),
        |n| n.name.clone(),
    );
    out.print(&rendered);
    Ok(())
}
