//! Clap derive structures for the `unipulse` CLI.
//!
//! Defines the command tree, global flags, and shared argument groups.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// unipulse -- UniFi telemetry from the command line
#[derive(Debug, Parser)]
#[command(
    name = "unipulse",
    version,
    about = "Query UniFi network telemetry: traffic totals, rate trends and SSID summaries",
    long_about = "Reads UniFi telemetry stored in an InfluxDB-compatible time-series store.\n\n\
        Every range and identifier is validated before a query is built, counters\n\
        are reduced to per-window deltas, and rates are never summed across time.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Store profile to use
    #[arg(long, short = 'p', env = "UNIPULSE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Store URL (overrides profile)
    #[arg(long, short = 'u', env = "UNIPULSE_URL", global = true)]
    pub url: Option<String>,

    /// Database name (overrides profile)
    #[arg(long, short = 'd', env = "UNIPULSE_DATABASE", global = true)]
    pub database: Option<String>,

    /// Restrict queries to one site (overrides profile)
    #[arg(long, short = 's', env = "UNIPULSE_SITE", global = true)]
    pub site: Option<String>,

    /// Config file path
    #[arg(long, env = "UNIPULSE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Read a recorded JSON response instead of querying the store
    #[arg(long, short = 'i', global = true, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Output format (defaults to the config's `defaults.output`)
    #[arg(long, short = 'o', env = "UNIPULSE_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "UNIPULSE_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "UNIPULSE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print a validated query without sending it
    #[command(alias = "q")]
    Query(QueryArgs),

    /// Bytes moved per entity over a window
    #[command(alias = "t")]
    Traffic(TrafficArgs),

    /// Time-bucketed rate trend per entity
    Trend(TrendArgs),

    /// Per-network summaries across APs and radios
    #[command(alias = "wifi")]
    Ssids(SsidsArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Shared Arguments ─────────────────────────────────────────────────

/// Which measurement to read and how to split it into entities.
#[derive(Debug, Clone, Args)]
pub struct ScopeArgs {
    /// Source measurement
    #[arg(long, short = 'm', default_value = "clients")]
    pub measurement: String,

    /// Entity tag; repeat or comma-separate for a composite key
    #[arg(long, short = 'b', value_delimiter = ',', default_value = "mac")]
    pub by: Vec<String>,
}

/// Lookback window argument.
#[derive(Debug, Clone, Args)]
pub struct RangeArgs {
    /// Lookback window, e.g. 1h, 24h, 7d (defaults to the config's `defaults.range`)
    #[arg(long, short = 'r')]
    pub range: Option<String>,
}

// ── Query ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct QueryArgs {
    #[command(subcommand)]
    pub preset: QueryPreset,
}

#[derive(Debug, Subcommand)]
pub enum QueryPreset {
    /// Window totals: last - first of each byte counter
    Totals {
        #[command(flatten)]
        scope: ScopeArgs,
        #[command(flatten)]
        range: RangeArgs,
        /// Display-name tag carried through grouping
        #[arg(long)]
        name_tag: Option<String>,
    },

    /// Mean of precomputed rate fields per bucket
    Rates {
        #[command(flatten)]
        scope: ScopeArgs,
        #[command(flatten)]
        range: RangeArgs,
        /// Rate columns
        #[arg(long, value_delimiter = ',', default_values_t = default_rate_columns())]
        columns: Vec<String>,
    },

    /// Per-second rate derived from a counter
    Counter {
        #[command(flatten)]
        scope: ScopeArgs,
        #[command(flatten)]
        range: RangeArgs,
        /// Counter column
        #[arg(long, default_value = "rx_bytes")]
        column: String,
    },

    /// Latest VAP snapshot used for SSID summaries
    Vaps,
}

pub fn default_rate_columns() -> Vec<String> {
    unipulse_core::query::presets::RATE_COLUMNS
        .iter()
        .map(|c| (*c).to_owned())
        .collect()
}

// ── Traffic ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct TrafficArgs {
    #[command(flatten)]
    pub scope: ScopeArgs,

    #[command(flatten)]
    pub range: RangeArgs,

    /// Tag holding a display name
    #[arg(long, short = 'n', default_value = "hostname")]
    pub name_tag: String,

    /// Keep entities that moved no bytes
    #[arg(long)]
    pub include_zero: bool,

    /// Sort by column (id, name, rx, tx, total, or any tag); default is total
    #[arg(long)]
    pub sort: Option<String>,

    /// Sort ascending instead of descending
    #[arg(long)]
    pub asc: bool,

    /// Show at most N rows
    #[arg(long, short = 'l')]
    pub limit: Option<usize>,
}

// ── Trend ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct TrendArgs {
    /// Source measurement
    #[arg(long, short = 'm', default_value = "usg_wan_ports")]
    pub measurement: String,

    /// Entity tag; repeat or comma-separate for a composite key
    #[arg(long, short = 'b', value_delimiter = ',', default_value = "ifname")]
    pub by: Vec<String>,

    #[command(flatten)]
    pub range: RangeArgs,

    /// Precomputed rate columns to chart
    #[arg(long, value_delimiter = ',', default_values_t = default_rate_columns(), conflicts_with = "counter")]
    pub columns: Vec<String>,

    /// Derive the rate from this counter instead of rate columns
    #[arg(long)]
    pub counter: Option<String>,
}

impl TrendArgs {
    pub fn scope(&self) -> ScopeArgs {
        ScopeArgs {
            measurement: self.measurement.clone(),
            by: self.by.clone(),
        }
    }
}

// ── SSIDs ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SsidsArgs {
    /// Include networks with no connected clients
    #[arg(long)]
    pub include_idle: bool,

    /// Sort key
    #[arg(long, default_value = "clients")]
    pub sort: SsidSortArg,

    /// Sort ascending instead of descending
    #[arg(long)]
    pub asc: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SsidSortArg {
    Clients,
    Name,
    Traffic,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current resolved configuration
    Show,

    /// Print the config file path
    Path,

    /// Create or extend the config file with a profile
    Init {
        /// Store URL
        #[arg(long, default_value = "http://localhost:8086")]
        store_url: String,

        /// Database name
        #[arg(long, default_value = "unifi")]
        db: String,

        /// Username for basic auth
        #[arg(long)]
        username: Option<String>,

        /// Environment variable holding the password
        #[arg(long)]
        password_env: Option<String>,

        /// Replace an existing profile of the same name
        #[arg(long)]
        force: bool,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
