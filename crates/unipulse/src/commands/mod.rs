//! Command dispatch: bridges CLI args -> dashboard panels -> output formatting.

pub mod config_cmd;
pub mod query;
pub mod ssids;
pub mod traffic;
pub mod trend;

use unipulse_config::Config;

use crate::cli::{Command, GlobalOpts};
use crate::config::{Presentation, Session};
use crate::error::CliError;

/// Dispatch a data command to its handler.
pub async fn dispatch(cmd: Command, cfg: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let out = Presentation::resolve(global, cfg)?;

    // Printing a statement never needs a store.
    if let Command::Query(args) = cmd {
        return query::handle(&args, cfg, global, out);
    }

    let session = Session::open(global, cfg)?;
    match cmd {
        Command::Traffic(args) => traffic::handle(&session, &args, cfg, out).await,
        Command::Trend(args) => trend::handle(&session, &args, cfg, out).await,
        Command::Ssids(args) => ssids::handle(&session, &args, cfg, out).await,
        // Handled before dispatch
        Command::Query(_) | Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
