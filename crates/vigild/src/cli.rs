//! Command-line interface for the vigil daemon.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// SLO-based alert evaluation and notification routing daemon.
#[derive(Parser, Debug, Clone)]
#[command(name = "vigild", version, about)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, env = "VIGIL_CONFIG", default_value = "vigil.json")]
    pub config: PathBuf,

    /// Address the HTTP API listens on.
    #[arg(short, long, env = "VIGIL_LISTEN", default_value = "0.0.0.0:9094")]
    pub listen: SocketAddr,

    /// Directory state snapshots are written to. Omit to run without
    /// persistence.
    #[arg(short, long, env = "VIGIL_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Validate the configuration and exit without starting the daemon.
    #[arg(long)]
    pub check: bool,
}
