pub use clap::Parser;

use std::path::PathBuf;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "cadmus")]
#[command(about = "Sovereign field encryption and behavior actions for Cadmus documents")]
pub struct Args {
    /// API base URL (defaults to the configured remote)
    #[arg(long, global = true)]
    pub remote: Option<Url>,

    /// Path to the cadmus config directory (defaults to ~/.cadmus)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    /// Vault secret for confidential values; never written to disk
    #[arg(
        long,
        global = true,
        env = "CADMUS_VAULT_SECRET",
        hide_env_values = true
    )]
    pub vault_secret: Option<String>,

    #[command(subcommand)]
    pub command: crate::Command,
}
