//! CLI command implementations

pub mod serve;

use clap::Subcommand;

use crate::error::ProxyResult;

/// All available CLI commands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the proxy over HTTP
    #[command(visible_alias = "s")]
    Serve(serve::ServeCommand),
}

impl Command {
    /// Execute the command
    pub async fn execute(self) -> ProxyResult<()> {
        match self {
            Command::Serve(cmd) => cmd.execute().await,
        }
    }
}
