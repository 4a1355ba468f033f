//! Command line interface for halos-proxy
//!
//! ```text
//! cli/
//! ├── commands/     # Command implementations
//! └── error.rs      # User-friendly error display
//! ```

pub mod commands;
pub mod error;

use std::io::IsTerminal;

use clap::Parser;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::error::ProxyResult;

/// halos-proxy - multi-instance WildFly management proxy
///
/// Registers WildFly instances and fans management operations out to them.
#[derive(Parser, Debug)]
#[command(
    name = "halos-proxy",
    version,
    about = "Multi-instance WildFly management proxy",
    long_about = "Holds management connections to many WildFly instances and executes\n\
                  DMR operations against all of them or a single named instance.",
    author
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: commands::Command,

    /// Enable verbose logging (-v, -vv, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

impl Cli {
    /// Execute the CLI command
    ///
    /// # Errors
    ///
    /// Returns `ProxyError` if command execution fails.
    pub async fn execute(self) -> ProxyResult<()> {
        self.init_tracing();

        if self.no_color || !std::io::stderr().is_terminal() {
            colored::control::set_override(false);
        }

        self.command.execute().await
    }

    /// Log level selected by `-v` and `--quiet`
    pub fn level(&self) -> Level {
        if self.quiet {
            Level::ERROR
        } else {
            match self.verbose {
                0 => Level::WARN,
                1 => Level::INFO,
                2 => Level::DEBUG,
                _ => Level::TRACE,
            }
        }
    }

    /// Initialize tracing; `RUST_LOG` overrides the verbosity flags
    fn init_tracing(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level().as_str().to_lowercase()));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["halos-proxy", "serve", "--bind", "0.0.0.0:9090"]);
        assert!(cli.is_ok());
    }

    #[test]
    fn test_verbosity_levels() {
        let cli = Cli::try_parse_from(["halos-proxy", "-vvv", "serve"]).unwrap();
        assert_eq!(cli.verbose, 3);
        assert_eq!(cli.level(), Level::TRACE);

        let cli = Cli::try_parse_from(["halos-proxy", "serve", "--quiet"]).unwrap();
        assert_eq!(cli.level(), Level::ERROR);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let cli = Cli::try_parse_from(["halos-proxy", "-v", "--quiet", "serve"]);
        assert!(cli.is_err());
    }
}
