//! User-friendly error formatting for CLI

use colored::Colorize;

use crate::error::ProxyError;

/// Format an error for CLI display
#[must_use]
pub fn format_error(error: &ProxyError) -> String {
    match error {
        ProxyError::Configuration { message, key } => {
            let message = match key {
                Some(key) => format!("{message} ({key})"),
                None => message.clone(),
            };
            format!(
                "{} Configuration error\n  {}\n\n{}\n  {}",
                "✗".red().bold(),
                message,
                "Suggestion:".yellow(),
                "Run with --help to see all available options"
            )
        }
        ProxyError::Connection { message, instance } => {
            format!(
                "{} Unable to connect to {}\n  {}\n\n{}\n  {}",
                "✗".red().bold(),
                instance,
                message,
                "Suggestion:".yellow(),
                "Check the host and port of the management interface"
            )
        }
        ProxyError::Io(err) => {
            format!(
                "{} I/O error\n  {}\n\n{}\n  {}",
                "✗".red().bold(),
                err,
                "Suggestion:".yellow(),
                "Check that the bind address is free"
            )
        }
        _ => format!("{} {}", "✗".red().bold(), error),
    }
}

/// Exit code for `error`
#[must_use]
pub fn exit_code(error: &ProxyError) -> i32 {
    match error {
        ProxyError::Configuration { .. } => 2,
        _ => 1,
    }
}

/// Display an error to stderr and return exit code
#[must_use]
pub fn display_error(error: &ProxyError) -> i32 {
    eprintln!("{}", format_error(error));
    exit_code(error)
}
