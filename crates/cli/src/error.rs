//! CLI error types.

use std::fmt;

use error_stack::Report;
use keyset_common::error::KeySetError;

#[derive(Debug)]
pub enum CliError {
    /// Settings could not be loaded or a key set operation aborted
    KeySet(Report<KeySetError>),
    /// The key set document breaks `count` invariants
    InvalidKeySet { path: String, count: usize },
    /// A command argument is malformed
    Argument(String),
    /// IO error
    Io(std::io::Error),
    /// Logger could not be installed
    Logger(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::KeySet(report) => {
                write!(f, "{}", report.current_context())?;
                for detail in report_details(report) {
                    write!(f, "\n  {}", detail)?;
                }
                Ok(())
            }
            CliError::InvalidKeySet { path, count } => {
                write!(f, "{} has {} violation(s)", path, count)
            }
            CliError::Argument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::Io(err) => write!(f, "IO error: {}", err),
            CliError::Logger(msg) => write!(f, "Logger error: {}", msg),
        }
    }
}

/// Printable attachments and underlying IO errors of `report`, outermost first.
fn report_details(report: &Report<KeySetError>) -> Vec<String> {
    report
        .frames()
        .filter_map(|frame| {
            if let Some(message) = frame.downcast_ref::<String>() {
                Some(message.clone())
            } else if let Some(message) = frame.downcast_ref::<&'static str>() {
                Some((*message).to_string())
            } else {
                frame
                    .downcast_ref::<std::io::Error>()
                    .map(|err| format!("caused by: {}", err))
            }
        })
        .collect()
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::KeySet(report) => Some(report.current_context()),
            CliError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io(err)
    }
}

impl From<Report<KeySetError>> for CliError {
    fn from(report: Report<KeySetError>) -> Self {
        log::debug!("{:?}", report);
        CliError::KeySet(report)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::Io(err.into())
    }
}
