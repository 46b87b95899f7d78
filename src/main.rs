//! CLI entry point for the harvester tool.

use std::process::ExitCode;

mod app;
mod cli;

/// Process exit outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    /// Run completed, or there was nothing to do.
    Success,
    /// Run stopped early and should be resumed by invoking it again.
    Stopped,
    /// Unrecoverable failure.
    Failure,
}

impl From<ProcessExit> for ExitCode {
    fn from(exit: ProcessExit) -> Self {
        match exit {
            ProcessExit::Success => ExitCode::SUCCESS,
            ProcessExit::Failure => ExitCode::from(1),
            ProcessExit::Stopped => ExitCode::from(2),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match app::runtime::run_harvester().await {
        Ok(exit) => exit.into(),
        Err(error) => {
            eprintln!("Error: {error:#}");
            ProcessExit::Failure.into()
        }
    }
}
