//! Run outcomes and the harness error type.

use std::path::PathBuf;

use cloudant_harness_core::ConfigurationError;
use miette::Diagnostic;
use thiserror::Error;

use crate::process::{ExecutionError, ProcessResult};

/// Result type for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Errors raised by [`Harness`](super::Harness).
#[derive(Debug, Error, Diagnostic)]
pub enum HarnessError {
    /// A required environment variable is missing. Raised before anything is spawned.
    #[error("{error}")]
    #[diagnostic(code(cloudant_harness::configuration))]
    Configuration {
        error: ConfigurationError,
        /// Every harness variable that is unset, not only the one that stopped this run.
        #[help]
        help: Option<String>,
    },

    /// The submitter could not be launched, or the run timed out.
    #[error(transparent)]
    #[diagnostic(code(cloudant_harness::execution))]
    Execution(#[from] ExecutionError),

    /// An application script exited non-zero. The message is the script's stderr, verbatim.
    #[error("{stderr}")]
    #[diagnostic(code(cloudant_harness::script_failed))]
    ScriptFailed { exit_code: i32, stderr: String },

    #[error("failed to list scripts in {}: {source}", path.display())]
    #[diagnostic(code(cloudant_harness::discovery))]
    Discovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What a successful `run_test` produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Application mode: the script exited 0.
    Passed,
    /// Schema mode: the raw result, whatever the exit code.
    Completed(ProcessResult),
}

impl HarnessError {
    /// Wrap a configuration error, listing the `missing` variables in the help text.
    pub fn configuration(error: ConfigurationError, missing: &[&str]) -> Self {
        let help = (!missing.is_empty()).then(|| format!("export {}", missing.join(", ")));
        HarnessError::Configuration { error, help }
    }
}

impl RunOutcome {
    /// The raw result of a schema run; `None` for application runs.
    pub fn into_result(self) -> Option<ProcessResult> {
        match self {
            RunOutcome::Passed => None,
            RunOutcome::Completed(result) => Some(result),
        }
    }

}

/// Fail the calling test if the harness reported an error.
///
/// The panic message is the error's `Display`, which for a failed application script is exactly the captured stderr.
#[track_caller]
pub fn expect_pass<T>(result: HarnessResult<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("{}", err),
    }
}
