//! CLI module for the Cloudant integration harness
//!
//! ## Commands
//!
//! - `run <script>` - Submit one script and report its outcome
//! - `list` - List the scripts in the selected mode directory
//! - `suite` - Run every script in the mode directory (pytest-style summary)
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;

use std::fmt;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::harness::{DEFAULT_MASTER, Harness, HarnessConfig, ScriptInvocation, TestMode};
use crate::version::HARNESS_VERSION;

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    /// Create a new CLI error with a message and exit code.
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Drive Cloudant connector test scripts through spark-submit
#[derive(Parser, Debug)]
#[command(name = "cloudant-harness")]
#[command(version = HARNESS_VERSION)]
#[command(about = "Drive Cloudant connector test scripts through spark-submit", long_about = None)]
#[command(after_help = "Environment: SPARK_HOME, CONNECTOR_JAR, CLOUDANT_ACCOUNT, CLOUDANT_USER, CLOUDANT_PASSWORD")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Directory containing the cloudantapp/ and schema/ script folders
    #[arg(long, value_name = "DIR", default_value = "test-scripts", global = true)]
    pub scripts_root: PathBuf,

    /// Run schema tests (raw results) instead of application tests
    #[arg(long, global = true)]
    pub schema: bool,

    /// Master URL handed to the submitter
    #[arg(long, value_name = "URL", default_value = DEFAULT_MASTER, global = true)]
    pub master: String,

    /// Kill scripts that run longer than this many seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit one script and report its outcome
    Run {
        /// Script name, relative to the mode directory
        #[arg(value_name = "SCRIPT")]
        script: String,
        /// Submitter executable (default: $SPARK_HOME/bin/spark-submit)
        #[arg(long, value_name = "PATH")]
        submitter: Option<PathBuf>,
        /// Extra submitter flag, inserted before the script path
        #[arg(long = "extra", value_name = "FLAG=VALUE", value_parser = parse_flag_value, allow_hyphen_values = true)]
        extra: Vec<(String, String)>,
        /// Print schema results as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the scripts in the mode directory
    List,

    /// Run every script in the mode directory
    Suite {
        /// Submitter executable (default: $SPARK_HOME/bin/spark-submit)
        #[arg(long, value_name = "PATH")]
        submitter: Option<PathBuf>,
        /// Stop on first failure
        #[arg(short = 'x', long = "exitfirst")]
        stop_on_fail: bool,
        /// Only run scripts whose name contains this keyword
        #[arg(short = 'k', value_name = "EXPR")]
        filter: Option<String>,
    },
}

impl Cli {
    /// Harness configuration described by the global flags.
    pub fn harness_config(&self) -> HarnessConfig {
        let mode = if self.schema { TestMode::Schema } else { TestMode::Application };
        let config = HarnessConfig::new(&self.scripts_root, mode).with_master(&self.master);
        match self.timeout {
            Some(secs) => config.with_timeout(Duration::from_secs(secs)),
            None => config,
        }
    }
}

/// Parse `FLAG=VALUE`, splitting on the first `=`.
fn parse_flag_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((flag, value)) if !flag.is_empty() => Ok((flag.to_string(), value.to_string())),
        _ => Err(format!("expected FLAG=VALUE, got '{}'", raw)),
    }
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the CLI command and return result.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    let harness = Harness::new(cli.harness_config());
    tracing::debug!(?harness, "Harness configured");

    match cli.command {
        Command::Run {
            script,
            submitter,
            extra,
            json,
        } => {
            let mut invocation = ScriptInvocation::new(script);
            invocation.overrides.submitter = submitter;
            invocation.overrides.extra_args = extra;
            commands::run_script(&harness, &invocation, json)
        }
        Command::List => commands::list_scripts(&harness),
        Command::Suite {
            submitter,
            stop_on_fail,
            filter,
        } => commands::run_suite(&harness, submitter, stop_on_fail, filter.as_deref()),
    }
}

// ============================================================================
// Tests
// ============================================================================
