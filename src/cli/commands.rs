//! CLI command implementations
//!
//! All command functions return `CliResult<ExitCode>` instead of calling
//! `process::exit`. Error handling and exits happen in the top-level `run()`.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::discovery::{discover_scripts, filter_scripts};
use crate::harness::{Harness, HarnessError, RunOutcome, ScriptInvocation};
use crate::process::{ExecutionError, ProcessResult};

use super::{CliError, CliResult, ExitCode};

// ============================================================================
// Single script
// ============================================================================

/// Run one script and report it.
///
/// Application mode exits 0 on pass and 1 (with the script's stderr) on failure. Schema mode prints the raw result
/// and exits with the script's own exit code.
pub fn run_script(harness: &Harness, invocation: &ScriptInvocation, json: bool) -> CliResult<ExitCode> {
    let outcome = harness
        .run(invocation)
        .map_err(|err| script_error(&invocation.script_name, err))?;

    match outcome {
        RunOutcome::Passed => {
            println!("{} \x1b[32mPASSED\x1b[0m", invocation.script_name);
            Ok(ExitCode::SUCCESS)
        }
        RunOutcome::Completed(result) => {
            println!("{}", render_result(&result, json)?);
            Ok(exit_code_of(&result))
        }
    }
}

/// Render a schema result for the terminal, or as pretty JSON.
pub fn render_result(result: &ProcessResult, json: bool) -> CliResult<String> {
    if json {
        return serde_json::to_string_pretty(result)
            .map_err(|e| CliError::failure(format!("Error serializing result: {}", e)));
    }
    Ok(format!(
        "exit code: {}\n--- stdout ---\n{}\n--- stderr ---\n{}",
        result.exit_code, result.stdout, result.stderr
    ))
}

/// Signal deaths (`-1`) are reported as a plain failure.
fn exit_code_of(result: &ProcessResult) -> ExitCode {
    if result.exit_code >= 0 {
        ExitCode(result.exit_code)
    } else {
        ExitCode::FAILURE
    }
}

fn script_error(script_name: &str, err: HarnessError) -> CliError {
    match err {
        // Both streams were already echoed by the harness.
        HarnessError::ScriptFailed { exit_code, .. } => {
            CliError::failure(format!("{} \x1b[31mFAILED\x1b[0m (exit code {})", script_name, exit_code))
        }
        other => diagnostic(other),
    }
}

/// Render a harness error through miette.
fn diagnostic(err: HarnessError) -> CliError {
    CliError::failure(format!("{:?}", miette::Report::new(err)))
}

// ============================================================================
// Listing
// ============================================================================

/// Print the scripts available in the harness's mode directory.
pub fn list_scripts(harness: &Harness) -> CliResult<ExitCode> {
    let scripts = discover_scripts(harness).map_err(diagnostic)?;
    if scripts.is_empty() {
        eprintln!("No scripts found in {}", harness.config().script_dir().display());
    }
    for name in scripts {
        println!("{}", name);
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// Suite
// ============================================================================

/// Verdict for one script in a suite run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptVerdict {
    Passed(Duration),
    Failed(Duration, String),
}

/// Summary of a suite run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuiteSummary {
    pub passed: usize,
    pub failed: usize,
    pub duration: Duration,
}

impl SuiteSummary {
    /// The closing `== 2 passed, 1 failed in 3.10s ==` line (without color).
    pub fn line(&self) -> String {
        let mut parts = Vec::new();
        if self.passed > 0 {
            parts.push(format!("{} passed", self.passed));
        }
        if self.failed > 0 {
            parts.push(format!("{} failed", self.failed));
        }
        if parts.is_empty() {
            parts.push("no scripts ran".to_string());
        }
        format!(
            "=================== {} in {:.2}s ===================",
            parts.join(", "),
            self.duration.as_secs_f64()
        )
    }
}

/// Judge one script. Configuration errors abort the whole suite; everything else is a per-script failure.
pub fn judge_script(harness: &Harness, invocation: &ScriptInvocation) -> Result<ScriptVerdict, HarnessError> {
    let start = Instant::now();
    let verdict = match harness.run(invocation) {
        Ok(RunOutcome::Passed) => ScriptVerdict::Passed(start.elapsed()),
        Ok(RunOutcome::Completed(result)) if result.success() => ScriptVerdict::Passed(start.elapsed()),
        Ok(RunOutcome::Completed(result)) => ScriptVerdict::Failed(
            start.elapsed(),
            format!("exit code {}\n{}", result.exit_code, result.stderr),
        ),
        Err(HarnessError::ScriptFailed { stderr, .. }) => ScriptVerdict::Failed(start.elapsed(), stderr),
        Err(HarnessError::Execution(e)) => ScriptVerdict::Failed(start.elapsed(), execution_failure(&e)),
        Err(fatal) => return Err(fatal),
    };
    Ok(verdict)
}

/// Failure text for a script that never produced a result. Timeouts carry whatever the script printed first.
fn execution_failure(err: &ExecutionError) -> String {
    match err.partial_output() {
        Some((stdout, stderr)) => format!(
            "{}\n--- partial stdout ---\n{}\n--- partial stderr ---\n{}",
            err,
            stdout.trim_end(),
            stderr.trim_end()
        ),
        None => err.to_string(),
    }
}

/// Run every script in the mode directory.
pub fn run_suite(
    harness: &Harness,
    submitter: Option<PathBuf>,
    stop_on_fail: bool,
    filter: Option<&str>,
) -> CliResult<ExitCode> {
    let start_time = Instant::now();

    let scripts = filter_scripts(discover_scripts(harness).map_err(diagnostic)?, filter);
    if scripts.is_empty() {
        eprintln!("No scripts collected");
        return Ok(ExitCode::SUCCESS); // "no scripts collected" is not a failure
    }

    tracing::info!(count = scripts.len(), mode = %harness.mode(), "Running suite");
    println!("\x1b[1m=================== test session starts ===================\x1b[0m");
    println!("collected {} item(s)", scripts.len());
    println!();

    let mut summary = SuiteSummary::default();
    let mut failures: Vec<(String, String)> = Vec::new();

    for name in scripts {
        let mut invocation = ScriptInvocation::new(name.as_str());
        invocation.overrides.submitter = submitter.clone();

        let verdict = judge_script(harness, &invocation).map_err(diagnostic)?;
        match verdict {
            ScriptVerdict::Passed(d) => {
                println!("{} \x1b[32mPASSED\x1b[0m ({:.0}ms)", name, d.as_millis());
                summary.passed += 1;
            }
            ScriptVerdict::Failed(d, msg) => {
                println!("{} \x1b[31mFAILED\x1b[0m ({:.0}ms)", name, d.as_millis());
                summary.failed += 1;
                failures.push((name, msg));
                if stop_on_fail {
                    break;
                }
            }
        }
    }

    if !failures.is_empty() {
        println!();
        println!("\x1b[1;31m=================== FAILURES ===================\x1b[0m");
        for (name, msg) in &failures {
            println!();
            println!("\x1b[1m___________ {} ___________\x1b[0m", name);
            println!();
            for line in msg.lines() {
                println!("    {}", line);
            }
        }
    }

    summary.duration = start_time.elapsed();
    println!();
    let summary_color = if summary.failed > 0 { "\x1b[1;31m" } else { "\x1b[1;32m" };
    println!("{}{}\x1b[0m", summary_color, summary.line());

    if summary.failed > 0 {
        // Summary already printed
        Err(CliError::new("", ExitCode::FAILURE))
    } else {
        Ok(ExitCode::SUCCESS)
    }
}
