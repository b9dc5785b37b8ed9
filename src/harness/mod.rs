//! The test harness: resolve a script, submit it to the engine, judge the result.
//!
//! ## Flow
//!
//! 1. [`Harness::resolve_script_path`] maps a script name to `<root>/<mode dir>/<name>`
//! 2. [`Harness::resolve_submitter`] picks the submitter and the runtime library paths
//! 3. [`Harness::build_command`] assembles `<submitter> --master <m> --jars <jar> [extra...] <script>`
//! 4. The [`ScriptExecutor`] runs it to completion
//! 5. The result is classified according to the harness's [`TestMode`]
//!
//! Every [`ConfigurationError`] surfaces in steps 2-3, before anything is spawned.

mod config;
mod outcome;

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use cloudant_harness_core::{ConfigurationError, ProcessEnv, RuntimeEnv, env};

use crate::process::{ProcessResult, ScriptExecutor, SubmitCommand, SystemExecutor};

pub use config::{
    APPLICATION_SCRIPT_DIR, DEFAULT_MASTER, HarnessConfig, RunOverrides, SCHEMA_SCRIPT_DIR, ScriptInvocation, TestMode,
};
pub use outcome::{HarnessError, HarnessResult, RunOutcome, expect_pass};

/// Version of the py4j bindings archive shipped under `<SPARK_HOME>/python/lib`.
pub const PY4J_ARCHIVE: &str = "py4j-0.8.2.1-src.zip";

/// The submitter executable and the library locations its children need on their module search path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitter {
    pub executable: PathBuf,
    pub library_paths: Vec<PathBuf>,
}

impl Submitter {
    /// A caller-supplied submitter, used as-is.
    pub fn explicit(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            library_paths: Vec::new(),
        }
    }

    /// The conventional submitter beneath a runtime installation root.
    pub fn from_spark_home(spark_home: &Path) -> Self {
        let python = spark_home.join("python");
        Self {
            executable: spark_home.join("bin").join("spark-submit"),
            library_paths: vec![python.clone(), python.join("lib").join(PY4J_ARCHIVE)],
        }
    }
}

/// Runs test scripts through the external engine's submitter.
pub struct Harness {
    config: HarnessConfig,
    env: RuntimeEnv,
    executor: Box<dyn ScriptExecutor>,
}

impl fmt::Debug for Harness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Harness")
            .field("config", &self.config)
            .field("env", &self.env)
            .finish_non_exhaustive()
    }
}

impl Harness {
    /// Build a harness over the current process environment, spawning real processes.
    pub fn new(config: HarnessConfig) -> Self {
        Self::with_env(config, RuntimeEnv::capture(&ProcessEnv))
    }

    /// Build a harness over an explicit environment snapshot.
    pub fn with_env(config: HarnessConfig, env: RuntimeEnv) -> Self {
        Self {
            config,
            env,
            executor: Box::new(SystemExecutor),
        }
    }

    /// Replace the executor that runs submit commands.
    pub fn with_executor(mut self, executor: impl ScriptExecutor + 'static) -> Self {
        self.executor = Box::new(executor);
        self
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn mode(&self) -> TestMode {
        self.config.mode()
    }

    /// `<scripts_root>/<mode dir>/<script_name>`. Existence is not checked: a missing script shows up as a non-zero
    /// exit from the submitter.
    pub fn resolve_script_path(&self, script_name: &str) -> PathBuf {
        self.config.script_dir().join(script_name)
    }

    /// Choose the submitter for a run.
    ///
    /// ## Parameters
    /// - `override_path`: an explicit submitter; returned unchanged when present.
    ///
    /// ## Returns
    /// - (`Submitter`): the executable plus the runtime library paths (`<SPARK_HOME>/python` and its py4j archive)
    ///   that must be importable by the script. Explicit submitters carry no library paths.
    ///
    /// ## Errors
    /// - [`ConfigurationError::MissingVariable`] when no override is given and `SPARK_HOME` is not set.
    pub fn resolve_submitter(&self, override_path: Option<&Path>) -> Result<Submitter, ConfigurationError> {
        match override_path {
            Some(path) => Ok(Submitter::explicit(path)),
            None => Ok(Submitter::from_spark_home(self.env.spark_home()?)),
        }
    }

    /// Assemble the full submit command for `script_path`.
    pub fn build_command(
        &self,
        script_path: &Path,
        overrides: &RunOverrides,
    ) -> Result<SubmitCommand, ConfigurationError> {
        let submitter = self.resolve_submitter(overrides.submitter.as_deref())?;
        let connector_jar = self.env.connector_jar()?;

        let mut command = SubmitCommand::new(&submitter.executable)
            .arg("--master")
            .arg(self.config.master())
            .arg("--jars")
            .arg(connector_jar);
        for (flag, value) in &overrides.extra_args {
            command = command.arg(flag).arg(value);
        }
        command = command.arg(script_path);

        if let Some(python_path) = self.child_python_path(&submitter.library_paths)? {
            command = command.env(env::PYTHONPATH, python_path);
        }

        match self.env.engine_config() {
            Ok(engine) => {
                for (name, value) in engine.to_env_vars() {
                    command = command.env(name, value);
                }
            }
            // Scripts read their own connection settings; some schema tests run without them on purpose.
            Err(err) => tracing::debug!("Engine configuration incomplete: {}", err),
        }

        Ok(command)
    }

    /// Runtime library paths first, then whatever the parent already had.
    fn child_python_path(&self, library_paths: &[PathBuf]) -> Result<Option<OsString>, ConfigurationError> {
        if library_paths.is_empty() {
            return Ok(None);
        }
        let mut entries: Vec<PathBuf> = library_paths.to_vec();
        if let Some(inherited) = self.env.python_path() {
            entries.extend(std::env::split_paths(inherited));
        }
        std::env::join_paths(entries)
            .map(Some)
            .map_err(|e| ConfigurationError::InvalidValue {
                name: env::PYTHONPATH,
                reason: e.to_string(),
            })
    }

    /// Run the script at `script_path` and classify the result.
    ///
    /// - **Schema** mode returns [`RunOutcome::Completed`] with the exit code and both streams, whatever the exit code.
    /// - **Application** mode echoes both streams to stdout, then returns [`RunOutcome::Passed`] on exit 0 or
    ///   [`HarnessError::ScriptFailed`] (message = stderr) otherwise.
    #[tracing::instrument(skip_all, fields(mode = %self.config.mode(), script = %script_path.as_ref().display()))]
    pub fn run_test(&self, script_path: impl AsRef<Path>, overrides: &RunOverrides) -> HarnessResult<RunOutcome> {
        let command = self
            .build_command(script_path.as_ref(), overrides)
            .map_err(|error| HarnessError::configuration(error, &self.env.missing_variables()))?;
        tracing::debug!("Submitting: {}", command.display());

        let result = match self.executor.execute(&command, self.config.timeout()) {
            Ok(result) => result,
            Err(err) => {
                if let (TestMode::Application, Some((stdout, stderr))) = (self.config.mode(), err.partial_output()) {
                    echo_streams(stdout, stderr);
                }
                return Err(err.into());
            }
        };
        tracing::debug!(exit_code = result.exit_code, "Script finished");

        self.classify(result)
    }

    /// Resolve `invocation.script_name` and run it.
    pub fn run(&self, invocation: &ScriptInvocation) -> HarnessResult<RunOutcome> {
        let script_path = self.resolve_script_path(&invocation.script_name);
        self.run_test(script_path, &invocation.overrides)
    }

    /// Run a script by name with no overrides.
    pub fn run_script(&self, script_name: &str) -> HarnessResult<RunOutcome> {
        self.run(&ScriptInvocation::new(script_name))
    }

    fn classify(&self, result: ProcessResult) -> HarnessResult<RunOutcome> {
        match self.config.mode() {
            TestMode::Schema => Ok(RunOutcome::Completed(result)),
            TestMode::Application => {
                echo_streams(&result.stdout, &result.stderr);

                if result.success() {
                    Ok(RunOutcome::Passed)
                } else {
                    tracing::warn!(exit_code = result.exit_code, "Application script failed");
                    Err(HarnessError::ScriptFailed {
                        exit_code: result.exit_code,
                        stderr: result.stderr,
                    })
                }
            }
        }
    }
}

/// Engine logs go to stdout and script output to stderr; show both so a failing run can be read from the captured
/// test output.
fn echo_streams(stdout: &str, stderr: &str) {
    println!("{}", stdout);
    println!("{}", stderr);
}
