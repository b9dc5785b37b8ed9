//! Harness configuration and per-call invocation options.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Script subdirectory for application tests.
pub const APPLICATION_SCRIPT_DIR: &str = "cloudantapp";
/// Script subdirectory for schema tests.
pub const SCHEMA_SCRIPT_DIR: &str = "schema";
/// Master URL passed to the submitter unless overridden.
pub const DEFAULT_MASTER: &str = "local[4]";

/// How a finished script is judged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestMode {
    /// The script asserts in-process; a non-zero exit fails the test with the script's stderr.
    Application,
    /// The harness returns exit code and both streams untouched; the caller judges them.
    Schema,
}

impl TestMode {
    /// Subdirectory of the scripts root holding this mode's scripts.
    pub fn script_dir(self) -> &'static str {
        match self {
            TestMode::Application => APPLICATION_SCRIPT_DIR,
            TestMode::Schema => SCHEMA_SCRIPT_DIR,
        }
    }
}

impl fmt::Display for TestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestMode::Application => write!(f, "application"),
            TestMode::Schema => write!(f, "schema"),
        }
    }
}

/// Settings fixed for the lifetime of a [`Harness`](super::Harness).
///
/// There are no setters on a built harness: the mode chosen here decides how every run is classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    scripts_root: PathBuf,
    mode: TestMode,
    master: String,
    timeout: Option<Duration>,
}

impl HarnessConfig {
    pub fn new(scripts_root: impl Into<PathBuf>, mode: TestMode) -> Self {
        Self {
            scripts_root: scripts_root.into(),
            mode,
            master: DEFAULT_MASTER.to_string(),
            timeout: None,
        }
    }

    /// Application-mode configuration rooted at `scripts_root`.
    pub fn application(scripts_root: impl Into<PathBuf>) -> Self {
        Self::new(scripts_root, TestMode::Application)
    }

    /// Schema-mode configuration rooted at `scripts_root`.
    pub fn schema(scripts_root: impl Into<PathBuf>) -> Self {
        Self::new(scripts_root, TestMode::Schema)
    }

    /// Override the `--master` value.
    pub fn with_master(mut self, master: impl Into<String>) -> Self {
        self.master = master.into();
        self
    }

    /// Kill scripts that run longer than `timeout`. Unset by default: a hung script blocks forever.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn scripts_root(&self) -> &Path {
        &self.scripts_root
    }

    pub fn mode(&self) -> TestMode {
        self.mode
    }

    pub fn master(&self) -> &str {
        &self.master
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// `<scripts_root>/<mode dir>`.
    pub fn script_dir(&self) -> PathBuf {
        self.scripts_root.join(self.mode.script_dir())
    }
}

/// Per-call tweaks to the submit command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOverrides {
    /// Use this executable instead of `<SPARK_HOME>/bin/spark-submit`.
    pub submitter: Option<PathBuf>,
    /// Extra `flag value` pairs, emitted in insertion order before the script path.
    pub extra_args: Vec<(String, String)>,
}

/// One request to run a named script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptInvocation {
    pub script_name: String,
    pub overrides: RunOverrides,
}

impl ScriptInvocation {
    pub fn new(script_name: impl Into<String>) -> Self {
        Self {
            script_name: script_name.into(),
            overrides: RunOverrides::default(),
        }
    }

    pub fn with_submitter(mut self, submitter: impl Into<PathBuf>) -> Self {
        self.overrides.submitter = Some(submitter.into());
        self
    }

    pub fn with_arg(mut self, flag: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.extra_args.push((flag.into(), value.into()));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_script_dirs() {
        assert_eq!(TestMode::Application.script_dir(), "cloudantapp");
        assert_eq!(TestMode::Schema.script_dir(), "schema");
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(TestMode::Application.to_string(), "application");
        assert_eq!(TestMode::Schema.to_string(), "schema");
    }

    #[test]
    fn test_config_defaults() {
        let config = HarnessConfig::application("/tests");
        assert_eq!(config.mode(), TestMode::Application);
        assert_eq!(config.master(), "local[4]");
        assert_eq!(config.timeout(), None);
        assert_eq!(config.script_dir(), PathBuf::from("/tests/cloudantapp"));
    }

    #[test]
    fn test_config_builders() {
        let config = HarnessConfig::schema("/tests")
            .with_master("local[2]")
            .with_timeout(Duration::from_secs(90));
        assert_eq!(config.mode(), TestMode::Schema);
        assert_eq!(config.master(), "local[2]");
        assert_eq!(config.timeout(), Some(Duration::from_secs(90)));
        assert_eq!(config.script_dir(), PathBuf::from("/tests/schema"));
    }

    #[test]
    fn test_invocation_builder_keeps_arg_order() {
        let invocation = ScriptInvocation::new("CsvSchema.py")
            .with_submitter("/usr/local/bin/submit")
            .with_arg("--driver-memory", "2g")
            .with_arg("--conf", "spark.ui.enabled=false");
        assert_eq!(invocation.script_name, "CsvSchema.py");
        assert_eq!(invocation.overrides.submitter, Some(PathBuf::from("/usr/local/bin/submit")));
        assert_eq!(
            invocation.overrides.extra_args,
            vec![
                ("--driver-memory".to_string(), "2g".to_string()),
                ("--conf".to_string(), "spark.ui.enabled=false".to_string()),
            ]
        );
    }
}
