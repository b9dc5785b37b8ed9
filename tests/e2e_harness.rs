//! End-to-end tests: real child processes against a fake submitter.
//!
//! The fake submitter is a shell script that runs its last argument (the test script) with `sh`, so each scenario
//! can choose its own exit code and output without a query engine installed.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use cloudant_harness::discovery::discover_scripts;
use cloudant_harness::{
    ExecutionError, Harness, HarnessConfig, HarnessError, MapEnv, RunOutcome, RuntimeEnv, ScriptInvocation, TestMode,
    expect_pass,
};
use cloudant_harness_core::env;
use tempfile::TempDir;

/// Serializes fixture creation and spawning within this binary. Writing an executable while another thread forks
/// can fail the later exec with ETXTBSY.
static SERIAL: Mutex<()> = Mutex::new(());

const FAKE_SUBMIT: &str = r#"#!/bin/sh
for arg; do script="$arg"; done
exec sh "$script"
"#;

struct Fixture {
    root: TempDir,
    _guard: MutexGuard<'static, ()>,
}

impl Fixture {
    fn new() -> Self {
        let guard = SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let root = tempfile::tempdir().unwrap();
        let fixture = Self { root, _guard: guard };
        fixture.write_executable("spark/bin/spark-submit", FAKE_SUBMIT);
        fixture
    }

    fn path(&self) -> &Path {
        self.root.path()
    }

    fn scripts_root(&self) -> PathBuf {
        self.path().join("test-scripts")
    }

    fn write_executable(&self, relative: &str, body: &str) -> PathBuf {
        let path = self.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, body).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn add_script(&self, mode: TestMode, name: &str, body: &str) {
        let dir = self.scripts_root().join(mode.script_dir());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), body).unwrap();
    }

    fn env(&self) -> MapEnv {
        MapEnv::new()
            .with(env::SPARK_HOME, self.path().join("spark").to_string_lossy())
            .with(env::CONNECTOR_JAR, "/jars/spark-sql-cloudant.jar")
            .with(env::CLOUDANT_ACCOUNT, "acct.cloudant.com")
            .with(env::CLOUDANT_USER, "admin")
            .with(env::CLOUDANT_PASSWORD, "hunter2")
    }

    fn harness(&self, config: HarnessConfig) -> Harness {
        Harness::with_env(config, RuntimeEnv::capture(&self.env()))
    }

    fn application(&self) -> Harness {
        self.harness(HarnessConfig::application(self.scripts_root()))
    }

    fn schema(&self) -> Harness {
        self.harness(HarnessConfig::schema(self.scripts_root()))
    }
}

#[test]
fn test_application_script_that_succeeds() {
    let fx = Fixture::new();
    fx.add_script(TestMode::Application, "ok.sh", "echo 'Total # of rows in airportData: 13'\nexit 0\n");

    let outcome = expect_pass(fx.application().run_script("ok.sh"));
    assert_eq!(outcome, RunOutcome::Passed);
}

#[test]
fn test_application_success_ignores_stderr_noise() {
    let fx = Fixture::new();
    fx.add_script(TestMode::Application, "noisy.sh", "echo 'WARN NativeCodeLoader' >&2\nexit 0\n");

    assert_eq!(fx.application().run_script("noisy.sh").unwrap(), RunOutcome::Passed);
}

#[test]
fn test_application_script_that_fails() {
    let fx = Fixture::new();
    fx.add_script(TestMode::Application, "boom.sh", "printf boom >&2\nexit 1\n");

    let err = fx.application().run_script("boom.sh").unwrap_err();
    assert_eq!(err.to_string(), "boom");
    assert!(matches!(err, HarnessError::ScriptFailed { exit_code: 1, .. }));
}

#[test]
#[should_panic(expected = "boom")]
fn test_expect_pass_fails_the_calling_test() {
    let fx = Fixture::new();
    fx.add_script(TestMode::Application, "boom.sh", "printf boom >&2\nexit 1\n");

    expect_pass(fx.application().run_script("boom.sh"));
}

#[test]
fn test_missing_script_is_a_nonzero_exit() {
    let fx = Fixture::new();
    let err = fx.application().run_script("DoesNotExist.py").unwrap_err();
    assert!(matches!(err, HarnessError::ScriptFailed { .. }));
}

#[test]
fn test_schema_returns_exit_code_and_streams() {
    let fx = Fixture::new();
    fx.add_script(TestMode::Schema, "x.sh", "echo X\nexit 2\n");

    let result = fx.schema().run_script("x.sh").unwrap().into_result().unwrap();
    assert_eq!(result.into_parts(), (2, "X\n".to_string(), String::new()));
}

#[test]
fn test_schema_script_exit_zero() {
    let fx = Fixture::new();
    fx.add_script(TestMode::Schema, "zero.sh", "exit 0\n");

    let (code, _, _) = fx.schema().run_script("zero.sh").unwrap().into_result().unwrap().into_parts();
    assert_eq!(code, 0);
}

#[test]
fn test_submitter_receives_command_contract() {
    let fx = Fixture::new();
    let echo_submit = fx.write_executable("bin/echo-submit", "#!/bin/sh\nprintf '%s\\n' \"$@\"\n");
    let invocation = ScriptInvocation::new("Args.py")
        .with_submitter(&echo_submit)
        .with_arg("--name", "smoke");

    let result = fx.schema().run(&invocation).unwrap().into_result().unwrap();
    let script = fx.scripts_root().join("schema").join("Args.py");
    let expected = format!(
        "--master\nlocal[4]\n--jars\n/jars/spark-sql-cloudant.jar\n--name\nsmoke\n{}\n",
        script.display()
    );
    assert_eq!(result.stdout, expected);
}

#[test]
fn test_child_sees_engine_config_and_runtime_libraries() {
    let fx = Fixture::new();
    fx.add_script(
        TestMode::Schema,
        "env.sh",
        "printf '%s|%s|%s\\n' \"$CLOUDANT_ACCOUNT\" \"$CLOUDANT_USER\" \"$CLOUDANT_PASSWORD\"\nprintf '%s' \"$PYTHONPATH\"\n",
    );

    let result = fx.schema().run_script("env.sh").unwrap().into_result().unwrap();
    let mut lines = result.stdout.lines();
    assert_eq!(lines.next(), Some("acct.cloudant.com|admin|hunter2"));

    let spark = fx.path().join("spark");
    let python_path: Vec<PathBuf> = std::env::split_paths(lines.next().unwrap()).collect();
    assert_eq!(python_path[0], spark.join("python"));
    assert_eq!(python_path[1], spark.join("python/lib/py4j-0.8.2.1-src.zip"));
}

#[test]
fn test_missing_spark_home_fails_before_spawn() {
    let fx = Fixture::new();
    let mut env = fx.env();
    env.remove(env::SPARK_HOME);
    let harness = Harness::with_env(HarnessConfig::application(fx.scripts_root()), RuntimeEnv::capture(&env));

    let err = harness.run_script("ok.sh").unwrap_err();
    assert_eq!(err.to_string(), "Environment variable SPARK_HOME not set");
    match err {
        HarnessError::Configuration { help, .. } => assert_eq!(help.as_deref(), Some("export SPARK_HOME")),
        other => panic!("expected configuration error, got {:?}", other),
    }
}

#[test]
fn test_unlaunchable_submitter() {
    let fx = Fixture::new();
    let invocation = ScriptInvocation::new("ok.sh").with_submitter(fx.path().join("no-such-submit"));

    let err = fx.application().run(&invocation).unwrap_err();
    assert!(matches!(err, HarnessError::Execution(ExecutionError::Launch { .. })));
}

#[test]
fn test_timeout_kills_hung_script() {
    let fx = Fixture::new();
    fx.add_script(TestMode::Application, "hang.sh", "exec sleep 30\n");
    let harness = fx.harness(HarnessConfig::application(fx.scripts_root()).with_timeout(Duration::from_millis(300)));

    let err = harness.run_script("hang.sh").unwrap_err();
    assert!(matches!(err, HarnessError::Execution(ExecutionError::Timeout { .. })));
}

#[test]
fn test_timeout_reaches_processes_forked_by_the_submitter() {
    let fx = Fixture::new();
    // The submitter forks a shell for the script, which forks `sleep`; both inherit the output pipes.
    fx.write_executable(
        "bin/forking-submit",
        "#!/bin/sh\nfor arg; do script=\"$arg\"; done\nsh \"$script\"\nexit $?\n",
    );
    fx.add_script(TestMode::Application, "hang.sh", "echo 'connecting to cloudant'\nsleep 30\necho done\n");
    let harness = fx.harness(HarnessConfig::application(fx.scripts_root()).with_timeout(Duration::from_millis(300)));
    let invocation = ScriptInvocation::new("hang.sh").with_submitter(fx.path().join("bin/forking-submit"));

    let start = Instant::now();
    let err = harness.run(&invocation).unwrap_err();
    assert!(start.elapsed() < Duration::from_secs(10), "took {:?}", start.elapsed());
    match err {
        HarnessError::Execution(timeout @ ExecutionError::Timeout { .. }) => {
            assert_eq!(timeout.partial_output(), Some(("connecting to cloudant\n", "")));
        }
        other => panic!("expected timeout, got {:?}", other),
    }
}

#[test]
fn test_discovery_lists_mode_scripts() {
    let fx = Fixture::new();
    fx.add_script(TestMode::Application, "b.py", "");
    fx.add_script(TestMode::Application, "a.py", "");
    fx.add_script(TestMode::Schema, "s.py", "");

    assert_eq!(discover_scripts(&fx.application()).unwrap(), vec!["a.py", "b.py"]);
    assert_eq!(discover_scripts(&fx.schema()).unwrap(), vec!["s.py"]);
}
