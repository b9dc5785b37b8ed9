#![forbid(unsafe_code)]
//! Cloudant connector integration-test harness
//!
//! Submits connector test scripts to the query engine with `spark-submit` and judges the outcome. Scripts live under
//! `<scripts_root>/cloudantapp/` (application tests) or `<scripts_root>/schema/` (schema tests).
//!
//! ```rust,no_run
//! use cloudant_harness::{Harness, HarnessConfig, expect_pass};
//!
//! let harness = Harness::new(HarnessConfig::application("python-tests/test-scripts"));
//! expect_pass(harness.run_script("SpecCharPredicate.py"));
//! ```
//!
//! ## Panic Policy
//!
//! - **Production code**: Use `Result` with `?` / `ok_or` / `map_err`. The `cli` module enforces
//!   `#![deny(clippy::unwrap_used)]`.
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests. [`expect_pass`] is the one deliberate panic:
//!   it is how a failing script fails the calling test.

pub mod cli;
pub mod discovery;
pub mod harness;
pub mod process;
pub mod version;

pub use cloudant_harness_core::{ConfigurationError, EngineConfig, Environment, MapEnv, ProcessEnv, RuntimeEnv};

pub use harness::{
    Harness, HarnessConfig, HarnessError, HarnessResult, RunOutcome, RunOverrides, ScriptInvocation, Submitter,
    TestMode, expect_pass,
};
pub use process::{ExecutionError, ProcessResult, ScriptExecutor, SubmitCommand, SystemExecutor};
