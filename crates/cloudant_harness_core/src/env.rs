//! Environment-variable vocabulary and the [`Environment`] abstraction.
//!
//! The harness requires five variables. Keeping their names here means the resolver, the harness, the CLI help
//! text and the tests all agree on the same spelling.

use std::collections::BTreeMap;

/// Installation root of the query engine runtime. The submitter lives at `<SPARK_HOME>/bin/spark-submit`.
pub const SPARK_HOME: &str = "SPARK_HOME";
/// Path to the connector jar archive handed to the submitter with `--jars`.
pub const CONNECTOR_JAR: &str = "CONNECTOR_JAR";
/// Cloudant endpoint (account host).
pub const CLOUDANT_ACCOUNT: &str = "CLOUDANT_ACCOUNT";
/// Cloudant account name.
pub const CLOUDANT_USER: &str = "CLOUDANT_USER";
/// Cloudant credential.
pub const CLOUDANT_PASSWORD: &str = "CLOUDANT_PASSWORD";

/// Module search path of the engine's Python bindings. Optional; extended for each child process.
pub const PYTHONPATH: &str = "PYTHONPATH";

/// Every required variable, in the order they are documented.
pub const ALL_VARIABLES: [&str; 5] = [SPARK_HOME, CONNECTOR_JAR, CLOUDANT_ACCOUNT, CLOUDANT_USER, CLOUDANT_PASSWORD];

/// Read-only view of an environment.
pub trait Environment {
    /// Value of `name`, or `None` when unset.
    fn var(&self, name: &str) -> Option<String>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var_os(name).map(|value| value.to_string_lossy().into_owned())
    }
}

/// In-memory environment, used to inject fake settings without mutating process state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapEnv {
    vars: BTreeMap<String, String>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.vars.remove(name)
    }
}

impl Environment for MapEnv {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapEnv {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}
