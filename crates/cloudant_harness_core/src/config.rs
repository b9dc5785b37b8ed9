//! Engine configuration and the runtime environment snapshot.
//!
//! [`RuntimeEnv`] is captured once when a harness is built and then passed around by value. Required settings are
//! checked where they are used, so a harness that only ever runs with an explicit submitter never needs
//! `SPARK_HOME`.

use std::fmt;
use std::path::PathBuf;

use crate::env::{self, Environment};
use crate::errors::ConfigurationError;

/// Engine property key for the Cloudant endpoint.
pub const HOST_PROPERTY: &str = "cloudant.host";
/// Engine property key for the Cloudant account name.
pub const USERNAME_PROPERTY: &str = "cloudant.username";
/// Engine property key for the Cloudant credential.
pub const PASSWORD_PROPERTY: &str = "cloudant.password";

/// Connection settings handed to the external engine.
#[derive(Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub host: String,
    pub username: String,
    pub password: String,
}

impl EngineConfig {
    /// Build the engine configuration from `env`.
    ///
    /// ## Parameters
    /// - `env`: the environment to read `CLOUDANT_ACCOUNT`, `CLOUDANT_USER` and `CLOUDANT_PASSWORD` from.
    ///
    /// ## Returns
    /// - (`EngineConfig`): all three values, unmodified.
    ///
    /// ## Errors
    /// - [`ConfigurationError::MissingVariable`] naming the first variable that is unset or empty.
    pub fn from_env(env: &dyn Environment) -> Result<Self, ConfigurationError> {
        Ok(Self {
            host: required(env, env::CLOUDANT_ACCOUNT)?,
            username: required(env, env::CLOUDANT_USER)?,
            password: required(env, env::CLOUDANT_PASSWORD)?,
        })
    }

    /// Engine properties, in the form a `SparkConf` expects them.
    pub fn properties(&self) -> Vec<(&'static str, String)> {
        vec![
            (HOST_PROPERTY, self.host.clone()),
            (USERNAME_PROPERTY, self.username.clone()),
            (PASSWORD_PROPERTY, self.password.clone()),
        ]
    }

    /// The same settings keyed by their environment-variable names, for exporting into a child process.
    pub fn to_env_vars(&self) -> Vec<(&'static str, String)> {
        vec![
            (env::CLOUDANT_ACCOUNT, self.host.clone()),
            (env::CLOUDANT_USER, self.username.clone()),
            (env::CLOUDANT_PASSWORD, self.password.clone()),
        ]
    }
}

impl fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineConfig")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Snapshot of every harness-relevant variable, taken once.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct RuntimeEnv {
    spark_home: Option<PathBuf>,
    connector_jar: Option<PathBuf>,
    host: Option<String>,
    username: Option<String>,
    password: Option<String>,
    python_path: Option<String>,
}

impl RuntimeEnv {
    /// Capture the current values from `env`. Never fails; empty values are recorded as absent.
    pub fn capture(env: &dyn Environment) -> Self {
        Self {
            spark_home: non_empty(env, env::SPARK_HOME).map(PathBuf::from),
            connector_jar: non_empty(env, env::CONNECTOR_JAR).map(PathBuf::from),
            host: non_empty(env, env::CLOUDANT_ACCOUNT),
            username: non_empty(env, env::CLOUDANT_USER),
            password: non_empty(env, env::CLOUDANT_PASSWORD),
            python_path: non_empty(env, env::PYTHONPATH),
        }
    }

    /// Runtime installation root.
    pub fn spark_home(&self) -> Result<&PathBuf, ConfigurationError> {
        self.spark_home
            .as_ref()
            .ok_or(ConfigurationError::MissingVariable { name: env::SPARK_HOME })
    }

    /// Connector jar passed to the submitter with `--jars`.
    pub fn connector_jar(&self) -> Result<&PathBuf, ConfigurationError> {
        self.connector_jar
            .as_ref()
            .ok_or(ConfigurationError::MissingVariable { name: env::CONNECTOR_JAR })
    }

    /// Engine configuration. Recomputed on every call.
    pub fn engine_config(&self) -> Result<EngineConfig, ConfigurationError> {
        let pick = |value: &Option<String>, name: &'static str| {
            value.clone().ok_or(ConfigurationError::MissingVariable { name })
        };
        Ok(EngineConfig {
            host: pick(&self.host, env::CLOUDANT_ACCOUNT)?,
            username: pick(&self.username, env::CLOUDANT_USER)?,
            password: pick(&self.password, env::CLOUDANT_PASSWORD)?,
        })
    }

    /// Inherited module search path, if any.
    pub fn python_path(&self) -> Option<&str> {
        self.python_path.as_deref()
    }

    /// Names of the variables that are currently missing, in documentation order.
    pub fn missing_variables(&self) -> Vec<&'static str> {
        let present = [
            self.spark_home.is_some(),
            self.connector_jar.is_some(),
            self.host.is_some(),
            self.username.is_some(),
            self.password.is_some(),
        ];
        env::ALL_VARIABLES
            .iter()
            .zip(present)
            .filter(|(_, is_set)| !is_set)
            .map(|(name, _)| *name)
            .collect()
    }
}

impl fmt::Debug for RuntimeEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeEnv")
            .field("spark_home", &self.spark_home)
            .field("connector_jar", &self.connector_jar)
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("python_path", &self.python_path)
            .finish()
    }
}

fn non_empty(env: &dyn Environment, name: &str) -> Option<String> {
    env.var(name).filter(|value| !value.is_empty())
}

fn required(env: &dyn Environment, name: &'static str) -> Result<String, ConfigurationError> {
    non_empty(env, name).ok_or(ConfigurationError::MissingVariable { name })
}
