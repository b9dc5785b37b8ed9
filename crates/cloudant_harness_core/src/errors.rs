//! Configuration error type shared by the resolver and the harness.

use thiserror::Error;

/// A required setting could not be resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The named environment variable is unset or empty.
    #[error("Environment variable {name} not set")]
    MissingVariable { name: &'static str },

    /// A value derived for the named variable cannot be represented (for example a path containing the
    /// platform's path-list separator).
    #[error("Cannot build {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}
