//! Provide the environment vocabulary and configuration resolution shared by the Cloudant integration harness.
//!
//! This crate is intentionally small and dependency-light. It answers one question: given the state of an
//! environment, what settings does the harness and the external engine need?
//!
//! ## Notes
//!
//! - No process spawning, no filesystem access, no global state. Environment reads go through the [`Environment`]
//!   trait so tests can inject an in-memory map instead of touching the real process environment.
//! - Absence of a required variable is always a hard [`ConfigurationError`]; nothing substitutes a default.

pub mod config;
pub mod env;
pub mod errors;

pub use config::{EngineConfig, RuntimeEnv};
pub use env::{Environment, MapEnv, ProcessEnv};
pub use errors::ConfigurationError;
