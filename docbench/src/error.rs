//! Errors raised while bootstrapping the host module.
//!
//! These are the only failures a host may reasonably treat as fatal: they
//! happen once, at startup, before any script runs.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModuleError {
    /// A module with the same name was registered earlier.
    #[error("Module already registered: {0}")]
    Duplicate(String),
    /// The module configuration could not be read.
    #[error("Configuration error: {0}")]
    Config(String),
    /// The async runtime backing blocking calls could not be started.
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

pub type ModuleResult<T> = Result<T, ModuleError>;

impl From<serde_json::Error> for ModuleError {
    fn from(err: serde_json::Error) -> Self {
        ModuleError::Config(err.to_string())
    }
}
