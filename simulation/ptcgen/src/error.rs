//! Error handling for definition and world construction

use thiserror::Error;

/// Errors raised while building definitions, configuration or sandbox worlds
///
/// The per-tick simulation never returns these: failures during a tick
/// degrade to "no effect" and are logged instead.
#[derive(Debug, Error)]
pub enum PtcError {
    /// A generator definition failed validation
    #[error("Invalid definition '{name}': {reason}")]
    InvalidDefinition {
        /// Name of the offending definition
        name: String,
        /// What was wrong with it
        reason: String,
    },

    /// A definition was looked up by a name that does not exist
    #[error("Unknown definition: {0}")]
    UnknownDefinition(String),

    /// Map geometry could not be built
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Configuration values are out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PtcError {
    pub(crate) fn definition(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Type alias for Results from ptcgen operations
pub type Result<T> = std::result::Result<T, PtcError>;
