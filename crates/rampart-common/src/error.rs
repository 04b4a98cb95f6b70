//! Error types for Rampart.

use thiserror::Error;

/// Top-level error type for Rampart operations.
#[derive(Debug, Error)]
pub enum RampartError {
    /// Content template errors
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading or validating combat content.
///
/// These are always load-time failures; nothing at resolution time
/// produces a `TemplateError`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// A stat appears twice in one template
    #[error("Stat {stat} appears more than once in template '{template}'")]
    DuplicateStat {
        /// Template name
        template: String,
        /// Offending stat name
        stat: String,
    },

    /// Two templates share a name
    #[error("Duplicate stat template '{0}'")]
    DuplicateTemplate(String),

    /// Two status effect definitions share an id
    #[error("Duplicate status effect definition {0}")]
    DuplicateStatusEffect(String),

    /// Two attack templates share a name
    #[error("Duplicate attack template '{0}'")]
    DuplicateAttack(String),

    /// A reference to a template that does not exist
    #[error("Unknown template '{name}' referenced by {referenced_by}")]
    UnknownTemplate {
        /// Missing template name
        name: String,
        /// What referenced it
        referenced_by: String,
    },

    /// A reference to a status effect that has no definition
    #[error("Unknown status effect {effect} referenced by {referenced_by}")]
    UnknownStatusEffect {
        /// Missing effect id
        effect: String,
        /// What referenced it
        referenced_by: String,
    },

    /// A structural problem in the content
    #[error("Invalid content in {context}: {reason}")]
    Invalid {
        /// Where the problem was found
        context: String,
        /// What is wrong
        reason: String,
    },

    /// Content text failed to parse
    #[error("Failed to parse content: {0}")]
    Parse(String),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config text failed to parse
    #[error("Failed to parse config: {0}")]
    Parse(String),

    /// A config value is out of range
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },

    /// Config file could not be read or written
    #[error("Config IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Rampart operations.
pub type RampartResult<T> = Result<T, RampartError>;
