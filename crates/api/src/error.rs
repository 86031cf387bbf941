use std::path::PathBuf;

/// Startup configuration errors.
///
/// Raised while reading environment variables or the options document. The
/// binary treats any of these as fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is unset or empty.
    #[error("{0} must be set in the environment")]
    Missing(&'static str),

    /// An environment variable could not be parsed.
    #[error("{name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    /// The options document could not be read.
    #[error("Failed to read options document {}: {source}", path.display())]
    OptionsRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The options document is not valid JSON.
    #[error("Options document {} is not valid JSON: {source}", path.display())]
    OptionsParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}
