//! Settings errors.

/// Convenience alias.
pub type Result<T> = std::result::Result<T, SettingsError>;

/// Errors raised while loading or merging settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Settings file could not be read.
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file is not valid JSON or has the wrong shape.
    #[error("invalid settings JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// Home directory could not be resolved.
    #[error("cannot resolve home directory")]
    NoHome,
}
