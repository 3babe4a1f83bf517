//! Error types for archetype_bundle

use thiserror::Error;

/// Main error type for bundle operations
#[derive(Error, Debug)]
pub enum BundleError {
    #[error("Manifest not initialized: call initialize_manifest() and tick until it completes")]
    ManifestNotInitialized,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Manifest decode error: {0}")]
    ManifestDecode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for bundle operations
pub type Result<T> = std::result::Result<T, BundleError>;
