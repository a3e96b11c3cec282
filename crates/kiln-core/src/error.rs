//! Error types for kiln-core

use thiserror::Error;

/// Core error type for Kiln
#[derive(Error, Debug)]
pub enum CoreError {
    /// E001: Configuration file not found
    #[error("[E001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// E002: Failed to parse configuration file
    #[error("[E002] Failed to parse config: {message}")]
    ConfigParseError { message: String },

    /// E004: Project directory not found
    #[error("[E004] Project directory not found: {path}")]
    ProjectNotFound { path: String },

    /// E005: Model not registered
    #[error("[E005] Model not found: {name}")]
    ModelNotFound { name: String },

    /// E007: Circular dependency detected
    #[error("[E007] Circular dependency detected: {cycle}")]
    CircularDependency { cycle: String },

    /// E008: Duplicate model name
    #[error("[E008] Duplicate model name: {name}")]
    DuplicateModel { name: String },

    /// E009: Model lists itself as a dependency
    #[error("[E009] Model '{name}' depends on itself")]
    SelfDependency { name: String },

    /// E010: Materialization kind is not one Kiln knows how to build
    #[error("[E010] Invalid materialization '{kind}'. Valid kinds: {valid}")]
    UnknownMaterialization { kind: String, valid: String },

    /// E011: Empty identifier where a name is required
    #[error("[E011] Empty name: {context}")]
    EmptyName { context: String },

    /// E014: IO error
    #[error("[E014] IO error: {0}")]
    Io(#[from] std::io::Error),

    /// E016: IO error with file path context
    #[error("[E016] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// E015: YAML parse error
    #[error("[E015] YAML parse error in {path}: {source}")]
    YamlParse {
        path: String,
        source: serde_yaml::Error,
    },
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
