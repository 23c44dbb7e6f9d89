//! Shared configuration library for ido.
//!
//! Centralizes config defaults, TOML loading, and validation so the daemon
//! binary and embedding hosts agree on a single source of truth for the
//! recognised settings keys.

pub mod loader;
pub mod models;
pub mod validation;

pub use loader::{ConfigLoadError, ConfigLoader};
pub use models::{
    CaptureConfig, CleanupConfig, Config, DatabaseConfig, ImageConfig,
    ImageOptimizationConfig, LlmConfig, LoggingConfig, ProcessingConfig,
    SessionConfig,
};
pub use validation::{ConfigWarning, validate};
