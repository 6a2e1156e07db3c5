//! Sandbox error taxonomy.
//!
//! Propagation rules:
//! - `UnsupportedPlatform` / `ResourceMissing` permanently leave the
//!   bootstrap unavailable for the process lifetime
//! - `StagingIo` is recoverable: it is logged and staging proceeds with
//!   whatever currently occupies the cache path
//! - `LinkFailure` during the one-time probe is permanent; during a later
//!   per-call instance creation it is local and transient
//! - `InstanceCreation` discards the partial instance and fails only that
//!   call
//!
//! Nothing here crashes the process; the embedding host degrades
//! gracefully whenever availability is false or instance creation fails.

use luabox_engine::EngineError;

/// Top-level error type for the sandbox bootstrap.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// No native binary exists for this OS/arch/bitness combination.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// The resolved native binary is not present in the bundled resources.
    #[error("bundled native library not found: {0}")]
    ResourceMissing(String),

    /// I/O failure while staging the native binary (recoverable).
    #[error("staging failure: {0}")]
    StagingIo(#[from] std::io::Error),

    /// The native engine failed to load or initialize.
    #[error("link failure: {0}")]
    LinkFailure(#[from] EngineError),

    /// Applying the capability policy to a fresh instance failed.
    #[error("instance creation failed: {0}")]
    InstanceCreation(String),
}
