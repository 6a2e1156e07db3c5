//! `luabox-sandbox` — bootstrap for sandboxed embedded-Lua interpreter
//! instances executing untrusted guest programs inside a host process.
//!
//! This crate solves two problems:
//!
//! - **Native staging & loading:** cross-platform resolution of the bundled
//!   native engine binary, idempotent staging to a writable cache path with
//!   streaming integrity comparison, and a single ordering-safe dynamic
//!   load through an injected loader hook, verified by a one-time probe
//! - **Capability construction:** every instance gets an explicit module
//!   allow-list, a deny-list of legacy/unsafe globals, one reserved empty
//!   namespace, and private deterministic randomness — guest code cannot
//!   touch the filesystem, the host's randomness, or removed legacy APIs
//!
//! The primary entry points are [`Bootstrap::initialize`],
//! [`Bootstrap::is_available`], and [`Bootstrap::create_instance`].

pub mod error;
pub mod config;
pub mod platform;
pub mod resources;
pub mod staging;
pub mod policy;
pub mod bootstrap;

pub use error::SandboxError;
pub use config::BootstrapConfig;
pub use platform::{Arch, Bitness, OsFamily, PlatformDescriptor};
pub use resources::{DirResources, MemResources, ResourceProvider};
pub use staging::StagedLibrary;
pub use policy::CapabilityPolicy;
pub use bootstrap::{Bootstrap, ScriptHandle};
