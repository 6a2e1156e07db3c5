//! `luabox-engine` — binding layer over the platform-specific native Lua
//! engine used by the luabox sandbox.
//!
//! This crate defines the seams between the sandbox bootstrap and the
//! native scripting engine. It provides:
//!
//! - `EngineLoader` trait — the explicitly registered loader hook through
//!   which the one dynamic load is triggered
//! - `NativeEngine` / `EngineInstance` traits — engine and per-instance
//!   surfaces the capability policy is applied through
//! - `DlopenLoader` — production loader backed by `libloading`
//! - `StdModule` — the finite set of loadable standard modules
//! - `GuestRng` — deterministic per-instance randomness primitive
//! - `EngineError` — binding-layer error type
//!
//! The sandbox crate (`luabox-sandbox`) owns platform resolution, staging,
//! the load probe, and policy application; this crate only knows how to
//! load the engine and drive one interpreter state.

pub mod error;
pub mod modules;
pub mod rng;
pub mod traits;
pub mod ffi;
pub mod dlopen;

// Re-export commonly used types at the crate root.
pub use error::EngineError;
pub use modules::StdModule;
pub use rng::{GuestRng, SharedRng};
pub use traits::{EngineInstance, EngineLoader, NativeEngine};
pub use dlopen::DlopenLoader;
