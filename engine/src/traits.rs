//! Engine trait seams — loader hook, engine, and instance surfaces.
//!
//! The native library's own initialization references back into host
//! symbols, so the dynamic load must be triggered through exactly one
//! explicitly registered hook (`EngineLoader`), never as a side effect of
//! first touching a wrapper type. The sandbox bootstrap receives the hook
//! by injection and calls it once; tests inject a double.

use std::path::Path;
use std::sync::Arc;

use crate::error::EngineError;
use crate::modules::StdModule;
use crate::rng::SharedRng;

/// The explicitly registered loader hook.
///
/// `load` performs the one dynamic load of the staged native library and
/// returns the engine handle every later instance is created from.
pub trait EngineLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Arc<dyn NativeEngine>, EngineError>;
}

/// A loaded native engine. Creating instances is independently safe from
/// any thread; each instance is fully isolated from every other.
pub trait NativeEngine: Send + Sync {
    /// Allocate a fresh interpreter state.
    ///
    /// `memory_limit` is a byte ceiling enforced by the engine's own
    /// allocator; `None` leaves allocation unbounded.
    fn new_instance(
        &self,
        memory_limit: Option<u64>,
    ) -> Result<Box<dyn EngineInstance>, EngineError>;
}

/// One interpreter state.
///
/// A single instance is not safe for concurrent use; callers serialize
/// access or allocate one instance per worker. All mutation goes through
/// `&mut self`.
pub trait EngineInstance: Send {
    /// Load one allow-listed standard module into the instance.
    fn open_module(&mut self, module: StdModule) -> Result<(), EngineError>;

    /// Publish an empty table under a global name (a reserved namespace).
    fn reserve_namespace(&mut self, name: &str) -> Result<(), EngineError>;

    /// Rebind a global (or one dotted field, e.g. `math.log10`) to nil so
    /// lookups fail cleanly.
    fn clear_global(&mut self, path: &str) -> Result<(), EngineError>;

    /// Replace `math.random` / `math.randomseed` with fixed-signature
    /// native wrappers backed by the given per-instance generator.
    fn install_random(&mut self, rng: SharedRng) -> Result<(), EngineError>;

    /// Evaluate a chunk of guest code, discarding results.
    fn eval(&mut self, chunk: &str) -> Result<(), EngineError>;

    /// True if a global (or one dotted field) is currently bound to a
    /// non-nil value. Used by the host to audit the capability surface.
    fn global_exists(&mut self, path: &str) -> Result<bool, EngineError>;
}

/// Split a capability path into its global name and optional field.
///
/// Paths have at most one dot; deeper nesting is not part of the policy
/// language.
pub fn split_path(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((table, field)) => (table, Some(field)),
        None => (path, None),
    }
}
