//! The capability policy applied to every fresh interpreter instance.
//!
//! The policy is a fixed, totally ordered list of operations and is
//! idempotent: applying it twice to equivalent fresh instances yields
//! equivalent capability surfaces.
//!
//! Order of application:
//! 1. load the explicit module allow-list — nothing else is ever opened,
//!    so symbols of other bundled modules (io, os, package) never exist
//! 2. reserve the empty `os` namespace for host-feature APIs installed
//!    later, outside this crate
//! 3. rebind legacy/unsafe globals to nil so lookups fail cleanly
//! 4. replace the engine randomness with the instance-private generator

use luabox_engine::{EngineError, EngineInstance, SharedRng, StdModule};

/// Modules a sandboxed instance is allowed to load, in load order.
const ALLOWED_MODULES: &[StdModule] = &[
    StdModule::Base,
    StdModule::Bit32,
    StdModule::Coroutine,
    StdModule::Debug,
    StdModule::Eris,
    StdModule::Math,
    StdModule::Str,
    StdModule::Table,
];

/// Namespaces reserved empty for the embedding host.
const RESERVED_NAMESPACES: &[&str] = &["os"];

/// Legacy/unsafe globals rebound to nil: the legacy variadic unpack, the
/// legacy load-from-string, the base-10 log helper, the table-length
/// compatibility helper, and the filesystem-path loaders.
const REMOVED_GLOBALS: &[&str] = &[
    "unpack",
    "loadstring",
    "math.log10",
    "table.maxn",
    "dofile",
    "loadfile",
];

/// The fixed allow-list/deny-list/replacement rules for fresh instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct CapabilityPolicy;

impl CapabilityPolicy {
    /// Apply the policy to a fresh instance, installing `rng` as its
    /// private randomness source.
    ///
    /// On error the caller discards the partially built instance.
    pub fn apply(
        &self,
        instance: &mut dyn EngineInstance,
        rng: SharedRng,
    ) -> Result<(), EngineError> {
        for &module in ALLOWED_MODULES {
            instance.open_module(module)?;
        }
        for namespace in RESERVED_NAMESPACES {
            instance.reserve_namespace(namespace)?;
        }
        for global in REMOVED_GLOBALS {
            instance.clear_global(global)?;
        }
        instance.install_random(rng)?;
        Ok(())
    }

    /// The module allow-list, in application order.
    pub fn allowed_modules(&self) -> &'static [StdModule] {
        ALLOWED_MODULES
    }

    /// Namespaces reserved empty for the embedding host.
    pub fn reserved_namespaces(&self) -> &'static [&'static str] {
        RESERVED_NAMESPACES
    }

    /// Globals rebound to nil.
    pub fn removed_globals(&self) -> &'static [&'static str] {
        REMOVED_GLOBALS
    }
}
