//! Bootstrap — one-time native initialization and the per-call interpreter
//! factory.
//!
//! `Bootstrap::initialize` is the single-threaded initialization barrier:
//! resolve the platform, stage the native binary, trigger the one dynamic
//! load through the injected loader hook, and run the load probe. The
//! embedding host guarantees at-most-once execution. The resulting value
//! is immutable, safely readable from any thread, and passed explicitly to
//! every call site — availability never lives in a hidden global.
//!
//! Instance creation afterwards is independently thread-safe: every call
//! produces a fully isolated instance with its own namespace and its own
//! generator. A failure there is local to the call and never flips
//! process-wide availability.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::rngs::OsRng;
use rand::RngCore;
use tempfile::TempPath;
use tracing::{debug, warn};

use luabox_engine::{
    EngineError, EngineInstance, EngineLoader, GuestRng, NativeEngine, SharedRng,
};

use crate::config::BootstrapConfig;
use crate::error::SandboxError;
use crate::platform::PlatformDescriptor;
use crate::policy::CapabilityPolicy;
use crate::resources::ResourceProvider;
use crate::staging::{stage, StagedLibrary};

/// Process-wide availability state plus the interpreter factory.
pub struct Bootstrap {
    availability: Availability,
    enable_memory_limit: bool,
    policy: CapabilityPolicy,
}

enum Availability {
    Available {
        engine: Arc<dyn NativeEngine>,
        loaded_path: PathBuf,
        /// Best-effort deletion of the staged file when this bootstrap
        /// value is dropped. Embedders keep the bootstrap alive for the
        /// whole process, so in practice that is process exit; the loaded
        /// library itself stays mapped regardless, so an earlier drop
        /// only removes the on-disk copy.
        _cleanup: TempPath,
    },
    Unavailable,
}

impl Bootstrap {
    /// Resolve, stage, load, and probe the native engine — once.
    ///
    /// Never fails: every error degrades to an unavailable bootstrap and a
    /// human-readable log line. Not safe to race across threads; the host
    /// runs it behind a one-time-init guard.
    pub fn initialize(
        config: &BootstrapConfig,
        descriptor: &PlatformDescriptor,
        resources: &dyn ResourceProvider,
        loader: &dyn EngineLoader,
    ) -> Bootstrap {
        let availability = match init_native(config, descriptor, resources, loader) {
            Ok((engine, staged)) => {
                debug!(path = %staged.path.display(), "native engine loaded");
                Availability::Available {
                    engine,
                    _cleanup: TempPath::from_path(&staged.path),
                    loaded_path: staged.path,
                }
            }
            Err(e) => {
                match &e {
                    SandboxError::LinkFailure(_) if !config.verbose_load_errors => {
                        debug!(error = %e, "native engine unavailable");
                    }
                    _ => warn!(error = %e, "native engine unavailable"),
                }
                Availability::Unavailable
            }
        };
        Bootstrap {
            availability,
            enable_memory_limit: config.enable_memory_limit,
            policy: CapabilityPolicy,
        }
    }

    /// True if the native engine loaded and passed the probe.
    pub fn is_available(&self) -> bool {
        matches!(self.availability, Availability::Available { .. })
    }

    /// Path the native engine was loaded from, if available.
    pub fn loaded_path(&self) -> Option<&Path> {
        match &self.availability {
            Availability::Available { loaded_path, .. } => Some(loaded_path),
            Availability::Unavailable => None,
        }
    }

    /// Create one sandboxed interpreter instance.
    ///
    /// Returns `None` immediately when unavailable, and `None` on any
    /// per-call failure (logged); availability is untouched either way.
    pub fn create_instance(&self, memory_limit: Option<u64>) -> Option<ScriptHandle> {
        self.create_instance_with_seed(memory_limit, OsRng.next_u64())
    }

    /// Create an instance whose generator starts from an explicit seed.
    pub fn create_instance_with_seed(
        &self,
        memory_limit: Option<u64>,
        seed: u64,
    ) -> Option<ScriptHandle> {
        let Availability::Available { engine, .. } = &self.availability else {
            return None;
        };
        let limit = if self.enable_memory_limit {
            memory_limit
        } else {
            None
        };
        match build_instance(engine.as_ref(), &self.policy, limit, seed) {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!(error = %e, "instance creation failed");
                None
            }
        }
    }
}

fn init_native(
    config: &BootstrapConfig,
    descriptor: &PlatformDescriptor,
    resources: &dyn ResourceProvider,
    loader: &dyn EngineLoader,
) -> Result<(Arc<dyn NativeEngine>, StagedLibrary), SandboxError> {
    let resource_name = descriptor
        .resolve(
            config.forced_library_name.as_deref(),
            config.always_attempt_load,
        )
        .ok_or_else(|| {
            SandboxError::UnsupportedPlatform(format!(
                "{:?}/{:?}/{:?}",
                descriptor.os_family, descriptor.arch, descriptor.bitness
            ))
        })?;

    let staged = stage(
        resources,
        &resource_name,
        &config.cache_dir,
        &config.version_tag,
    )?;

    // The one dynamic load, through the registered hook.
    let engine = match loader.load(&staged.path) {
        Ok(engine) => engine,
        Err(e) => {
            discard_staged(&staged.path);
            return Err(e.into());
        }
    };

    // Load probe: a throwaway instance confirms the library initializes.
    // Runs at most once per process; failure means the staged file is
    // corrupt or incompatible.
    match engine.new_instance(None) {
        Ok(probe) => drop(probe),
        Err(e) => {
            discard_staged(&staged.path);
            return Err(e.into());
        }
    }

    Ok((engine, staged))
}

fn discard_staged(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        debug!(path = %path.display(), error = %e, "cannot delete staged library");
    }
}

fn build_instance(
    engine: &dyn NativeEngine,
    policy: &CapabilityPolicy,
    memory_limit: Option<u64>,
    seed: u64,
) -> Result<ScriptHandle, SandboxError> {
    let mut instance = engine.new_instance(memory_limit)?;
    let rng = GuestRng::from_seed(seed).shared();
    policy
        .apply(instance.as_mut(), rng.clone())
        .map_err(|e| SandboxError::InstanceCreation(e.to_string()))?;
    Ok(ScriptHandle { instance, rng })
}

/// One sandboxed interpreter instance.
///
/// Owns its interpreter state, its private generator, and its global
/// namespace; nothing is shared across instances. Not for concurrent use
/// by multiple threads; disposal is explicit via [`release`](Self::release).
pub struct ScriptHandle {
    instance: Box<dyn EngineInstance>,
    rng: SharedRng,
}

impl ScriptHandle {
    /// Evaluate a chunk of guest code (the engine's standard evaluation
    /// surface, opaque to this crate).
    pub fn eval(&mut self, chunk: &str) -> Result<(), EngineError> {
        self.instance.eval(chunk)
    }

    /// True if a global (or one dotted field) is bound to a non-nil value.
    pub fn global_exists(&mut self, path: &str) -> Result<bool, EngineError> {
        self.instance.global_exists(path)
    }

    /// Host-side view of the instance generator: uniform real in [0, 1).
    pub fn random_real(&self) -> f64 {
        self.lock_rng().next_real()
    }

    /// Host-side view: uniform integer in [1, n]; argument error if n < 1.
    pub fn random_up_to(&self, n: i64) -> Result<i64, EngineError> {
        self.lock_rng().next_up_to(n)
    }

    /// Host-side view: uniform integer in [lo, hi]; argument error if
    /// lo > hi.
    pub fn random_range(&self, lo: i64, hi: i64) -> Result<i64, EngineError> {
        self.lock_rng().next_range(lo, hi)
    }

    /// Reseed the instance generator; subsequent output is a deterministic
    /// function of `seed`. Only this instance is affected.
    pub fn reseed(&self, seed: i64) {
        self.lock_rng().reseed(seed);
    }

    /// Explicitly release the instance and everything it owns.
    pub fn release(self) {
        drop(self);
    }

    fn lock_rng(&self) -> std::sync::MutexGuard<'_, GuestRng> {
        match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
