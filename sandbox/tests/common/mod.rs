//! Shared test helpers for integration tests.
//!
//! Provides a fake native engine (an in-memory namespace instead of a real
//! interpreter state), a fake loader hook, resource fixtures, and config
//! builders used across all integration test files.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use luabox_engine::{
    EngineError, EngineInstance, EngineLoader, NativeEngine, SharedRng, StdModule,
};
use luabox_sandbox::{
    Arch, Bitness, BootstrapConfig, MemResources, OsFamily, PlatformDescriptor,
};

/// Resource name resolved for the [`linux64`] descriptor.
pub const LINUX64_RESOURCE: &str = "native.64.linux.so";

// ── Fake engine ──

/// Representative symbols each standard module publishes, including the
/// legacy globals the capability policy must remove afterwards.
pub fn module_symbols(module: StdModule) -> &'static [&'static str] {
    match module {
        StdModule::Base => &[
            "print", "pairs", "tostring", "load",
            "unpack", "loadstring", "dofile", "loadfile",
        ],
        StdModule::Bit32 => &["bit32", "bit32.band", "bit32.bor"],
        StdModule::Coroutine => &["coroutine", "coroutine.create", "coroutine.resume"],
        StdModule::Debug => &["debug", "debug.traceback"],
        StdModule::Eris => &["eris", "eris.persist", "eris.unpersist"],
        StdModule::Math => &["math", "math.floor", "math.log10", "math.random", "math.randomseed"],
        StdModule::Str => &["string", "string.format", "string.rep"],
        StdModule::Table => &["table", "table.insert", "table.maxn"],
    }
}

/// Fake interpreter state: a set of bound global paths.
#[derive(Debug, Default)]
pub struct FakeInstance {
    pub bound: BTreeSet<String>,
    pub reserved: BTreeSet<String>,
    pub rng: Option<SharedRng>,
    pub chunks: Vec<String>,
}

impl EngineInstance for FakeInstance {
    fn open_module(&mut self, module: StdModule) -> Result<(), EngineError> {
        for symbol in module_symbols(module) {
            self.bound.insert(symbol.to_string());
        }
        Ok(())
    }

    fn reserve_namespace(&mut self, name: &str) -> Result<(), EngineError> {
        self.bound.insert(name.to_string());
        self.reserved.insert(name.to_string());
        Ok(())
    }

    fn clear_global(&mut self, path: &str) -> Result<(), EngineError> {
        self.bound.remove(path);
        if !path.contains('.') {
            // Rebinding a table global to nil takes its members with it.
            let prefix = format!("{}.", path);
            self.bound.retain(|p| !p.starts_with(&prefix));
        }
        Ok(())
    }

    fn install_random(&mut self, rng: SharedRng) -> Result<(), EngineError> {
        if !self.bound.contains("math") {
            return Err(EngineError::Runtime(
                "math module must be loaded before installing randomness".to_string(),
            ));
        }
        self.bound.insert("math.random".to_string());
        self.bound.insert("math.randomseed".to_string());
        self.rng = Some(rng);
        Ok(())
    }

    fn eval(&mut self, chunk: &str) -> Result<(), EngineError> {
        self.chunks.push(chunk.to_string());
        Ok(())
    }

    fn global_exists(&mut self, path: &str) -> Result<bool, EngineError> {
        Ok(self.bound.contains(path))
    }
}

/// Fake engine that hands out [`FakeInstance`]s, optionally failing after
/// a fixed number of successful allocations.
pub struct FakeEngine {
    remaining: AtomicUsize,
    pub limits_seen: Mutex<Vec<Option<u64>>>,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            remaining: AtomicUsize::new(usize::MAX),
            limits_seen: Mutex::new(Vec::new()),
        })
    }

    /// Allow exactly `n` successful instance allocations, then fail.
    pub fn failing_after(n: usize) -> Arc<Self> {
        Arc::new(Self {
            remaining: AtomicUsize::new(n),
            limits_seen: Mutex::new(Vec::new()),
        })
    }
}

impl NativeEngine for FakeEngine {
    fn new_instance(
        &self,
        memory_limit: Option<u64>,
    ) -> Result<Box<dyn EngineInstance>, EngineError> {
        self.limits_seen.lock().unwrap().push(memory_limit);
        let remaining = self.remaining.load(Ordering::SeqCst);
        if remaining == 0 {
            return Err(EngineError::OutOfMemory);
        }
        if remaining != usize::MAX {
            self.remaining.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(Box::new(FakeInstance::default()))
    }
}

/// Fake loader hook. Records the path it was asked to load.
pub struct FakeLoader {
    pub fail_link: bool,
    pub engine: Arc<FakeEngine>,
    pub loaded_from: Mutex<Option<PathBuf>>,
}

impl FakeLoader {
    pub fn new() -> Self {
        Self {
            fail_link: false,
            engine: FakeEngine::new(),
            loaded_from: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_link: true,
            engine: FakeEngine::new(),
            loaded_from: Mutex::new(None),
        }
    }

    pub fn with_engine(engine: Arc<FakeEngine>) -> Self {
        Self {
            fail_link: false,
            engine,
            loaded_from: Mutex::new(None),
        }
    }
}

impl EngineLoader for FakeLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn NativeEngine>, EngineError> {
        if self.fail_link {
            return Err(EngineError::MissingSymbol("luaL_newstate".to_string()));
        }
        *self.loaded_from.lock().unwrap() = Some(path.to_path_buf());
        let engine: Arc<dyn NativeEngine> = self.engine.clone();
        Ok(engine)
    }
}

// ── Fixtures ──

/// A 64-bit x86 Linux host, the most common supported triple.
pub fn linux64() -> PlatformDescriptor {
    PlatformDescriptor {
        os_family: OsFamily::Linux,
        arch: Arch::X86,
        bitness: Bitness::B64,
        os_version: None,
    }
}

/// A platform with no native binary.
pub fn unsupported_platform() -> PlatformDescriptor {
    PlatformDescriptor {
        os_family: OsFamily::Other,
        arch: Arch::Other,
        bitness: Bitness::B64,
        os_version: None,
    }
}

/// Bundled resources holding one linux64 binary with the given bytes.
pub fn bundled(bytes: &[u8]) -> MemResources {
    let mut resources = MemResources::new();
    resources.insert(LINUX64_RESOURCE, bytes.to_vec());
    resources
}

/// Config pointed at an isolated cache directory. Also installs the test
/// tracing subscriber so `RUST_LOG` makes degradation events visible.
pub fn test_config(cache_dir: &Path) -> BootstrapConfig {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
    BootstrapConfig {
        cache_dir: cache_dir.to_path_buf(),
        version_tag: "test".to_string(),
        ..BootstrapConfig::default()
    }
}
