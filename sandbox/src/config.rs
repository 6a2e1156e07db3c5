//! Bootstrap configuration.
//!
//! All inputs are read once, before initialization; nothing here is
//! consulted again afterwards.

use std::env;
use std::path::PathBuf;

/// Configuration for [`Bootstrap::initialize`](crate::Bootstrap::initialize).
#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    /// Forced native-library resource name. Overrides platform resolution
    /// entirely when set.
    pub forced_library_name: Option<String>,

    /// Attempt the native load even on known end-of-life OS releases.
    pub always_attempt_load: bool,

    /// Honor caller-supplied per-instance memory ceilings. When false,
    /// ceilings passed to `create_instance` are ignored.
    pub enable_memory_limit: bool,

    /// Log load-probe failures at warn instead of debug.
    pub verbose_load_errors: bool,

    /// Writable cache directory for the staged binary.
    /// Defaults to the platform temp directory.
    pub cache_dir: PathBuf,

    /// Product+version tag baked into the cache file name, isolating the
    /// cache across upgrades.
    pub version_tag: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            forced_library_name: None,
            always_attempt_load: false,
            enable_memory_limit: true,
            verbose_load_errors: false,
            cache_dir: env::temp_dir(),
            version_tag: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl BootstrapConfig {
    /// Build a config from `LUABOX_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(name) = env::var("LUABOX_FORCE_NATIVE_LIB") {
            if !name.is_empty() {
                config.forced_library_name = Some(name);
            }
        }
        config.always_attempt_load = env_flag("LUABOX_FORCE_NATIVE_LOAD");
        if env_flag("LUABOX_DISABLE_MEMORY_LIMIT") {
            config.enable_memory_limit = false;
        }
        config.verbose_load_errors = env_flag("LUABOX_VERBOSE_LOAD_ERRORS");
        if let Ok(dir) = env::var("LUABOX_CACHE_DIR") {
            if !dir.is_empty() {
                config.cache_dir = PathBuf::from(dir);
            }
        }
        config
    }
}

fn env_flag(name: &str) -> bool {
    matches!(
        env::var(name).ok().as_deref(),
        Some("1") | Some("true") | Some("yes")
    )
}
