//! Native-library staging — copies the bundled binary to a writable cache
//! path so the OS loader can open it.
//!
//! Staging is idempotent and resumable:
//!
//! 1. An existing cache file is compared against the bundled resource with
//!    a streaming, lock-step byte comparison (bounded memory, stops at the
//!    first mismatch or dual EOF). Identical files are reused without a
//!    copy.
//! 2. A stale file is deleted before re-copying; deletion failure (the
//!    file may be memory-mapped by another live process) is logged and
//!    explicitly non-fatal.
//! 3. Copy failures are logged at low severity and staging proceeds with
//!    whatever currently occupies the cache path — the downstream load
//!    probe is the real correctness check.
//!
//! The cache path is deterministic (`luabox-<version_tag>-<resource>`),
//! guaranteeing isolation across product versions.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::SandboxError;
use crate::resources::ResourceProvider;

/// Prefix of every staged cache file.
const CACHE_PREFIX: &str = "luabox";

/// Comparison/copy chunk size.
const CHUNK_SIZE: usize = 8 * 1024;

/// A staged native library on disk.
#[derive(Debug, Clone)]
pub struct StagedLibrary {
    /// The bundled resource this file was staged from.
    pub resource_name: String,
    /// Deterministic cache path the OS loader can open.
    pub path: PathBuf,
    /// Product+version tag baked into the path.
    pub version_tag: String,
    /// True if an identical cache file was reused without copying.
    pub reused: bool,
}

/// The deterministic cache path for a resource under a version tag.
pub fn cache_path(cache_dir: &Path, version_tag: &str, resource_name: &str) -> PathBuf {
    cache_dir.join(format!("{}-{}-{}", CACHE_PREFIX, version_tag, resource_name))
}

/// Stage the named bundled resource into the cache directory.
///
/// Fails only when the resource itself is missing; every I/O problem on
/// the cache side is logged and staging continues best-effort.
pub fn stage(
    resources: &dyn ResourceProvider,
    resource_name: &str,
    cache_dir: &Path,
    version_tag: &str,
) -> Result<StagedLibrary, SandboxError> {
    let mut bundled = resources
        .open(resource_name)
        .ok_or_else(|| SandboxError::ResourceMissing(resource_name.to_string()))?;

    if let Err(e) = fs::create_dir_all(cache_dir) {
        warn!(dir = %cache_dir.display(), error = %e, "cannot create cache directory");
    }
    let path = cache_path(cache_dir, version_tag, resource_name);

    if path.exists() {
        let identical = match File::open(&path) {
            Ok(existing) => match streams_equal(&mut bundled, existing) {
                Ok(identical) => identical,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "cache comparison failed");
                    false
                }
            },
            Err(e) => {
                debug!(path = %path.display(), error = %e, "cannot open cached library");
                false
            }
        };

        if identical {
            debug!(path = %path.display(), "reusing identical cached native library");
            return Ok(StagedLibrary {
                resource_name: resource_name.to_string(),
                path,
                version_tag: version_tag.to_string(),
                reused: true,
            });
        }

        // The stale file may still be mapped by another live process;
        // failing to delete it is non-fatal.
        if let Err(e) = fs::remove_file(&path) {
            warn!(path = %path.display(), error = %e, "cannot delete stale cached library");
        }
    }

    // The comparison consumed the bundled reader; reopen for the copy.
    match resources.open(resource_name) {
        Some(mut fresh) => {
            if let Err(e) = copy_to(&mut *fresh, &path) {
                warn!(path = %path.display(), error = %e, "staging copy failed");
            }
        }
        None => {
            return Err(SandboxError::ResourceMissing(resource_name.to_string()));
        }
    }

    Ok(StagedLibrary {
        resource_name: resource_name.to_string(),
        path,
        version_tag: version_tag.to_string(),
        reused: false,
    })
}

/// Streaming copy, followed by opening permissions up to all users so
/// multiple accounts sharing one temp directory can load the same file.
fn copy_to(bundled: &mut dyn Read, path: &Path) -> io::Result<()> {
    let mut out = File::create(path)?;
    io::copy(bundled, &mut out)?;
    out.sync_all()?;
    drop(out);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(0o777)) {
            debug!(path = %path.display(), error = %e, "cannot open up cache file permissions");
        }
    }
    Ok(())
}

/// Lock-step byte comparison of two streams with bounded buffers.
///
/// Stops at the first differing chunk or when both streams reach EOF.
fn streams_equal(a: &mut dyn Read, mut b: impl Read) -> io::Result<bool> {
    let mut buf_a = [0u8; CHUNK_SIZE];
    let mut buf_b = [0u8; CHUNK_SIZE];
    loop {
        let n_a = read_full(a, &mut buf_a)?;
        let n_b = read_full(&mut b, &mut buf_b)?;
        if n_a != n_b || buf_a[..n_a] != buf_b[..n_b] {
            return Ok(false);
        }
        if n_a == 0 {
            return Ok(true);
        }
    }
}

/// Read until the buffer is full or the stream hits EOF.
fn read_full(reader: &mut dyn Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_streams_equal_identical() {
        let data = vec![7u8; 3 * CHUNK_SIZE + 11];
        let mut a = Cursor::new(data.clone());
        let b = Cursor::new(data);
        assert!(streams_equal(&mut a, b).unwrap());
    }

    #[test]
    fn test_streams_equal_detects_mismatch() {
        let data = vec![7u8; 2 * CHUNK_SIZE];
        let mut changed = data.clone();
        changed[CHUNK_SIZE + 100] ^= 1;
        let mut a = Cursor::new(data);
        let b = Cursor::new(changed);
        assert!(!streams_equal(&mut a, b).unwrap());
    }

    #[test]
    fn test_streams_equal_detects_length_difference() {
        let data = vec![7u8; CHUNK_SIZE];
        let mut longer = data.clone();
        longer.push(7);
        let mut a = Cursor::new(data);
        let b = Cursor::new(longer);
        assert!(!streams_equal(&mut a, b).unwrap());
    }

    #[test]
    fn test_streams_equal_empty() {
        let mut a = Cursor::new(Vec::<u8>::new());
        let b = Cursor::new(Vec::<u8>::new());
        assert!(streams_equal(&mut a, b).unwrap());
    }

    #[test]
    fn test_cache_path_is_deterministic_and_version_isolated() {
        let dir = Path::new("/tmp");
        let p1 = cache_path(dir, "0.1.0", "native.64.linux.so");
        let p2 = cache_path(dir, "0.1.0", "native.64.linux.so");
        let p3 = cache_path(dir, "0.2.0", "native.64.linux.so");
        assert_eq!(p1, p2);
        assert_ne!(p1, p3);
    }
}
