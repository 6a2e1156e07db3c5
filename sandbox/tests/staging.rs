//! Staging idempotence tests against a real temp directory.

mod common;

use std::fs;

use common::{bundled, LINUX64_RESOURCE};
use luabox_sandbox::staging::stage;
use luabox_sandbox::{MemResources, SandboxError};

#[test]
fn test_first_stage_copies_the_resource() {
    let cache = tempfile::tempdir().unwrap();
    let resources = bundled(b"native bytes v1");

    let staged = stage(&resources, LINUX64_RESOURCE, cache.path(), "test").unwrap();

    assert!(!staged.reused);
    assert_eq!(staged.resource_name, LINUX64_RESOURCE);
    assert_eq!(fs::read(&staged.path).unwrap(), b"native bytes v1");
}

#[test]
fn test_restaging_identical_resource_reuses_cache() {
    let cache = tempfile::tempdir().unwrap();
    let resources = bundled(b"native bytes v1");

    let first = stage(&resources, LINUX64_RESOURCE, cache.path(), "test").unwrap();
    let modified_before = fs::metadata(&first.path).unwrap().modified().unwrap();

    let second = stage(&resources, LINUX64_RESOURCE, cache.path(), "test").unwrap();

    assert!(!first.reused);
    assert!(second.reused, "identical cache file must be reused");
    assert_eq!(first.path, second.path);
    assert_eq!(
        fs::metadata(&second.path).unwrap().modified().unwrap(),
        modified_before,
        "reuse must not rewrite the file"
    );
}

#[test]
fn test_changed_resource_replaces_cache() {
    let cache = tempfile::tempdir().unwrap();

    let v1 = bundled(b"native bytes v1");
    stage(&v1, LINUX64_RESOURCE, cache.path(), "test").unwrap();

    let v2 = bundled(b"native bytes v2 -- different");
    let staged = stage(&v2, LINUX64_RESOURCE, cache.path(), "test").unwrap();

    assert!(!staged.reused);
    assert_eq!(fs::read(&staged.path).unwrap(), b"native bytes v2 -- different");
}

#[test]
fn test_version_tags_stage_side_by_side() {
    let cache = tempfile::tempdir().unwrap();
    let resources = bundled(b"native bytes");

    let a = stage(&resources, LINUX64_RESOURCE, cache.path(), "1.0").unwrap();
    let b = stage(&resources, LINUX64_RESOURCE, cache.path(), "2.0").unwrap();

    assert_ne!(a.path, b.path);
    assert!(a.path.exists());
    assert!(b.path.exists());
}

#[test]
fn test_missing_resource_is_a_hard_error() {
    let cache = tempfile::tempdir().unwrap();
    let resources = MemResources::new();

    let err = stage(&resources, LINUX64_RESOURCE, cache.path(), "test").unwrap_err();
    assert!(matches!(err, SandboxError::ResourceMissing(name) if name == LINUX64_RESOURCE));
}

#[test]
fn test_stage_creates_missing_cache_directory() {
    let cache = tempfile::tempdir().unwrap();
    let nested = cache.path().join("deeper").join("cache");
    let resources = bundled(b"native bytes");

    let staged = stage(&resources, LINUX64_RESOURCE, &nested, "test").unwrap();
    assert!(staged.path.starts_with(&nested));
    assert_eq!(fs::read(&staged.path).unwrap(), b"native bytes");
}
