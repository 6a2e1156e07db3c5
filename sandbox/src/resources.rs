//! Bundled-resource lookup abstraction.
//!
//! The native binaries ship inside the application package; staging needs
//! a way to open them by resource name without caring how they are
//! bundled.
//!
//! Implementations:
//! - `DirResources` — resources unpacked under a directory (production)
//! - `MemResources` — in-memory map for tests

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::PathBuf;

/// Abstraction over the application's bundled resources.
pub trait ResourceProvider: Send + Sync {
    /// Open a bundled resource for reading.
    ///
    /// Returns `None` if no resource exists under that name.
    fn open(&self, name: &str) -> Option<Box<dyn Read + '_>>;
}

/// Resources laid out as plain files under a root directory.
#[derive(Debug, Clone)]
pub struct DirResources {
    root: PathBuf,
}

impl DirResources {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ResourceProvider for DirResources {
    fn open(&self, name: &str) -> Option<Box<dyn Read + '_>> {
        let file = File::open(self.root.join(name)).ok()?;
        Some(Box::new(file))
    }
}

/// In-memory resource map for tests.
#[derive(Debug, Clone, Default)]
pub struct MemResources {
    data: BTreeMap<String, Vec<u8>>,
}

impl MemResources {
    /// Create a new empty provider.
    pub fn new() -> Self {
        Self {
            data: BTreeMap::new(),
        }
    }

    /// Insert (or replace) a resource.
    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.data.insert(name.into(), bytes);
    }

    /// Remove a resource.
    pub fn remove(&mut self, name: &str) {
        self.data.remove(name);
    }
}

impl ResourceProvider for MemResources {
    fn open(&self, name: &str) -> Option<Box<dyn Read + '_>> {
        let bytes = self.data.get(name)?;
        Some(Box::new(Cursor::new(bytes.as_slice())))
    }
}
