//! The finite set of standard modules an instance may load.
//!
//! Only modules listed here can ever be opened in a sandboxed instance;
//! everything else bundled with the engine (io, os, package, ...) has no
//! corresponding variant, so its symbols never exist in a guest namespace.

/// A loadable standard module of the native engine.
///
/// Each variant carries the registry name the module is published under
/// and the `luaopen_*` entry point resolved from the loaded library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StdModule {
    /// Core/base library, published as `_G`.
    Base,
    /// Bit operations (`bit32`).
    Bit32,
    /// Coroutine support.
    Coroutine,
    /// Debug library.
    Debug,
    /// Serialization support (the bundled `eris` persistence library).
    Eris,
    /// Math library.
    Math,
    /// String library.
    Str,
    /// Table library.
    Table,
}

impl StdModule {
    /// Registry name the module is required under (`luaL_requiref` modname).
    pub fn registry_name(self) -> &'static str {
        match self {
            StdModule::Base => "_G",
            StdModule::Bit32 => "bit32",
            StdModule::Coroutine => "coroutine",
            StdModule::Debug => "debug",
            StdModule::Eris => "eris",
            StdModule::Math => "math",
            StdModule::Str => "string",
            StdModule::Table => "table",
        }
    }

    /// Global name the module occupies in the guest namespace.
    ///
    /// Identical to the registry name except for the base library, whose
    /// functions live directly in the globals table.
    pub fn global_name(self) -> Option<&'static str> {
        match self {
            StdModule::Base => None,
            other => Some(other.registry_name()),
        }
    }

    /// Name of the `luaopen_*` symbol in the native library.
    pub fn open_symbol(self) -> &'static str {
        match self {
            StdModule::Base => "luaopen_base",
            StdModule::Bit32 => "luaopen_bit32",
            StdModule::Coroutine => "luaopen_coroutine",
            StdModule::Debug => "luaopen_debug",
            StdModule::Eris => "luaopen_eris",
            StdModule::Math => "luaopen_math",
            StdModule::Str => "luaopen_string",
            StdModule::Table => "luaopen_table",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: &[StdModule] = &[
        StdModule::Base,
        StdModule::Bit32,
        StdModule::Coroutine,
        StdModule::Debug,
        StdModule::Eris,
        StdModule::Math,
        StdModule::Str,
        StdModule::Table,
    ];

    #[test]
    fn test_registry_names_unique() {
        for (i, a) in ALL.iter().enumerate() {
            for b in &ALL[i + 1..] {
                assert_ne!(a.registry_name(), b.registry_name());
                assert_ne!(a.open_symbol(), b.open_symbol());
            }
        }
    }

    #[test]
    fn test_base_has_no_global_table() {
        assert_eq!(StdModule::Base.global_name(), None);
        assert_eq!(StdModule::Math.global_name(), Some("math"));
    }

    #[test]
    fn test_open_symbols_follow_convention() {
        for m in ALL {
            assert!(m.open_symbol().starts_with("luaopen_"));
        }
    }
}
