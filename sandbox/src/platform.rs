//! Platform resolution — maps OS family, architecture, and bitness to the
//! bundled native binary's resource name.
//!
//! Resource names follow the fixed pattern `native.<bitness>.<osTag>.<ext>`.
//! Unknown combinations resolve to `None`: that is degraded mode, not a
//! fault, and the bootstrap simply reports the feature as unavailable.

use tracing::warn;

/// Operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Windows,
    Mac,
    Linux,
    Bsd,
    Other,
}

/// CPU architecture family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    X86,
    Arm,
    Other,
}

impl Arch {
    /// Classify a raw architecture string (`std::env::consts::ARCH` or an
    /// embedding host's equivalent).
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "x86" | "x86_64" | "i386" | "i686" | "amd64" => Arch::X86,
            "arm" | "armv7" | "aarch64" | "arm64" => Arch::Arm,
            _ => Arch::Other,
        }
    }
}

/// Pointer width of the host process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bitness {
    B32,
    B64,
}

impl Bitness {
    fn tag(self) -> &'static str {
        match self {
            Bitness::B32 => "32",
            Bitness::B64 => "64",
        }
    }
}

/// Immutable description of the platform the host process runs on,
/// derived once from the environment (or supplied by the embedding host).
#[derive(Debug, Clone)]
pub struct PlatformDescriptor {
    pub os_family: OsFamily,
    pub arch: Arch,
    pub bitness: Bitness,
    /// OS release string, e.g. `"5.1"` for Windows XP. Used only for the
    /// end-of-life short-circuit; `None` skips that check.
    pub os_version: Option<String>,
}

impl PlatformDescriptor {
    /// Derive the descriptor from the running process.
    pub fn current() -> Self {
        let os_family = match std::env::consts::OS {
            "windows" => OsFamily::Windows,
            "macos" => OsFamily::Mac,
            "linux" | "android" => OsFamily::Linux,
            "freebsd" | "netbsd" | "openbsd" | "dragonfly" => OsFamily::Bsd,
            _ => OsFamily::Other,
        };
        let bitness = if cfg!(target_pointer_width = "64") {
            Bitness::B64
        } else {
            Bitness::B32
        };
        Self {
            os_family,
            arch: Arch::from_raw(std::env::consts::ARCH),
            bitness,
            os_version: None,
        }
    }

    /// Resolve the bundled resource name for this platform.
    ///
    /// An explicit `override_name` always wins. Known end-of-life Windows
    /// releases (NT major version below 6) resolve to `None` unless
    /// `always_attempt` is set. Unknown combinations resolve to `None`.
    pub fn resolve(
        &self,
        override_name: Option<&str>,
        always_attempt: bool,
    ) -> Option<String> {
        if let Some(name) = override_name {
            return Some(name.to_string());
        }

        if self.os_family == OsFamily::Windows && !always_attempt {
            if let Some(major) = self.nt_major_version() {
                if major < 6 {
                    warn!(
                        version = self.os_version.as_deref().unwrap_or(""),
                        "end-of-life Windows release, skipping native load \
                         (set the always-attempt flag to try anyway)"
                    );
                    return None;
                }
            }
        }

        let bits = self.bitness.tag();
        let name = match (self.os_family, self.arch) {
            (OsFamily::Windows, Arch::X86) => format!("native.{}.windows.dll", bits),
            (OsFamily::Mac, Arch::X86) => format!("native.{}.mac.dylib", bits),
            (OsFamily::Linux, Arch::X86) => format!("native.{}.linux.so", bits),
            (OsFamily::Linux, Arch::Arm) => format!("native.{}.arm.so", bits),
            (OsFamily::Bsd, Arch::X86) => format!("native.{}.bsd.so", bits),
            _ => return None,
        };
        Some(name)
    }

    fn nt_major_version(&self) -> Option<u32> {
        let version = self.os_version.as_deref()?;
        version
            .split('.')
            .next()
            .and_then(|major| major.parse().ok())
    }
}
