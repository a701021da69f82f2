//! Package-manager registry: the read-only collaborator the compiler
//! consults to resolve `import` statements (spec.md §6).
//!
//! The core never reads a manifest file itself; hosts implement this trait
//! however they see fit (a parsed lockfile, a static allow-list, a network
//! call) and hand it to the compiler.

/// Answers "is this package installed?" for one `import "path"` statement
/// at a time.
pub trait ImportResolver {
    fn is_installed(&self, path: &str) -> bool;
}

/// An `ImportResolver` backed by a fixed set of names, good enough for
/// embedding hosts that know their package list up front and for tests.
#[derive(Debug, Default, Clone)]
pub struct StaticRegistry {
    installed: std::collections::HashSet<String>,
}

impl StaticRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_packages(packages: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            installed: packages.into_iter().map(Into::into).collect(),
        }
    }

    pub fn install(&mut self, path: impl Into<String>) {
        self.installed.insert(path.into());
    }
}

impl ImportResolver for StaticRegistry {
    fn is_installed(&self, path: &str) -> bool {
        self.installed.contains(path)
    }
}

/// Accepts every import. Used where the host hasn't wired a real registry
/// yet (e.g. tests exercising unrelated compiler behavior).
#[derive(Debug, Default, Clone, Copy)]
pub struct PermissiveRegistry;

impl ImportResolver for PermissiveRegistry {
    fn is_installed(&self, _path: &str) -> bool {
        true
    }
}
