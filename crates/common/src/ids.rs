//! Type-safe identifier newtypes for autotls.
//!
//! These types provide compile-time safety for identifiers, preventing
//! accidental mixing of different ID types (e.g., passing a raw slot index
//! where a module identifier is expected).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Handle to an automation policy stored in a policy arena.
///
/// Blocks that share a policy (the catch-all policy, for instance) hold
/// copies of the same handle instead of aliasing the policy itself, so a
/// mutation through one handle is visible to every holder and to nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PolicyId(usize);

impl PolicyId {
    /// Create a handle for the given arena slot
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Get the arena slot this handle refers to
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for PolicyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "policy#{}", self.0)
    }
}

/// Fully qualified module identifier such as `dns.providers.hetzner`.
///
/// The last dot-separated label is the module name; everything before it
/// is the namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId(String);

impl ModuleId {
    /// Namespace holding DNS-01 challenge providers
    pub const DNS_PROVIDERS: &'static str = "dns.providers";

    /// Create from an existing string
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier of the DNS provider module with the given name
    pub fn dns_provider(name: &str) -> Self {
        Self(format!("{}.{}", Self::DNS_PROVIDERS, name))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Module name (last label)
    pub fn name(&self) -> &str {
        match self.0.rsplit_once('.') {
            Some((_, name)) => name,
            None => &self.0,
        }
    }

    /// Namespace (everything before the last label)
    pub fn namespace(&self) -> &str {
        match self.0.rsplit_once('.') {
            Some((namespace, _)) => namespace,
            None => "",
        }
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ModuleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ModuleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
