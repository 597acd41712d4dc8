//! Module registry lookups
//!
//! Plugins such as DNS providers are looked up by fully qualified module
//! identifier. The compiler only needs a module's default settings, which it
//! embeds in the issuer configuration.

use autotls_common::ModuleId;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::trace;

/// DNS providers available without registration
pub const BUILTIN_DNS_PROVIDERS: &[&str] = &["hetzner", "webhook"];

/// Source of module instances
pub trait ModuleRegistry {
    /// Default settings of a new instance of the module, or `None` when the
    /// module is not registered
    fn instantiate(&self, id: &ModuleId) -> Option<Map<String, Value>>;
}

/// Registry backed by an in-memory table
#[derive(Debug, Clone, Default)]
pub struct StaticModuleRegistry {
    modules: HashMap<ModuleId, Map<String, Value>>,
}

impl StaticModuleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in DNS providers
    pub fn with_builtin_dns_providers() -> Self {
        let mut registry = Self::new();
        for name in BUILTIN_DNS_PROVIDERS {
            registry.register(ModuleId::dns_provider(name), Map::new());
        }
        registry
    }

    /// Register a module with its default settings, replacing any previous entry
    pub fn register(&mut self, id: ModuleId, defaults: Map<String, Value>) -> &mut Self {
        trace!(module = %id, "Registering module");
        self.modules.insert(id, defaults);
        self
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.modules.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl ModuleRegistry for StaticModuleRegistry {
    fn instantiate(&self, id: &ModuleId) -> Option<Map<String, Value>> {
        self.modules.get(id).cloned()
    }
}
