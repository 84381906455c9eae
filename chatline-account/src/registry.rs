// ABOUTME: Registry pattern for runtime account backend selection.
// ABOUTME: Backends register factories, the client creates one by name from config.

use crate::config::AccountConfig;
use crate::traits::AccountService;
use anyhow::{anyhow, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Factory function that creates an account from backend options
pub type AccountFactory = Box<dyn Fn(&Value) -> Result<Arc<dyn AccountService>> + Send + Sync>;

/// Registry for runtime backend selection
pub struct AccountRegistry {
    factories: HashMap<String, AccountFactory>,
}

impl AccountRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register a backend factory by name
    pub fn register<F>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(&Value) -> Result<Arc<dyn AccountService>> + Send + Sync + 'static,
    {
        self.factories.insert(name.to_string(), Box::new(factory));
        self
    }

    /// Create an account by backend name with the given options
    pub fn create(&self, name: &str, options: &Value) -> Result<Arc<dyn AccountService>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| anyhow!("Unknown account backend: {}", name))?;
        factory(options)
    }

    /// List available backend names, sorted
    pub fn available(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Create an account from the `[account]` config section
    pub fn create_from_config(&self, config: &AccountConfig) -> Result<Arc<dyn AccountService>> {
        self.create(config.backend_type(), &config.to_json_value())
    }
}

impl Default for AccountRegistry {
    fn default() -> Self {
        use crate::backends::memory::MemoryAccount;

        Self::new().register("memory", MemoryAccount::factory())
    }
}
