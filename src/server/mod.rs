//! Provider side: local handlers answering requests from other clients.

mod handler;
mod response;

use std::collections::HashMap;

use crate::{Result, RpcError};

pub(crate) use handler::{Provider, ProviderPtr, TypedProvider};
pub use response::RpcResponse;

/// Provider callbacks by RPC name. At most one per name.
///
/// Owned by the broker and only touched under its lock.
pub(crate) struct ProviderRegistry {
    providers: HashMap<String, ProviderPtr>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Register `provider` under `name`.
    ///
    /// # Errors
    ///
    /// `AlreadyRegistered` if `name` already has a provider; the existing
    /// one is kept.
    pub fn register(&mut self, name: &str, provider: ProviderPtr) -> Result<()> {
        // ---
        if self.providers.contains_key(name) {
            return Err(RpcError::AlreadyRegistered(name.to_string()));
        }
        self.providers.insert(name.to_string(), provider);
        Ok(())
    }

    /// Remove the provider for `name`; `false` if there was none.
    pub fn remove(&mut self, name: &str) -> bool {
        self.providers.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<ProviderPtr> {
        self.providers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.providers.contains_key(name)
    }

    /// Registered names, in no particular order.
    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}
