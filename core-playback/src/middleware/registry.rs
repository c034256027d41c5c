use super::MiddlewareFactory;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Registry key whose factories apply to every source type.
pub const WILDCARD: &str = "*";

/// Maps source types to the ordered middleware factories that apply to them.
///
/// The registry is an explicit context object: the composition root creates
/// one, hands it to every player that should share it, and calls
/// [`reset`](Self::reset) between activations that must not see each other's
/// middleware. Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct MiddlewareRegistry {
    entries: Arc<RwLock<HashMap<String, Vec<MiddlewareFactory>>>>,
}

impl MiddlewareRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `factory` to the list for `type_key`.
    ///
    /// Registering under the same key twice keeps both entries.
    pub fn register(&self, type_key: impl Into<String>, factory: MiddlewareFactory) {
        let type_key = type_key.into();
        let mut entries = self.entries.write();
        let list = entries.entry(type_key.clone()).or_default();
        list.push(factory);
        debug!(type_key = %type_key, count = list.len(), "Registered middleware factory");
    }

    /// Factories for `source_type`: wildcard entries first, then exact
    /// matches, each in registration order.
    pub fn factories_for(&self, source_type: &str) -> Vec<MiddlewareFactory> {
        let entries = self.entries.read();
        let wildcard = entries.get(WILDCARD).into_iter().flatten();
        let exact = entries
            .get(source_type)
            .filter(|_| source_type != WILDCARD)
            .into_iter()
            .flatten();
        wildcard.chain(exact).cloned().collect()
    }

    /// Registered type keys, sorted.
    pub fn registered_types(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Total number of registered factories across all keys.
    pub fn len(&self) -> usize {
        self.entries.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every registration.
    pub fn reset(&self) {
        self.entries.write().clear();
    }
}

impl fmt::Debug for MiddlewareRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareRegistry")
            .field("types", &self.registered_types())
            .field("factories", &self.len())
            .finish()
    }
}
