use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use parking_lot::RwLock;

use super::Event;
use crate::error::RegistryError;

/// Name → event mapping. Entries are never removed.
#[derive(Debug, Default)]
pub struct Registry {
    events: RwLock<HashMap<String, Arc<Event>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<Event>> {
        self.events.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.events.read().contains_key(name)
    }

    /// Insert `event` under its own name. An existing entry is left untouched.
    pub fn insert(&self, event: Event) -> Result<Arc<Event>, RegistryError> {
        match self.events.write().entry(event.name().to_string()) {
            Entry::Occupied(existing) => Err(RegistryError::AlreadyRegistered(existing.key().clone())),
            Entry::Vacant(slot) => Ok(slot.insert(Arc::new(event)).clone()),
        }
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.events.read().keys().cloned().collect();
        names.sort();
        names
    }
}
