#![forbid(unsafe_code)]

//! Key manager with named key store.

use crate::key::Key;

/// Named keys known to the application, consulted by `<KeyName>` lookup.
#[derive(Debug, Default, Clone)]
pub struct KeysManager {
    keys: Vec<Key>,
}

impl KeysManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_key(&mut self, key: Key) {
        self.keys.push(key);
    }

    /// Find a key by name. The first key added under a name wins.
    pub fn find_by_name(&self, name: &str) -> Option<&Key> {
        self.keys.iter().find(|k| k.name.as_deref() == Some(name))
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
