#![forbid(unsafe_code)]

//! `<KeyName>` lookup in a [`KeysManager`].

use super::KeyResolver;
use crate::key::Key;
use crate::keyinfo::KeyInfo;
use crate::manager::KeysManager;
use crate::storage::StorageResolver;
use sigill_core::KeyResolverError;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct KeyNameResolver {
    manager: Arc<KeysManager>,
}

impl KeyNameResolver {
    pub fn new(manager: Arc<KeysManager>) -> Self {
        Self { manager }
    }
}

impl KeyResolver for KeyNameResolver {
    fn name(&self) -> &'static str {
        "key-name"
    }

    fn resolve(
        &self,
        key_info: &KeyInfo,
        _storage: Option<&StorageResolver>,
    ) -> Result<Option<Key>, KeyResolverError> {
        Ok(key_info
            .key_names
            .iter()
            .find_map(|name| self.manager.find_by_name(name))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_hmac_key;

    #[test]
    fn test_lookup_by_name() {
        let mut manager = KeysManager::new();
        manager.add_key(load_hmac_key(b"s3cret").with_name("shared"));
        let resolver = KeyNameResolver::new(Arc::new(manager));

        let info = KeyInfo::new().with_key_name("unknown").with_key_name("shared");
        let key = resolver.resolve(&info, None).unwrap().unwrap();
        assert_eq!(key.symmetric_key_bytes(), Some(&b"s3cret"[..]));

        assert!(resolver.resolve(&KeyInfo::new(), None).unwrap().is_none());
    }
}
