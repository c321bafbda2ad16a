#![forbid(unsafe_code)]

//! Resolvers that read the key straight out of `<KeyInfo>`.

use super::KeyResolver;
use crate::key::Key;
use crate::keyinfo::{KeyInfo, KeyValue};
use crate::storage::StorageResolver;
use sigill_core::KeyResolverError;

/// `<KeyValue>` and `<dsig11:DEREncodedKeyValue>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyValueResolver;

impl KeyResolver for KeyValueResolver {
    fn name(&self) -> &'static str {
        "key-value"
    }

    fn resolve(
        &self,
        key_info: &KeyInfo,
        _storage: Option<&StorageResolver>,
    ) -> Result<Option<Key>, KeyResolverError> {
        for value in &key_info.key_values {
            if let Some(key) = value.to_key()? {
                return Ok(Some(key));
            }
        }
        let unsupported: Vec<&str> = key_info
            .key_values
            .iter()
            .filter_map(|v| match v {
                KeyValue::Unsupported(name) => Some(name.as_str()),
                _ => None,
            })
            .collect();
        if unsupported.is_empty() {
            Ok(None)
        } else {
            Err(KeyResolverError::Declined(format!(
                "unsupported key value type: {}",
                unsupported.join(", ")
            )))
        }
    }
}

/// The first `<X509Certificate>` embedded in `<X509Data>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct X509CertificateResolver;

impl KeyResolver for X509CertificateResolver {
    fn name(&self) -> &'static str {
        "x509-certificate"
    }

    fn resolve(
        &self,
        key_info: &KeyInfo,
        _storage: Option<&StorageResolver>,
    ) -> Result<Option<Key>, KeyResolverError> {
        for data in &key_info.x509_data {
            if let Some(cert) = data.decoded_certificates()?.into_iter().next() {
                return cert
                    .public_key()
                    .map(Some)
                    .map_err(|e| KeyResolverError::Declined(e.to_string()));
            }
        }
        Ok(None)
    }
}
