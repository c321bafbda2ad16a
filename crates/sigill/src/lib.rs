#![forbid(unsafe_code)]

//! Sigill: XML Digital Signature key resolution, streaming event model and
//! signature algorithm policy.

pub use sigill_core as core;
pub use sigill_crypto as crypto;
pub use sigill_dsig as dsig;
pub use sigill_keys as keys;
pub use sigill_xml as xml;

pub use sigill_core::{Error, KeyResolverError, Result, SignatureError, StorageResolverError};
