#![forbid(unsafe_code)]

//! Core types shared by every Sigill crate: the error taxonomy, algorithm
//! URIs and XML-DSig namespace/element names.

pub mod algorithm;
pub mod error;
pub mod ns;

pub use error::{Error, KeyResolverError, Result, SignatureError, StorageResolverError};
