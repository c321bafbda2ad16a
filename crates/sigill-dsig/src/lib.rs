#![forbid(unsafe_code)]

//! XML Digital Signature (XML-DSig) engine.
//!
//! Verifies and creates enveloped and detached same-document signatures
//! over the [`sigill_xml`] event model. Keys come from the context or from
//! its resolver chain; canonical octets come from a [`Canonicalizer`].

pub mod c14n;
pub mod context;
pub mod sign;
pub mod verify;

pub use c14n::{C14nMode, Canonicalizer, Selection};
pub use context::DsigContext;
pub use sign::sign;
pub use verify::{verify, VerifyResult};
