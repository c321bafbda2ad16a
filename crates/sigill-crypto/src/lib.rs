#![forbid(unsafe_code)]

//! Cryptographic algorithms for the Sigill XML Security library.
//!
//! Digests, RSA/ECDSA/HMAC signature algorithms, and the MAC output-length
//! policy that guards truncated HMAC signatures.

pub mod digest;
pub mod policy;
pub mod sign;

pub use digest::DigestAlgorithm;
pub use policy::{validate_output_length, MacFamily, MacPolicy};
pub use sign::{HmacSign, SignatureAlgorithm, SigningKey};
