#![forbid(unsafe_code)]

//! MAC output-length policy.
//!
//! `HMACOutputLength` lets a signature declare a truncated MAC. A verifier
//! that compares only the declared prefix accepts a one-byte value after at
//! most 256 guesses, so every MAC family carries a floor of
//! `max(80, digest_bits / 2)` bits. The floor is checked when a signing
//! object is built and again whenever it signs or verifies.

use sigill_core::{algorithm, SignatureError};

/// HMAC families and their digest sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacFamily {
    HmacSha1,
    HmacSha224,
    HmacSha256,
    HmacSha384,
    HmacSha512,
}

impl MacFamily {
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            algorithm::HMAC_SHA1 => Some(Self::HmacSha1),
            algorithm::HMAC_SHA224 => Some(Self::HmacSha224),
            algorithm::HMAC_SHA256 => Some(Self::HmacSha256),
            algorithm::HMAC_SHA384 => Some(Self::HmacSha384),
            algorithm::HMAC_SHA512 => Some(Self::HmacSha512),
            _ => None,
        }
    }

    pub fn uri(self) -> &'static str {
        match self {
            Self::HmacSha1 => algorithm::HMAC_SHA1,
            Self::HmacSha224 => algorithm::HMAC_SHA224,
            Self::HmacSha256 => algorithm::HMAC_SHA256,
            Self::HmacSha384 => algorithm::HMAC_SHA384,
            Self::HmacSha512 => algorithm::HMAC_SHA512,
        }
    }

    /// Short display name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Self::HmacSha1 => "HMAC-SHA1",
            Self::HmacSha224 => "HMAC-SHA224",
            Self::HmacSha256 => "HMAC-SHA256",
            Self::HmacSha384 => "HMAC-SHA384",
            Self::HmacSha512 => "HMAC-SHA512",
        }
    }

    pub fn digest_bits(self) -> usize {
        match self {
            Self::HmacSha1 => 160,
            Self::HmacSha224 => 224,
            Self::HmacSha256 => 256,
            Self::HmacSha384 => 384,
            Self::HmacSha512 => 512,
        }
    }

    /// The family's fixed floor. Not configurable.
    pub fn minimum_output_bits(self) -> usize {
        (self.digest_bits() / 2).max(80)
    }
}

/// Caller-selected policy knobs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MacPolicy {
    /// Accept output lengths below the family minimum. Off by default.
    ///
    /// Even when set, at least one byte of MAC must be compared.
    pub allow_truncation_below_minimum: bool,
}

impl MacPolicy {
    pub fn strict() -> Self {
        Self::default()
    }

    pub fn permissive() -> Self {
        Self {
            allow_truncation_below_minimum: true,
        }
    }
}

/// Validate a requested or declared output length in bits.
pub fn validate_output_length(
    family: MacFamily,
    bits: usize,
    policy: MacPolicy,
) -> Result<(), SignatureError> {
    let algorithm = family.name();
    if bits > family.digest_bits() {
        return Err(SignatureError::OutputLengthExceedsDigest {
            algorithm,
            requested: bits,
            maximum: family.digest_bits(),
        });
    }
    let minimum = if policy.allow_truncation_below_minimum {
        8
    } else {
        family.minimum_output_bits()
    };
    if bits < minimum {
        return Err(SignatureError::OutputLengthBelowMinimum {
            algorithm,
            requested: bits,
            minimum,
        });
    }
    if bits % 8 != 0 {
        return Err(SignatureError::OutputLengthNotByteAligned {
            algorithm,
            requested: bits,
        });
    }
    Ok(())
}
