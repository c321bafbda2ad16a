#![forbid(unsafe_code)]

//! XML-DSig signature verification.
//!
//! Processing order:
//! 1. Parse the document into events, locate `<Signature>` and `<SignedInfo>`
//! 2. Read CanonicalizationMethod, SignatureMethod and `HMACOutputLength`
//! 3. Build the signature algorithm, which applies the MAC output-length
//!    policy before any digest is computed
//! 4. For each `<Reference>`: select the node set, run transforms, digest, compare
//! 5. Resolve the key: the context key, else the resolver chain over `<KeyInfo>`
//! 6. Canonicalize `<SignedInfo>` and check `<SignatureValue>`

use crate::c14n::{self, C14nMode, Canonicalizer, Selection};
use crate::context::DsigContext;
use base64::Engine;
use sigill_core::{algorithm, ns, Error};
use sigill_crypto::sign::{from_uri_with_output_length, SignatureAlgorithm};
use sigill_crypto::digest;
use sigill_xml::{parse_events, EventArena, NodeId};

/// Result of signature verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    /// Signature is valid.
    Valid,
    /// Signature is invalid.
    Invalid { reason: String },
}

impl VerifyResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyResult::Valid)
    }
}

/// Verify a signed XML document.
///
/// Policy violations and unresolvable keys are errors; a digest or signature
/// value that does not match is [`VerifyResult::Invalid`].
pub fn verify(
    ctx: &DsigContext,
    xml: &str,
    c14n: &dyn Canonicalizer,
) -> Result<VerifyResult, Error> {
    let arena = parse_events(xml)?;
    let sig = SignatureNodes::locate(&arena)?;
    let sig_alg = sig.algorithm(&arena, ctx)?;

    for reference in arena.find_children(sig.signed_info, ns::DSIG, ns::node::REFERENCE) {
        let computed = digest_reference(ctx, &arena, sig.signature, reference, c14n)?;
        let expected = decode_child(&arena, reference, ns::node::DIGEST_VALUE)?;
        if computed != expected {
            let uri = arena.attribute(reference, ns::attr::URI).unwrap_or("");
            tracing::debug!(uri, "reference digest mismatch");
            return Ok(VerifyResult::Invalid {
                reason: format!("Reference digest failed: URI={uri}"),
            });
        }
    }

    let key = ctx.resolve_key(&arena, sig.signature)?;
    let signed_info = sig.canonical_signed_info(&arena, c14n)?;
    let signature_value = decode_child(&arena, sig.signature, ns::node::SIGNATURE_VALUE)?;

    if sig_alg.verify(&key.to_signing_key(), &signed_info, &signature_value)? {
        Ok(VerifyResult::Valid)
    } else {
        Ok(VerifyResult::Invalid {
            reason: "signature value verification failed".into(),
        })
    }
}

// ── Shared with signing ──────────────────────────────────────────────

/// The `<Signature>` element and the parts of `<SignedInfo>` both
/// directions need.
pub(crate) struct SignatureNodes {
    pub signature: NodeId,
    pub signed_info: NodeId,
    pub c14n_method: NodeId,
    pub signature_method: NodeId,
}

impl SignatureNodes {
    pub fn locate(arena: &EventArena) -> Result<Self, Error> {
        let signature = arena
            .find_element(ns::DSIG, ns::node::SIGNATURE)
            .ok_or_else(|| Error::MissingElement("Signature".into()))?;
        let signed_info = require_child(arena, signature, ns::node::SIGNED_INFO)?;
        let c14n_method = require_child(arena, signed_info, ns::node::CANONICALIZATION_METHOD)?;
        let signature_method = require_child(arena, signed_info, ns::node::SIGNATURE_METHOD)?;
        Ok(Self {
            signature,
            signed_info,
            c14n_method,
            signature_method,
        })
    }

    /// Signature algorithm with the declared `HMACOutputLength`, checked
    /// against the context policy.
    pub fn algorithm(
        &self,
        arena: &EventArena,
        ctx: &DsigContext,
    ) -> Result<Box<dyn SignatureAlgorithm>, Error> {
        let uri = arena
            .attribute(self.signature_method, ns::attr::ALGORITHM)
            .ok_or_else(|| Error::MissingAttribute("Algorithm on SignatureMethod".into()))?;
        let output_bits = hmac_output_length(arena, self.signature_method)?;
        from_uri_with_output_length(uri, output_bits, ctx.policy)
    }

    pub fn canonical_signed_info(
        &self,
        arena: &EventArena,
        c14n: &dyn Canonicalizer,
    ) -> Result<Vec<u8>, Error> {
        let mode = c14n::mode_of(arena, self.c14n_method)?;
        let selection = Selection::subtree(self.signed_info)
            .with_prefixes(c14n::inclusive_prefixes(arena, self.c14n_method));
        c14n.canonicalize(mode, arena, &selection)
    }
}

fn require_child(arena: &EventArena, parent: NodeId, local_name: &str) -> Result<NodeId, Error> {
    arena
        .find_child(parent, ns::DSIG, local_name)
        .ok_or_else(|| Error::MissingElement(local_name.into()))
}

/// `<HMACOutputLength>` under `<SignatureMethod>`, in bits.
fn hmac_output_length(arena: &EventArena, method: NodeId) -> Result<Option<usize>, Error> {
    let Some(node) = arena.find_child(method, ns::DSIG, ns::node::HMAC_OUTPUT_LENGTH) else {
        return Ok(None);
    };
    let text = arena.text(node);
    text.trim().parse::<usize>().map(Some).map_err(|_| {
        Error::XmlStructure(format!("HMACOutputLength is not a non-negative integer: {text:?}"))
    })
}

/// Decode the Base64 text of the DSig child `local_name` of `parent`.
fn decode_child(arena: &EventArena, parent: NodeId, local_name: &str) -> Result<Vec<u8>, Error> {
    let node = require_child(arena, parent, local_name)?;
    let clean: String = arena
        .text(node)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    base64::engine::general_purpose::STANDARD
        .decode(&clean)
        .map_err(|e| Error::Base64(format!("{local_name}: {e}")))
}

/// Compute the digest of one `<Reference>`.
pub(crate) fn digest_reference(
    ctx: &DsigContext,
    arena: &EventArena,
    signature: NodeId,
    reference: NodeId,
    c14n: &dyn Canonicalizer,
) -> Result<Vec<u8>, Error> {
    let digest_method = require_child(arena, reference, ns::node::DIGEST_METHOD)?;
    let digest_uri = arena
        .attribute(digest_method, ns::attr::ALGORITHM)
        .ok_or_else(|| Error::MissingAttribute("Algorithm on DigestMethod".into()))?;

    let uri = arena.attribute(reference, ns::attr::URI).unwrap_or("");
    let mut selection = resolve_reference_uri(ctx, arena, uri)?;
    let mut mode = C14nMode::Inclusive;

    if let Some(transforms) = arena.find_child(reference, ns::DSIG, ns::node::TRANSFORMS) {
        for transform in arena.find_children(transforms, ns::DSIG, ns::node::TRANSFORM) {
            let t_uri = arena.attribute(transform, ns::attr::ALGORITHM).unwrap_or("");
            if t_uri == algorithm::ENVELOPED_SIGNATURE {
                selection = selection.excluding(signature);
            } else if let Some(m) = C14nMode::from_uri(t_uri) {
                mode = m;
                selection = selection.with_prefixes(c14n::inclusive_prefixes(arena, transform));
            } else {
                return Err(Error::UnsupportedAlgorithm(format!("transform: {t_uri}")));
            }
        }
    }

    let bytes = c14n.canonicalize(mode, arena, &selection)?;
    digest::digest(digest_uri, &bytes)
}

/// Same-document references only: `""`, `#id`, `#xpointer(/)` and
/// `#xpointer(id('id'))`.
fn resolve_reference_uri(
    ctx: &DsigContext,
    arena: &EventArena,
    uri: &str,
) -> Result<Selection, Error> {
    if uri.is_empty() || uri == "#xpointer(/)" {
        return Ok(Selection::document());
    }
    let Some(fragment) = uri.strip_prefix('#') else {
        return Err(Error::InvalidUri(format!("external URI not supported: {uri}")));
    };
    let id = parse_xpointer_id(fragment).unwrap_or(fragment);
    let node = arena
        .find_by_id(id, &ctx.all_id_attrs())
        .ok_or_else(|| Error::InvalidUri(format!("ID not found: {id}")))?;
    Ok(Selection::subtree(node))
}

fn parse_xpointer_id(expr: &str) -> Option<&str> {
    expr.strip_prefix("xpointer(id('")?.strip_suffix("'))")
}
