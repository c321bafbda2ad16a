#![forbid(unsafe_code)]

//! XML-DSig signature creation.
//!
//! Signs an XML document using a template with empty DigestValue/SignatureValue.

use crate::c14n::Canonicalizer;
use crate::context::DsigContext;
use crate::verify::{digest_reference, SignatureNodes};
use base64::Engine;
use sigill_core::{ns, Error};
use sigill_xml::{parse_events, EventArena, NodeId};

/// Sign an XML template document.
///
/// The template must contain a `<Signature>` element whose `<DigestValue>`
/// and `<SignatureValue>` elements are empty. A declared `HMACOutputLength`
/// is checked against the context policy before anything is digested.
///
/// Returns the signed XML document as a string.
pub fn sign(ctx: &DsigContext, template_xml: &str, c14n: &dyn Canonicalizer) -> Result<String, Error> {
    let arena = parse_events(template_xml)?;
    let sig = SignatureNodes::locate(&arena)?;
    let sig_alg = sig.algorithm(&arena, ctx)?;
    let engine = base64::engine::general_purpose::STANDARD;

    let mut result_xml = template_xml.to_owned();
    for reference in arena.find_children(sig.signed_info, ns::DSIG, ns::node::REFERENCE) {
        let digest_value = arena
            .find_child(reference, ns::DSIG, ns::node::DIGEST_VALUE)
            .ok_or_else(|| Error::MissingElement("DigestValue".into()))?;
        if !arena.text(digest_value).trim().is_empty() {
            continue;
        }
        let computed = digest_reference(ctx, &arena, sig.signature, reference, c14n)?;
        result_xml = fill_empty(&result_xml, &arena, digest_value, &engine.encode(&computed))?;
    }

    // SignedInfo now carries the digests; canonicalize the updated document.
    let updated = parse_events(&result_xml)?;
    let updated_sig = SignatureNodes::locate(&updated)?;
    let signed_info = updated_sig.canonical_signed_info(&updated, c14n)?;

    let key = ctx.resolve_key(&updated, updated_sig.signature)?;
    let signature = sig_alg.sign(&key.to_signing_key(), &signed_info)?;
    tracing::debug!(
        algorithm = sig_alg.uri(),
        bytes = signature.len(),
        "signature computed"
    );

    let sig_value = updated
        .find_child(updated_sig.signature, ns::DSIG, ns::node::SIGNATURE_VALUE)
        .ok_or_else(|| Error::MissingElement("SignatureValue".into()))?;
    fill_empty(&result_xml, &updated, sig_value, &engine.encode(&signature))
}

/// Replace the first empty occurrence of `element` in `xml` with one
/// carrying `text`. `<q/>` and `<q></q>` count as empty, as does `<q>`
/// holding only whitespace.
fn fill_empty(xml: &str, arena: &EventArena, element: NodeId, text: &str) -> Result<String, Error> {
    let name = arena
        .element_name(element)
        .ok_or_else(|| Error::XmlStructure("not an element".into()))?
        .to_string();
    let open = format!("<{name}");
    let close = format!("</{name}>");

    let mut from = 0;
    while let Some(found) = xml[from..].find(&open) {
        let at = from + found;
        let rest = &xml[at + open.len()..];
        let end = if rest.starts_with("/>") {
            Some(at + open.len() + 2)
        } else if let Some(body) = rest.strip_prefix('>') {
            body.find(&close)
                .filter(|&len| body[..len].trim().is_empty())
                .map(|len| at + open.len() + 1 + len + close.len())
        } else {
            None
        };
        if let Some(end) = end {
            return Ok(format!("{}<{name}>{text}</{name}>{}", &xml[..at], &xml[end..]));
        }
        from = at + open.len();
    }
    Err(Error::XmlStructure(format!("no empty <{name}> to fill")))
}
