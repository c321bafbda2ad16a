#![forbid(unsafe_code)]

//! Namespace URIs and the element and attribute names read from
//! `<Signature>` and `<KeyInfo>`.
//!
//! Element names are grouped by the namespace that defines them. Readers
//! also accept `ECKeyValue` and `X509Digest` under the 1.0 namespace, but
//! `DEREncodedKeyValue` only under 1.1.

pub const DSIG: &str = "http://www.w3.org/2000/09/xmldsig#";
pub const DSIG11: &str = "http://www.w3.org/2009/xmldsig11#";

/// Carries `<InclusiveNamespaces PrefixList="...">`.
pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

/// Bound to the `xml` prefix without a declaration.
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";

// ── Element names ────────────────────────────────────────────────────

pub mod node {
    // <Signature> structure, DSIG
    pub const SIGNATURE: &str = "Signature";
    pub const SIGNED_INFO: &str = "SignedInfo";
    pub const SIGNATURE_VALUE: &str = "SignatureValue";
    pub const CANONICALIZATION_METHOD: &str = "CanonicalizationMethod";
    pub const SIGNATURE_METHOD: &str = "SignatureMethod";
    pub const HMAC_OUTPUT_LENGTH: &str = "HMACOutputLength";
    pub const REFERENCE: &str = "Reference";
    pub const TRANSFORMS: &str = "Transforms";
    pub const TRANSFORM: &str = "Transform";
    pub const DIGEST_METHOD: &str = "DigestMethod";
    pub const DIGEST_VALUE: &str = "DigestValue";

    // EXC_C14N
    pub const INCLUSIVE_NAMESPACES: &str = "InclusiveNamespaces";

    // <KeyInfo> children and key values, DSIG
    pub const KEY_INFO: &str = "KeyInfo";
    pub const KEY_NAME: &str = "KeyName";
    pub const KEY_VALUE: &str = "KeyValue";
    pub const RSA_KEY_VALUE: &str = "RSAKeyValue";
    pub const RSA_MODULUS: &str = "Modulus";
    pub const RSA_EXPONENT: &str = "Exponent";

    // <X509Data> and its criteria, DSIG
    pub const X509_DATA: &str = "X509Data";
    pub const X509_CERTIFICATE: &str = "X509Certificate";
    pub const X509_SUBJECT_NAME: &str = "X509SubjectName";
    pub const X509_ISSUER_SERIAL: &str = "X509IssuerSerial";
    pub const X509_ISSUER_NAME: &str = "X509IssuerName";
    pub const X509_SERIAL_NUMBER: &str = "X509SerialNumber";
    pub const X509_SKI: &str = "X509SKI";

    // DSIG11
    pub const DER_ENCODED_KEY_VALUE: &str = "DEREncodedKeyValue";
    pub const EC_KEY_VALUE: &str = "ECKeyValue";
    pub const NAMED_CURVE: &str = "NamedCurve";
    pub const PUBLIC_KEY: &str = "PublicKey";
    pub const X509_DIGEST: &str = "X509Digest";
}

// ── Attribute names ──────────────────────────────────────────────────

pub mod attr {
    pub const URI: &str = "URI";
    pub const ALGORITHM: &str = "Algorithm";
    pub const PREFIX_LIST: &str = "PrefixList";
}
