#![forbid(unsafe_code)]

//! Canonicalization seam.
//!
//! The engine decides *what* is canonicalized (a [`Selection`] over the
//! event arena) and *which* variant applies ([`C14nMode`]); producing the
//! canonical octets is delegated to a [`Canonicalizer`].

use sigill_core::{algorithm, ns, Error};
use sigill_xml::{EventArena, NodeId};

/// The canonicalization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum C14nMode {
    /// Canonical XML 1.0
    Inclusive,
    /// Canonical XML 1.0 with comments
    InclusiveWithComments,
    /// Canonical XML 1.1
    Inclusive11,
    /// Canonical XML 1.1 with comments
    Inclusive11WithComments,
    /// Exclusive Canonical XML 1.0
    Exclusive,
    /// Exclusive Canonical XML 1.0 with comments
    ExclusiveWithComments,
}

impl C14nMode {
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Inclusive => algorithm::C14N,
            Self::InclusiveWithComments => algorithm::C14N_WITH_COMMENTS,
            Self::Inclusive11 => algorithm::C14N11,
            Self::Inclusive11WithComments => algorithm::C14N11_WITH_COMMENTS,
            Self::Exclusive => algorithm::EXC_C14N,
            Self::ExclusiveWithComments => algorithm::EXC_C14N_WITH_COMMENTS,
        }
    }

    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            algorithm::C14N => Some(Self::Inclusive),
            algorithm::C14N_WITH_COMMENTS => Some(Self::InclusiveWithComments),
            algorithm::C14N11 => Some(Self::Inclusive11),
            algorithm::C14N11_WITH_COMMENTS => Some(Self::Inclusive11WithComments),
            algorithm::EXC_C14N => Some(Self::Exclusive),
            algorithm::EXC_C14N_WITH_COMMENTS => Some(Self::ExclusiveWithComments),
            _ => None,
        }
    }

    pub fn with_comments(&self) -> bool {
        matches!(
            self,
            Self::InclusiveWithComments
                | Self::Inclusive11WithComments
                | Self::ExclusiveWithComments
        )
    }

    pub fn is_exclusive(&self) -> bool {
        matches!(self, Self::Exclusive | Self::ExclusiveWithComments)
    }
}

/// The part of a document handed to a canonicalizer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Subtree root; `None` selects the whole document.
    pub root: Option<NodeId>,
    /// Subtree left out, e.g. the enveloping `<Signature>`.
    pub exclude: Option<NodeId>,
    /// Exclusive C14N `InclusiveNamespaces/@PrefixList`.
    pub inclusive_prefixes: Vec<String>,
}

impl Selection {
    pub fn document() -> Self {
        Self::default()
    }

    pub fn subtree(root: NodeId) -> Self {
        Self {
            root: Some(root),
            ..Self::default()
        }
    }

    pub fn excluding(mut self, node: NodeId) -> Self {
        self.exclude = Some(node);
        self
    }

    pub fn with_prefixes(mut self, prefixes: Vec<String>) -> Self {
        self.inclusive_prefixes = prefixes;
        self
    }

    /// Whether `id` is inside the root subtree and outside the excluded one.
    pub fn contains(&self, arena: &EventArena, id: NodeId) -> bool {
        let within = |top: NodeId| top == id || arena.is_ancestor(top, id);
        self.root.map_or(true, within) && !self.exclude.is_some_and(within)
    }
}

/// Turns a selection of the event arena into canonical octets.
pub trait Canonicalizer {
    fn canonicalize(
        &self,
        mode: C14nMode,
        arena: &EventArena,
        selection: &Selection,
    ) -> Result<Vec<u8>, Error>;
}

impl<C: Canonicalizer + ?Sized> Canonicalizer for &C {
    fn canonicalize(
        &self,
        mode: C14nMode,
        arena: &EventArena,
        selection: &Selection,
    ) -> Result<Vec<u8>, Error> {
        (**self).canonicalize(mode, arena, selection)
    }
}

/// Mode named by the `Algorithm` attribute of `method`.
pub(crate) fn mode_of(arena: &EventArena, method: NodeId) -> Result<C14nMode, Error> {
    let uri = arena
        .attribute(method, ns::attr::ALGORITHM)
        .ok_or_else(|| Error::MissingAttribute("Algorithm on CanonicalizationMethod".into()))?;
    C14nMode::from_uri(uri).ok_or_else(|| Error::UnsupportedAlgorithm(format!("C14N: {uri}")))
}

/// `PrefixList` of an `ec:InclusiveNamespaces` child of `method`.
pub(crate) fn inclusive_prefixes(arena: &EventArena, method: NodeId) -> Vec<String> {
    arena
        .find_child(method, ns::EXC_C14N, ns::node::INCLUSIVE_NAMESPACES)
        .and_then(|n| arena.attribute(n, ns::attr::PREFIX_LIST))
        .map(|list| list.split_whitespace().map(str::to_owned).collect())
        .unwrap_or_default()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use sigill_xml::{parse_events, XmlSecEvent};
    use std::fmt::Write;

    /// Serializes the selected events back to markup. Namespace
    /// declarations are emitted only where they were written; enough to
    /// exercise the engine without implementing a real C14N.
    pub(crate) struct EventSerializer;

    impl Canonicalizer for EventSerializer {
        fn canonicalize(
            &self,
            mode: C14nMode,
            arena: &EventArena,
            selection: &Selection,
        ) -> Result<Vec<u8>, Error> {
            let mut out = String::new();
            for (id, node) in arena.iter() {
                if !selection.contains(arena, id) {
                    continue;
                }
                match node.event() {
                    XmlSecEvent::StartElement {
                        name,
                        namespaces,
                        attributes,
                    } => {
                        let _ = write!(out, "<{name}");
                        for n in namespaces {
                            match &n.prefix {
                                Some(p) => {
                                    let _ = write!(out, " xmlns:{p}=\"{}\"", n.uri);
                                }
                                None => {
                                    let _ = write!(out, " xmlns=\"{}\"", n.uri);
                                }
                            }
                        }
                        for a in attributes {
                            let _ = write!(out, " {}=\"{}\"", a.name, a.value);
                        }
                        out.push('>');
                    }
                    XmlSecEvent::EndElement { name } => {
                        let _ = write!(out, "</{name}>");
                    }
                    XmlSecEvent::Characters { text } => out.push_str(text),
                    XmlSecEvent::Comment { text } if mode.with_comments() => {
                        let _ = write!(out, "<!--{text}-->");
                    }
                    _ => {}
                }
            }
            Ok(out.into_bytes())
        }
    }

    #[test]
    fn test_mode_uri_round_trip() {
        for uri in [
            algorithm::C14N,
            algorithm::C14N_WITH_COMMENTS,
            algorithm::C14N11,
            algorithm::C14N11_WITH_COMMENTS,
            algorithm::EXC_C14N,
            algorithm::EXC_C14N_WITH_COMMENTS,
        ] {
            assert_eq!(C14nMode::from_uri(uri).map(|m| m.uri()), Some(uri));
        }
        assert!(C14nMode::from_uri(algorithm::SHA256).is_none());
        assert!(C14nMode::ExclusiveWithComments.is_exclusive());
        assert!(!C14nMode::Inclusive11.with_comments());
    }

    #[test]
    fn test_selection_excludes_subtree() {
        let arena = parse_events("<a><b><c/></b><d>x</d></a>").unwrap();
        let a = arena.find_element("", "a").unwrap();
        let b = arena.find_element("", "b").unwrap();
        let c = arena.find_element("", "c").unwrap();
        let d = arena.find_element("", "d").unwrap();

        let whole = Selection::document().excluding(b);
        assert!(whole.contains(&arena, a));
        assert!(!whole.contains(&arena, b));
        assert!(!whole.contains(&arena, c));
        assert!(whole.contains(&arena, d));

        let only_d = Selection::subtree(d);
        assert!(!only_d.contains(&arena, a));
        assert!(only_d.contains(&arena, d));
    }

    #[test]
    fn test_serializer_skips_excluded() {
        let arena = parse_events("<a><b>gone</b><d>kept</d></a>").unwrap();
        let b = arena.find_element("", "b").unwrap();
        let bytes = EventSerializer
            .canonicalize(C14nMode::Inclusive, &arena, &Selection::document().excluding(b))
            .unwrap();
        assert_eq!(bytes, b"<a><d>kept</d></a>");
    }

    #[test]
    fn test_inclusive_prefixes() {
        let arena = parse_events(&format!(
            r#"<m xmlns:ec="{}"><ec:InclusiveNamespaces PrefixList="ds  soap"/></m>"#,
            ns::EXC_C14N
        ))
        .unwrap();
        let m = arena.find_element("", "m").unwrap();
        assert_eq!(inclusive_prefixes(&arena, m), vec!["ds", "soap"]);
    }
}
