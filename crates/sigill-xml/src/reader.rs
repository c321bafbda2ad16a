#![forbid(unsafe_code)]

//! Turn a parsed `roxmltree` document into an [`EventArena`].
//!
//! The whole document is buffered so that same-document references may
//! point forward.

use crate::arena::{EventArena, NodeId};
use crate::event::{Attribute, Namespace, QName, XmlSecEvent};
use sigill_core::{ns, Error};

/// Parse `xml` into an event arena.
///
/// The arena starts with a `StartDocument` event and ends with an
/// `EndDocument` event; top-level nodes have no parent.
pub fn parse_events(xml: &str) -> Result<EventArena, Error> {
    let doc = roxmltree::Document::parse_with_options(xml, crate::parsing_options())
        .map_err(|e| Error::XmlParse(e.to_string()))?;
    events_from_document(&doc)
}

/// Build an event arena from an already parsed document.
pub fn events_from_document(doc: &roxmltree::Document<'_>) -> Result<EventArena, Error> {
    let mut arena = EventArena::new();
    arena.push(
        None,
        XmlSecEvent::StartDocument {
            version: Some("1.0".into()),
            encoding: None,
            standalone: None,
        },
    )?;
    for child in doc.root().children() {
        emit(&mut arena, child, None)?;
    }
    arena.push(None, XmlSecEvent::EndDocument)?;
    Ok(arena)
}

fn emit(
    arena: &mut EventArena,
    node: roxmltree::Node<'_, '_>,
    parent: Option<NodeId>,
) -> Result<(), Error> {
    match node.node_type() {
        roxmltree::NodeType::Element => {
            let id = arena.push(parent, start_element(node))?;
            for child in node.children() {
                emit(arena, child, Some(id))?;
            }
            arena.push_end(id)?;
        }
        roxmltree::NodeType::Text => {
            if let Some(text) = node.text() {
                arena.push(parent, XmlSecEvent::characters(text))?;
            }
        }
        roxmltree::NodeType::Comment => {
            if let Some(text) = node.text() {
                arena.push(parent, XmlSecEvent::comment(text))?;
            }
        }
        roxmltree::NodeType::PI => {
            if let Some(pi) = node.pi() {
                arena.push(
                    parent,
                    XmlSecEvent::ProcessingInstruction {
                        target: pi.target.to_owned(),
                        data: pi.value.map(str::to_owned),
                    },
                )?;
            }
        }
        roxmltree::NodeType::Root => {}
    }
    Ok(())
}

fn start_element(node: roxmltree::Node<'_, '_>) -> XmlSecEvent {
    let tag = node.tag_name();
    let mut name = QName::new(tag.namespace(), tag.name());
    if let Some(prefix) = tag.namespace().and_then(|uri| node.lookup_prefix(uri)) {
        if !prefix.is_empty() {
            name = name.with_prefix(prefix);
        }
    }

    let attributes = node
        .attributes()
        .map(|a| {
            let mut qname = QName::new(a.namespace(), a.name());
            if let Some(uri) = a.namespace() {
                let prefix = if uri == ns::XML {
                    Some("xml")
                } else {
                    node.lookup_prefix(uri)
                };
                if let Some(p) = prefix.filter(|p| !p.is_empty()) {
                    qname = qname.with_prefix(p);
                }
            }
            Attribute::new(qname, a.value())
        })
        .collect();

    XmlSecEvent::StartElement {
        name,
        namespaces: declared_namespaces(node),
        attributes,
    }
}

/// Bindings introduced on `node`: in scope here but not identically in
/// scope on the parent element.
fn declared_namespaces(node: roxmltree::Node<'_, '_>) -> Vec<Namespace> {
    let parent = node.parent_element();
    let inherited = |prefix: Option<&str>, uri: &str| {
        parent.is_some_and(|p| {
            p.namespaces()
                .any(|n| n.name() == prefix && n.uri() == uri)
        })
    };

    let mut declared: Vec<Namespace> = node
        .namespaces()
        .filter(|n| n.name() != Some("xml"))
        .filter(|n| !inherited(n.name(), n.uri()))
        .map(|n| Namespace::new(n.name(), n.uri()))
        .collect();

    let has_default = node.namespaces().any(|n| n.name().is_none());
    let parent_has_default = parent.is_some_and(|p| p.namespaces().any(|n| n.name().is_none()));
    if parent_has_default && !has_default {
        declared.push(Namespace::new(None, ""));
    }
    declared
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventKind;

    #[test]
    fn test_parse_events_structure() {
        let xml = r#"<?xml version="1.0"?>
<!-- top -->
<r:Root xmlns:r="urn:r" Id="a"><Item xmlns="urn:i">v</Item><?pi data?></r:Root>"#;
        let arena = parse_events(xml).unwrap();

        let kinds: Vec<_> = arena.iter().map(|(_, n)| n.kind()).collect();
        assert_eq!(kinds.first(), Some(&EventKind::StartDocument));
        assert_eq!(kinds.last(), Some(&EventKind::EndDocument));
        assert!(kinds.contains(&EventKind::Comment));
        assert!(kinds.contains(&EventKind::ProcessingInstruction));

        let root = arena.find_element("urn:r", "Root").unwrap();
        assert_eq!(arena.parent(root), None);
        assert_eq!(arena.element_name(root).unwrap().to_string(), "r:Root");
        assert_eq!(arena.attribute(root, "Id"), Some("a"));

        let item = arena.find_element("urn:i", "Item").unwrap();
        assert_eq!(arena.parent(item), Some(root));
        assert_eq!(arena.text(item), "v");
        assert_eq!(arena.lookup_namespace(item, Some("r")), Some("urn:r"));
        assert_eq!(arena.lookup_namespace(item, None), Some("urn:i"));
        assert_eq!(arena.declared_namespaces(item).len(), 1);
        assert_eq!(arena.find_by_id("a", &["Id"]), Some(root));
    }

    #[test]
    fn test_default_namespace_undeclared() {
        let xml = r#"<a xmlns="urn:a"><b xmlns=""><c/></b></a>"#;
        let arena = parse_events(xml).unwrap();
        let b = arena.find_element("", "b").unwrap();
        assert!(arena
            .declared_namespaces(b)
            .iter()
            .any(|n| n.prefix.is_none() && n.uri.is_empty()));
        let c = arena.find_element("", "c").unwrap();
        assert_eq!(arena.lookup_namespace(c, None), None);
        assert!(arena.declared_namespaces(c).is_empty());
    }

    #[test]
    fn test_xml_attributes_inherited() {
        let xml = r#"<a xml:space="preserve"><b><c/></b></a>"#;
        let arena = parse_events(xml).unwrap();
        let c = arena.find_element("", "c").unwrap();
        assert_eq!(arena.inherited_attribute(c, ns::XML, "space"), Some("preserve"));
    }

    #[test]
    fn test_malformed_xml_rejected() {
        assert!(matches!(parse_events("<a><b></a>"), Err(Error::XmlParse(_))));
    }
}
