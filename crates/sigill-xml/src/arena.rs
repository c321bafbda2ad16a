#![forbid(unsafe_code)]

//! Event arena owned by one processing pass.
//!
//! Every node records the [`NodeId`] of its nearest enclosing start element.
//! A parent handle can only name a node that already exists and is still
//! open when the child is pushed, so handles always point backwards and no
//! node can become its own ancestor. Handles are lookups only: nothing is
//! freed or mutated through them.

use crate::event::{Attribute, EventKind, Namespace, QName, XmlSecEvent};
use sigill_core::{ns, Error};
use std::collections::{BTreeMap, HashMap};

/// Handle to a node in an [`EventArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position in document order.
    pub fn index(self) -> usize {
        self.0
    }
}

/// An event plus its structural parent.
#[derive(Debug, Clone)]
pub struct XmlSecNode {
    event: XmlSecEvent,
    parent: Option<NodeId>,
}

impl XmlSecNode {
    pub fn event(&self) -> &XmlSecEvent {
        &self.event
    }

    /// The enclosing start element. For an end element this is the start
    /// element it closes.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }
}

/// Append-only store of the events of one document.
#[derive(Debug, Default, Clone)]
pub struct EventArena {
    nodes: Vec<XmlSecNode>,
    /// start element index -> matching end element index
    ends: HashMap<usize, usize>,
    /// Start elements not yet closed, innermost last.
    open: Vec<usize>,
}

impl EventArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event under `parent`.
    ///
    /// `parent` must be the innermost open start element of this arena,
    /// or `None` when no element is open. End elements are appended with
    /// [`EventArena::push_end`].
    pub fn push(&mut self, parent: Option<NodeId>, event: XmlSecEvent) -> Result<NodeId, Error> {
        if event.kind() == EventKind::EndElement {
            return Err(Error::XmlStructure(
                "end elements are appended with push_end".into(),
            ));
        }
        if let Some(p) = parent {
            self.check_open_element(p)?;
        }
        let innermost = self.open.last().copied().map(NodeId);
        if parent != innermost {
            return Err(Error::XmlStructure(format!(
                "parent {:?} is not the innermost open element {:?}",
                parent.map(NodeId::index),
                innermost.map(NodeId::index)
            )));
        }
        let id = NodeId(self.nodes.len());
        if event.is_start_element() {
            self.open.push(id.0);
        }
        self.nodes.push(XmlSecNode { event, parent });
        Ok(id)
    }

    /// Close the start element `element`, which must be the innermost open
    /// element.
    pub fn push_end(&mut self, element: NodeId) -> Result<NodeId, Error> {
        self.check_open_element(element)?;
        if self.open.last() != Some(&element.0) {
            return Err(Error::XmlStructure(format!(
                "element {} still has open descendants",
                element.0
            )));
        }
        let name = self
            .element_name(element)
            .cloned()
            .ok_or_else(|| Error::XmlStructure("not a start element".into()))?;
        let id = NodeId(self.nodes.len());
        self.nodes.push(XmlSecNode {
            event: XmlSecEvent::EndElement { name },
            parent: Some(element),
        });
        self.ends.insert(element.0, id.0);
        self.open.pop();
        Ok(id)
    }

    fn check_open_element(&self, id: NodeId) -> Result<(), Error> {
        let node = self
            .get(id)
            .ok_or_else(|| Error::XmlStructure(format!("unknown node handle {}", id.0)))?;
        if !node.event.is_start_element() {
            return Err(Error::XmlStructure(format!(
                "node {} is a {:?}, not a start element",
                id.0,
                node.kind()
            )));
        }
        if self.ends.contains_key(&id.0) {
            return Err(Error::XmlStructure(format!("element {} is already closed", id.0)));
        }
        Ok(())
    }

    pub fn get(&self, id: NodeId) -> Option<&XmlSecNode> {
        self.nodes.get(id.0)
    }

    pub fn event(&self, id: NodeId) -> Option<&XmlSecEvent> {
        self.get(id).map(|n| &n.event)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(|n| n.parent)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in document order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &XmlSecNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Enclosing start elements, nearest first.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            arena: self,
            next: self.parent(id),
        }
    }

    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        self.ancestors(id).any(|a| a == ancestor)
    }

    /// The element whose namespace scope applies at `id`: the node itself for
    /// a start element, its parent otherwise.
    fn scope_element(&self, id: NodeId) -> Option<NodeId> {
        let node = self.get(id)?;
        if node.event.is_start_element() {
            Some(id)
        } else {
            node.parent
        }
    }

    /// Scope element followed by its ancestors.
    fn scope_chain(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let start = self.scope_element(id);
        std::iter::successors(start, move |n| self.parent(*n))
    }

    pub fn element_name(&self, id: NodeId) -> Option<&QName> {
        match self.event(id)? {
            XmlSecEvent::StartElement { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        match self.event(id) {
            Some(XmlSecEvent::StartElement { attributes, .. }) => attributes,
            _ => &[],
        }
    }

    pub fn declared_namespaces(&self, id: NodeId) -> &[Namespace] {
        match self.event(id) {
            Some(XmlSecEvent::StartElement { namespaces, .. }) => namespaces,
            _ => &[],
        }
    }

    /// Attribute without a namespace, by local name.
    pub fn attribute(&self, id: NodeId, local_name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|a| a.name.namespace.is_none() && a.name.local_name == local_name)
            .map(|a| a.value.as_str())
    }

    /// Resolve `prefix` (`None` for the default namespace) in scope at `id`.
    pub fn lookup_namespace(&self, id: NodeId, prefix: Option<&str>) -> Option<&str> {
        if prefix == Some("xml") {
            return Some(ns::XML);
        }
        for el in self.scope_chain(id) {
            if let Some(decl) = self
                .declared_namespaces(el)
                .iter()
                .find(|d| d.prefix.as_deref() == prefix)
            {
                return if decl.uri.is_empty() {
                    None
                } else {
                    Some(decl.uri.as_str())
                };
            }
        }
        None
    }

    /// Every namespace binding in scope at `id`, keyed by prefix.
    pub fn in_scope_namespaces(&self, id: NodeId) -> BTreeMap<Option<String>, String> {
        let chain: Vec<NodeId> = self.scope_chain(id).collect();
        let mut scope = BTreeMap::new();
        for el in chain.into_iter().rev() {
            for decl in self.declared_namespaces(el) {
                if decl.uri.is_empty() {
                    scope.remove(&decl.prefix);
                } else {
                    scope.insert(decl.prefix.clone(), decl.uri.clone());
                }
            }
        }
        scope
    }

    /// Nearest value of an attribute on the scope element or its ancestors,
    /// e.g. `xml:lang` or `xml:space`.
    pub fn inherited_attribute(&self, id: NodeId, namespace: &str, local_name: &str) -> Option<&str> {
        self.scope_chain(id).find_map(|el| {
            self.attributes(el)
                .iter()
                .find(|a| a.name.is(namespace, local_name))
                .map(|a| a.value.as_str())
        })
    }

    /// Last node of the subtree rooted at `element` (its end element, or the
    /// last node pushed while it is still open).
    fn subtree_end(&self, element: NodeId) -> usize {
        self.ends
            .get(&element.0)
            .copied()
            .unwrap_or(self.nodes.len().saturating_sub(1))
    }

    /// `element`, its descendants and its end element, in document order.
    pub fn subtree(&self, element: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let range = if self.element_name(element).is_some() {
            element.0..self.subtree_end(element) + 1
        } else {
            0..0
        };
        range.map(NodeId)
    }

    /// Direct children of `element`, excluding its end element.
    pub fn children(&self, element: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.subtree(element).skip(1).filter(move |id| {
            let node = &self.nodes[id.0];
            node.parent == Some(element) && node.kind() != EventKind::EndElement
        })
    }

    pub fn child_elements(&self, element: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(element)
            .filter(|id| self.nodes[id.0].event.is_start_element())
    }

    pub fn find_child(&self, element: NodeId, ns: &str, local_name: &str) -> Option<NodeId> {
        self.child_elements(element)
            .find(|c| self.element_name(*c).is_some_and(|n| n.is(ns, local_name)))
    }

    pub fn find_children<'a>(
        &'a self,
        element: NodeId,
        ns: &'a str,
        local_name: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.child_elements(element)
            .filter(move |c| self.element_name(*c).is_some_and(|n| n.is(ns, local_name)))
    }

    /// Concatenated character data of the direct children of `element`.
    pub fn text(&self, element: NodeId) -> String {
        self.children(element)
            .filter_map(|id| match &self.nodes[id.0].event {
                XmlSecEvent::Characters { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// First element in document order with the given name.
    pub fn find_element(&self, ns: &str, local_name: &str) -> Option<NodeId> {
        self.iter()
            .find(|(_, n)| n.event.name().is_some_and(|q| q.is(ns, local_name)) && n.event.is_start_element())
            .map(|(id, _)| id)
    }

    /// First element carrying one of `id_attrs` with value `value`.
    ///
    /// Attribute names match either an un-namespaced local name (`Id`) or
    /// the qualified name as written (`wsu:Id`).
    pub fn find_by_id(&self, value: &str, id_attrs: &[&str]) -> Option<NodeId> {
        self.iter()
            .filter(|(_, n)| n.event.is_start_element())
            .find(|(id, _)| {
                self.attributes(*id).iter().any(|a| {
                    a.value == value
                        && id_attrs.iter().any(|want| {
                            (a.name.namespace.is_none() && a.name.local_name == *want)
                                || a.name.to_string() == *want
                        })
                })
            })
            .map(|(id, _)| id)
    }
}

/// Iterator over the enclosing start elements of a node.
pub struct Ancestors<'a> {
    arena: &'a EventArena,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        self.next = self.arena.parent(current);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(ns: Option<&str>, local: &str) -> XmlSecEvent {
        XmlSecEvent::start_element(QName::new(ns, local))
    }

    /// <root xmlns="urn:a" xmlns:b="urn:b" xml:lang="en">
    ///   <b:child>text<!--c--></b:child>
    ///   <other xmlns="">x</other>
    /// </root>
    fn sample() -> (EventArena, NodeId, NodeId, NodeId, NodeId) {
        let mut arena = EventArena::new();
        let root = arena
            .push(
                None,
                XmlSecEvent::StartElement {
                    name: QName::new(Some("urn:a"), "root"),
                    namespaces: vec![
                        Namespace::new(None, "urn:a"),
                        Namespace::new(Some("b"), "urn:b"),
                    ],
                    attributes: vec![Attribute::new(
                        QName::new(Some(ns::XML), "lang").with_prefix("xml"),
                        "en",
                    )],
                },
            )
            .unwrap();
        let child = arena.push(Some(root), element(Some("urn:b"), "child")).unwrap();
        arena.push(Some(child), XmlSecEvent::characters("text")).unwrap();
        let comment = arena.push(Some(child), XmlSecEvent::comment("c")).unwrap();
        arena.push_end(child).unwrap();
        let other = arena
            .push(
                Some(root),
                XmlSecEvent::StartElement {
                    name: QName::new(None, "other"),
                    namespaces: vec![Namespace::new(None, "")],
                    attributes: vec![],
                },
            )
            .unwrap();
        arena.push(Some(other), XmlSecEvent::characters("x")).unwrap();
        arena.push_end(other).unwrap();
        arena.push_end(root).unwrap();
        (arena, root, child, comment, other)
    }

    #[test]
    fn test_parent_and_ancestors() {
        let (arena, root, child, comment, _) = sample();
        assert_eq!(arena.parent(comment), Some(child));
        let ancestors: Vec<_> = arena.ancestors(comment).collect();
        assert_eq!(ancestors, vec![child, root]);
        assert!(arena.is_ancestor(root, comment));
        assert_eq!(arena.parent(root), None);
    }

    #[test]
    fn test_no_node_is_its_own_ancestor() {
        let (arena, ..) = sample();
        for (id, _) in arena.iter() {
            assert!(!arena.ancestors(id).any(|a| a == id));
            assert!(arena.ancestors(id).all(|a| a < id));
        }
    }

    #[test]
    fn test_ancestors_never_reach_siblings() {
        let (arena, _, child, _, other) = sample();
        for id in arena.subtree(other) {
            assert!(!arena.ancestors(id).any(|a| a == child));
        }
    }

    #[test]
    fn test_parent_must_exist_and_be_open() {
        let (mut arena, root, child, comment, _) = sample();
        assert!(arena.push(Some(NodeId(999)), XmlSecEvent::comment("x")).is_err());
        assert!(arena.push(Some(comment), XmlSecEvent::comment("x")).is_err());
        assert!(arena.push(Some(child), XmlSecEvent::comment("x")).is_err());
        assert!(arena.push_end(root).is_err());
        assert!(arena
            .push(None, XmlSecEvent::EndElement { name: QName::new(None, "a") })
            .is_err());
    }

    #[test]
    fn test_elements_close_innermost_first() {
        let mut arena = EventArena::new();
        let root = arena.push(None, element(None, "root")).unwrap();
        let a = arena.push(Some(root), element(None, "a")).unwrap();

        // <root> cannot close around an open <a>, nor take siblings of <a>.
        assert!(arena.push_end(root).is_err());
        assert!(arena.push(Some(root), XmlSecEvent::characters("x")).is_err());
        assert!(arena.push(None, XmlSecEvent::comment("top")).is_err());

        arena.push(Some(a), XmlSecEvent::characters("in a")).unwrap();
        arena.push_end(a).unwrap();
        arena.push_end(root).unwrap();
        assert!(arena.push(Some(a), XmlSecEvent::characters("late")).is_err());
        arena.push(None, XmlSecEvent::comment("after")).unwrap();

        let subtree: Vec<_> = arena.subtree(root).map(NodeId::index).collect();
        assert_eq!(subtree, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_namespace_lookup() {
        let (arena, root, child, comment, other) = sample();
        assert_eq!(arena.lookup_namespace(comment, None), Some("urn:a"));
        assert_eq!(arena.lookup_namespace(comment, Some("b")), Some("urn:b"));
        assert_eq!(arena.lookup_namespace(child, Some("xml")), Some(ns::XML));
        assert_eq!(arena.lookup_namespace(other, None), None);
        assert_eq!(arena.lookup_namespace(other, Some("b")), Some("urn:b"));
        assert_eq!(arena.lookup_namespace(root, Some("zz")), None);

        let scope = arena.in_scope_namespaces(other);
        assert_eq!(scope.len(), 1);
        assert_eq!(scope.get(&Some("b".to_string())).map(String::as_str), Some("urn:b"));
    }

    #[test]
    fn test_inherited_attribute() {
        let (arena, _, _, comment, _) = sample();
        assert_eq!(arena.inherited_attribute(comment, ns::XML, "lang"), Some("en"));
        assert_eq!(arena.inherited_attribute(comment, ns::XML, "space"), None);
    }

    #[test]
    fn test_children_and_text() {
        let (arena, root, child, _, other) = sample();
        let kids: Vec<_> = arena.child_elements(root).collect();
        assert_eq!(kids, vec![child, other]);
        assert_eq!(arena.text(child), "text");
        assert_eq!(arena.find_child(root, "", "other"), Some(other));
        assert_eq!(arena.find_element("urn:b", "child"), Some(child));
        assert_eq!(arena.subtree(child).count(), 4);
    }

    #[test]
    fn test_end_element_points_at_its_start() {
        let (arena, root, ..) = sample();
        let last = NodeId(arena.len() - 1);
        assert_eq!(arena.get(last).unwrap().kind(), EventKind::EndElement);
        assert_eq!(arena.parent(last), Some(root));
        assert_eq!(arena.event(last).unwrap().name().unwrap().local_name, "root");
    }
}
