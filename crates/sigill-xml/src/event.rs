#![forbid(unsafe_code)]

//! XML security events.
//!
//! One [`XmlSecEvent`] per parser token. Events are plain values; structural
//! context (the enclosing element) lives on the [`crate::arena::XmlSecNode`]
//! that wraps the event once it is pushed into an arena.

use std::fmt;

/// Node-kind discriminant shared with canonicalization.
///
/// [`EventKind::code`] follows the `XMLStreamConstants` numbering, so the
/// kind survives a trip through any StAX-style consumer unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    StartElement,
    EndElement,
    ProcessingInstruction,
    Characters,
    Comment,
    StartDocument,
    EndDocument,
    EntityReference,
    Attribute,
    Dtd,
    Namespace,
}

impl EventKind {
    /// Every kind, in code order.
    pub const ALL: [EventKind; 11] = [
        EventKind::StartElement,
        EventKind::EndElement,
        EventKind::ProcessingInstruction,
        EventKind::Characters,
        EventKind::Comment,
        EventKind::StartDocument,
        EventKind::EndDocument,
        EventKind::EntityReference,
        EventKind::Attribute,
        EventKind::Dtd,
        EventKind::Namespace,
    ];

    /// The generic node-kind code.
    pub const fn code(self) -> u8 {
        match self {
            Self::StartElement => 1,
            Self::EndElement => 2,
            Self::ProcessingInstruction => 3,
            Self::Characters => 4,
            Self::Comment => 5,
            Self::StartDocument => 7,
            Self::EndDocument => 8,
            Self::EntityReference => 9,
            Self::Attribute => 10,
            Self::Dtd => 11,
            Self::Namespace => 13,
        }
    }

    /// Inverse of [`EventKind::code`].
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.code() == code)
    }
}

/// A namespace-qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QName {
    /// Namespace URI, `None` when the name is not in a namespace.
    pub namespace: Option<String>,
    /// Prefix as written in the source document.
    pub prefix: Option<String>,
    pub local_name: String,
}

impl QName {
    pub fn new(namespace: Option<&str>, local_name: &str) -> Self {
        Self {
            namespace: namespace.map(str::to_owned),
            prefix: None,
            local_name: local_name.to_owned(),
        }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(prefix.to_owned());
        self
    }

    /// Match on namespace URI and local name. An empty `ns` matches names
    /// without a namespace.
    pub fn is(&self, ns: &str, local_name: &str) -> bool {
        self.local_name == local_name && self.namespace.as_deref().unwrap_or("") == ns
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(p) if !p.is_empty() => write!(f, "{p}:{}", self.local_name),
            _ => f.write_str(&self.local_name),
        }
    }
}

/// An attribute on a start element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: QName,
    pub value: String,
}

impl Attribute {
    pub fn new(name: QName, value: impl Into<String>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// A namespace declaration. An empty `uri` on the default namespace
/// undeclares it (`xmlns=""`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub prefix: Option<String>,
    pub uri: String,
}

impl Namespace {
    pub fn new(prefix: Option<&str>, uri: &str) -> Self {
        Self {
            prefix: prefix.map(str::to_owned),
            uri: uri.to_owned(),
        }
    }
}

/// A single structural XML event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlSecEvent {
    StartDocument {
        version: Option<String>,
        encoding: Option<String>,
        standalone: Option<bool>,
    },
    EndDocument,
    StartElement {
        name: QName,
        /// Declarations made on this element only.
        namespaces: Vec<Namespace>,
        attributes: Vec<Attribute>,
    },
    EndElement {
        name: QName,
    },
    Characters {
        text: String,
    },
    Comment {
        text: String,
    },
    ProcessingInstruction {
        target: String,
        data: Option<String>,
    },
    EntityReference {
        name: String,
        replacement: Option<String>,
    },
    Attribute(Attribute),
    Namespace(Namespace),
    Dtd {
        text: String,
    },
}

impl XmlSecEvent {
    pub fn start_element(name: QName) -> Self {
        Self::StartElement {
            name,
            namespaces: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn characters(text: impl Into<String>) -> Self {
        Self::Characters { text: text.into() }
    }

    pub fn comment(text: impl Into<String>) -> Self {
        Self::Comment { text: text.into() }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::StartDocument { .. } => EventKind::StartDocument,
            Self::EndDocument => EventKind::EndDocument,
            Self::StartElement { .. } => EventKind::StartElement,
            Self::EndElement { .. } => EventKind::EndElement,
            Self::Characters { .. } => EventKind::Characters,
            Self::Comment { .. } => EventKind::Comment,
            Self::ProcessingInstruction { .. } => EventKind::ProcessingInstruction,
            Self::EntityReference { .. } => EventKind::EntityReference,
            Self::Attribute(_) => EventKind::Attribute,
            Self::Namespace(_) => EventKind::Namespace,
            Self::Dtd { .. } => EventKind::Dtd,
        }
    }

    /// Shorthand for `self.kind().code()`.
    pub fn event_type(&self) -> u8 {
        self.kind().code()
    }

    /// Element name for start and end elements.
    pub fn name(&self) -> Option<&QName> {
        match self {
            Self::StartElement { name, .. } | Self::EndElement { name } => Some(name),
            _ => None,
        }
    }

    /// Text payload of character and comment events.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Characters { text } | Self::Comment { text } => Some(text),
            _ => None,
        }
    }

    pub fn is_start_element(&self) -> bool {
        matches!(self, Self::StartElement { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_codes_round_trip() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(EventKind::from_code(6), None);
        assert_eq!(EventKind::from_code(0), None);
    }

    #[test]
    fn test_comment_event() {
        let ev = XmlSecEvent::comment(" signed ");
        assert_eq!(ev.kind(), EventKind::Comment);
        assert_eq!(ev.event_type(), 5);
        assert_eq!(ev.text(), Some(" signed "));
        assert!(ev.name().is_none());
    }

    #[test]
    fn test_qname_display() {
        let name = QName::new(Some("urn:x"), "Item").with_prefix("x");
        assert_eq!(name.to_string(), "x:Item");
        assert!(name.is("urn:x", "Item"));
        assert!(!name.is("", "Item"));
        assert_eq!(QName::new(None, "a").to_string(), "a");
    }
}
