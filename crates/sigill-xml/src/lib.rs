#![forbid(unsafe_code)]

//! Streaming XML security event model for the Sigill XML Security library.
//!
//! Parsed documents become an [`EventArena`]: a flat, document-ordered list
//! of [`XmlSecEvent`]s in which every node knows its enclosing start element.
//! Namespace scope and inherited `xml:*` attributes are answered by walking
//! those parent handles.

pub mod arena;
pub mod event;
pub mod reader;

pub use arena::{EventArena, NodeId, XmlSecNode};
pub use event::{Attribute, EventKind, Namespace, QName, XmlSecEvent};
pub use reader::parse_events;

/// Return roxmltree parsing options that allow DTD.
///
/// roxmltree does not expand external entities or perform entity
/// substitution beyond internal declarations, so DTDs are safe to accept.
pub fn parsing_options() -> roxmltree::ParsingOptions {
    roxmltree::ParsingOptions {
        allow_dtd: true,
        ..roxmltree::ParsingOptions::default()
    }
}
