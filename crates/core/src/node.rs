use std::fmt;

use string_cache::DefaultAtom;

/// Identifier of a stored document. Unique within one store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentId(pub u32);

impl DocumentId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "doc#{}", self.0)
    }
}

/// Per-document node identifier.
///
/// Identifiers are only comparable within one document. Numeric order is
/// *not* document order; use [`crate::Document::compare_document_order`]
/// when the preorder position matters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Sentinel returned as the parent of the root element.
    pub const NONE: NodeId = NodeId(0);
    /// Identifier of the document element.
    pub const ROOT: NodeId = NodeId(1);

    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
    Namespace,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Document => "document-node",
            NodeKind::Element => "element",
            NodeKind::Attribute => "attribute",
            NodeKind::Text => "text",
            NodeKind::Comment => "comment",
            NodeKind::ProcessingInstruction => "processing-instruction",
            NodeKind::Namespace => "namespace-node",
        }
    }
}

/// Qualified name with interned local part and namespace.
///
/// Equality ignores the prefix: two names match when local name and
/// namespace URI agree.
#[derive(Clone, Debug, Eq)]
pub struct QName {
    pub prefix: Option<DefaultAtom>,
    pub local: DefaultAtom,
    pub ns_uri: Option<DefaultAtom>,
}

impl QName {
    /// Name without namespace.
    pub fn local(local: &str) -> Self {
        Self { prefix: None, local: DefaultAtom::from(local), ns_uri: None }
    }

    pub fn with_namespace(ns_uri: &str, local: &str) -> Self {
        Self { prefix: None, local: DefaultAtom::from(local), ns_uri: Some(DefaultAtom::from(ns_uri)) }
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = Some(DefaultAtom::from(prefix));
        self
    }

    pub fn local_name(&self) -> &str {
        &self.local
    }

    pub fn namespace(&self) -> Option<&str> {
        self.ns_uri.as_deref()
    }
}

impl PartialEq for QName {
    fn eq(&self, other: &Self) -> bool {
        self.local == other.local && self.ns_uri == other.ns_uri
    }
}

impl std::hash::Hash for QName {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.local.hash(state);
        self.ns_uri.hash(state);
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.prefix, &self.ns_uri) {
            (Some(prefix), _) => write!(f, "{}:{}", prefix, self.local),
            (None, Some(ns)) => write!(f, "Q{{{}}}{}", ns, self.local),
            (None, None) => write!(f, "{}", self.local),
        }
    }
}
