use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use thiserror::Error;
use xstep_core::AddressingError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MockStoreError {
    #[error("XML parsing failed: {0}")]
    Xml(String),
    #[error("document has no root element")]
    NoRoot,
    #[error("document has more than one root element")]
    MultipleRoots,
    #[error(transparent)]
    Addressing(#[from] AddressingError),
}

impl MockStoreError {
    fn xml(err: impl ToString) -> Self {
        Self::Xml(err.to_string())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpecKind {
    Element,
    Attribute,
    Text,
    Comment,
    ProcessingInstruction,
}

/// Description of one node and its subtree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeSpec {
    pub(crate) kind: SpecKind,
    pub(crate) name: Option<String>,
    pub(crate) value: Option<String>,
    pub(crate) attributes: Vec<NodeSpec>,
    pub(crate) children: Vec<NodeSpec>,
}

impl NodeSpec {
    fn leaf(kind: SpecKind, name: Option<String>, value: Option<String>) -> Self {
        Self { kind, name, value, attributes: Vec::new(), children: Vec::new() }
    }

    pub fn elem(name: impl Into<String>) -> Self {
        Self::leaf(SpecKind::Element, Some(name.into()), None)
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::leaf(SpecKind::Text, None, Some(value.into()))
    }

    pub fn comment(value: impl Into<String>) -> Self {
        Self::leaf(SpecKind::Comment, None, Some(value.into()))
    }

    pub fn processing_instruction(target: impl Into<String>, value: impl Into<String>) -> Self {
        Self::leaf(SpecKind::ProcessingInstruction, Some(target.into()), Some(value.into()))
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Self::leaf(SpecKind::Attribute, Some(name.into()), Some(value.into())));
        self
    }

    pub fn with_child(mut self, child: NodeSpec) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children<I>(mut self, children: I) -> Self
    where
        I: IntoIterator<Item = NodeSpec>,
    {
        self.children.extend(children);
        self
    }

    pub fn with_text(self, value: impl Into<String>) -> Self {
        self.with_child(Self::text(value))
    }

    pub fn kind(&self) -> SpecKind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Slots this node needs below it: attributes first, then children.
    pub(crate) fn slot_count(&self) -> usize {
        self.attributes.len() + self.children.len()
    }

    /// Parses a document element from XML text. Whitespace-only text is dropped.
    pub fn from_xml(xml: &str) -> Result<Self, MockStoreError> {
        let mut reader = Reader::from_str(xml);
        let mut stack: Vec<NodeSpec> = Vec::new();
        let mut root: Option<NodeSpec> = None;
        // Character data arrives in pieces around entity references.
        let mut text = String::new();
        loop {
            let event = reader.read_event().map_err(MockStoreError::xml)?;
            if !matches!(event, Event::Text(_) | Event::GeneralRef(_) | Event::CData(_)) {
                flush_text(&mut stack, &mut text);
            }
            match event {
                Event::Start(start) => stack.push(element_from(&start)?),
                Event::Empty(start) => {
                    let element = element_from(&start)?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack.pop().ok_or_else(|| MockStoreError::xml("unbalanced end tag"))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(raw) => {
                    let raw = std::str::from_utf8(&raw).map_err(MockStoreError::xml)?;
                    text.push_str(&quick_xml::escape::unescape(raw).map_err(MockStoreError::xml)?);
                }
                Event::GeneralRef(entity) => {
                    let name = std::str::from_utf8(&entity).map_err(MockStoreError::xml)?;
                    text.push_str(&resolve_entity(name)?);
                }
                Event::CData(data) => {
                    text.push_str(std::str::from_utf8(&data).map_err(MockStoreError::xml)?);
                }
                Event::Comment(comment) => {
                    let value = std::str::from_utf8(&comment).map_err(MockStoreError::xml)?;
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(NodeSpec::comment(value.trim()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        if !stack.is_empty() {
            return Err(MockStoreError::xml("unclosed element"));
        }
        root.ok_or(MockStoreError::NoRoot)
    }
}

fn flush_text(stack: &mut [NodeSpec], text: &mut String) {
    let value = std::mem::take(text);
    if let Some(parent) = stack.last_mut()
        && !value.trim().is_empty()
    {
        parent.children.push(NodeSpec::text(value));
    }
}

fn resolve_entity(name: &str) -> Result<String, MockStoreError> {
    let resolved = match name.strip_prefix('#') {
        Some(code) => {
            let value = match code.strip_prefix('x') {
                Some(hex) => u32::from_str_radix(hex, 16).ok(),
                None => code.parse().ok(),
            };
            value.and_then(char::from_u32).map(String::from)
        }
        None => quick_xml::escape::resolve_predefined_entity(name).map(str::to_owned),
    };
    resolved.ok_or_else(|| MockStoreError::Xml(format!("unknown entity &{name};")))
}

fn element_from(start: &BytesStart<'_>) -> Result<NodeSpec, MockStoreError> {
    let name = std::str::from_utf8(start.name().as_ref()).map_err(MockStoreError::xml)?.to_owned();
    let mut element = NodeSpec::elem(name);
    for attribute in start.attributes() {
        let attribute = attribute.map_err(MockStoreError::xml)?;
        let key = std::str::from_utf8(attribute.key.as_ref()).map_err(MockStoreError::xml)?;
        if key == "xmlns" || key.starts_with("xmlns:") {
            continue;
        }
        let raw = std::str::from_utf8(&attribute.value).map_err(MockStoreError::xml)?;
        let value = quick_xml::escape::unescape(raw).map_err(MockStoreError::xml)?;
        element = element.with_attr(key, value.into_owned());
    }
    Ok(element)
}

fn attach(stack: &mut [NodeSpec], root: &mut Option<NodeSpec>, element: NodeSpec) -> Result<(), MockStoreError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_some() => return Err(MockStoreError::MultipleRoots),
        None => *root = Some(element),
    }
    Ok(())
}

/// A document to be stored: its URI and document element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentSpec {
    pub(crate) uri: String,
    pub(crate) root: NodeSpec,
}

impl DocumentSpec {
    pub fn new(uri: impl Into<String>, root: NodeSpec) -> Self {
        Self { uri: uri.into(), root }
    }

    pub fn from_xml(uri: impl Into<String>, xml: &str) -> Result<Self, MockStoreError> {
        Ok(Self::new(uri, NodeSpec::from_xml(xml)?))
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn root(&self) -> &NodeSpec {
        &self.root
    }
}
