//! The host tree the engine reconciles against.

use std::fmt::Write as _;

use crate::value::{Attributes, Value};
use crate::{NodeError, NodeId};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeType {
    Element,
    Text,
}

/// Primitive operations on a mutable host tree.
///
/// Insertion operations detach the inserted node from its current parent
/// first. `remove_node` only detaches; detaching an unattached node is a
/// no-op.
pub trait Renderer {
    fn create_element(&mut self, tag: &str, svg: bool) -> NodeId;
    fn create_text(&mut self, text: &str) -> NodeId;

    /// Applies one attribute, property or listener change.
    fn set_accessor(
        &mut self,
        node: NodeId,
        name: &str,
        old: Option<&Value>,
        new: Option<&Value>,
        svg: bool,
    ) -> Result<(), NodeError>;

    fn remove_node(&mut self, node: NodeId) -> Result<(), NodeError>;

    fn node_type(&self, node: NodeId) -> Result<NodeType, NodeError>;
    fn node_name(&self, node: NodeId) -> Result<&str, NodeError>;
    fn text(&self, node: NodeId) -> Result<&str, NodeError>;
    fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), NodeError>;

    fn parent(&self, node: NodeId) -> Result<Option<NodeId>, NodeError>;
    fn children(&self, node: NodeId) -> Result<Vec<NodeId>, NodeError>;
    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), NodeError>;
    fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) -> Result<(), NodeError>;
    fn replace_child(&mut self, parent: NodeId, new: NodeId, old: NodeId) -> Result<(), NodeError>;

    fn child_at(&self, parent: NodeId, index: usize) -> Result<Option<NodeId>, NodeError> {
        Ok(self.children(parent)?.get(index).copied())
    }

    fn first_child(&self, parent: NodeId) -> Result<Option<NodeId>, NodeError> {
        Ok(self.children(parent)?.first().copied())
    }

    fn last_child(&self, parent: NodeId) -> Result<Option<NodeId>, NodeError> {
        Ok(self.children(parent)?.last().copied())
    }

    fn next_sibling(&self, node: NodeId) -> Result<Option<NodeId>, NodeError> {
        let Some(parent) = self.parent(node)? else {
            return Ok(None);
        };
        let siblings = self.children(parent)?;
        let index = siblings.iter().position(|&id| id == node);
        Ok(index.and_then(|i| siblings.get(i + 1)).copied())
    }

    fn previous_sibling(&self, node: NodeId) -> Result<Option<NodeId>, NodeError> {
        let Some(parent) = self.parent(node)? else {
            return Ok(None);
        };
        let siblings = self.children(parent)?;
        let index = siblings.iter().position(|&id| id == node);
        Ok(index.and_then(|i| i.checked_sub(1)).and_then(|i| siblings.get(i)).copied())
    }

    /// Attributes present on a node the engine did not create; used when
    /// adopting pre-existing trees.
    fn attributes(&self, _node: NodeId) -> Result<Vec<(String, Value)>, NodeError> {
        Ok(Vec::new())
    }

    /// Live value of a property that user interaction can change.
    fn property(&self, _node: NodeId, _name: &str) -> Result<Option<Value>, NodeError> {
        Ok(None)
    }

    fn is_svg(&self, _node: NodeId) -> bool {
        false
    }

    fn is_text(&self, node: NodeId) -> Result<bool, NodeError> {
        Ok(self.node_type(node)? == NodeType::Text)
    }

    /// Case-insensitive tag comparison. Text nodes never match.
    fn is_named(&self, node: NodeId, tag: &str) -> Result<bool, NodeError> {
        match self.node_type(node)? {
            NodeType::Element => Ok(self.node_name(node)?.eq_ignore_ascii_case(tag)),
            NodeType::Text => Ok(false),
        }
    }
}

/// Operation recorded by [`MemoryRenderer`].
#[derive(Clone, Debug, PartialEq)]
pub enum RendererOp {
    CreateElement { node: NodeId, tag: String },
    CreateText { node: NodeId, text: String },
    SetAccessor { node: NodeId, name: String, value: Option<Value> },
    SetText { node: NodeId, text: String },
    AppendChild { parent: NodeId, child: NodeId },
    InsertBefore { parent: NodeId, child: NodeId, reference: NodeId },
    ReplaceChild { parent: NodeId, new: NodeId, old: NodeId },
    RemoveNode { node: NodeId },
}

impl RendererOp {
    /// Whether this op changed the position of an existing node.
    pub fn is_move(&self) -> bool {
        matches!(
            self,
            RendererOp::AppendChild { .. }
                | RendererOp::InsertBefore { .. }
                | RendererOp::ReplaceChild { .. }
                | RendererOp::RemoveNode { .. }
        )
    }

    pub fn is_create(&self) -> bool {
        matches!(self, RendererOp::CreateElement { .. } | RendererOp::CreateText { .. })
    }
}

const PROPERTIES: &[&str] = &["value", "checked", "selected"];

#[derive(Debug)]
struct ElementData {
    tag: String,
    svg: bool,
    attributes: Attributes,
    properties: Attributes,
    listeners: Attributes,
    inner_html: Option<String>,
}

#[derive(Debug)]
enum NodeKind {
    Element(ElementData),
    Text(String),
}

#[derive(Debug)]
struct MemoryNode {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// In-memory host tree that records every mutation.
#[derive(Debug, Default)]
pub struct MemoryRenderer {
    nodes: Vec<MemoryNode>,
    ops: Vec<RendererOp>,
}

impl MemoryRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a detached element to render into. Not recorded.
    pub fn create_container(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element(ElementData::new(tag, false)))
    }

    /// Builds a tree this renderer did not get from the engine, for adoption
    /// tests. Not recorded.
    pub fn insert_foreign_element(&mut self, parent: NodeId, tag: &str, attributes: Attributes) -> NodeId {
        let mut data = ElementData::new(tag, false);
        data.attributes = attributes;
        let id = self.push(NodeKind::Element(data));
        self.attach(parent, id, None);
        id
    }

    pub fn insert_foreign_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let id = self.push(NodeKind::Text(text.to_owned()));
        self.attach(parent, id, None);
        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ops(&self) -> &[RendererOp] {
        &self.ops
    }

    pub fn take_ops(&mut self) -> Vec<RendererOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn clear_ops(&mut self) {
        self.ops.clear();
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&Value> {
        self.element(node).ok()?.attributes.get(name)
    }

    /// Simulates the user editing a live property such as an input's value.
    pub fn set_property(&mut self, node: NodeId, name: &str, value: Value) -> Result<(), NodeError> {
        self.element_mut(node)?.properties.insert(name.to_owned(), value);
        Ok(())
    }

    /// Calls the listener registered for `event` (without the `on` prefix).
    pub fn dispatch(&self, node: NodeId, event: &str, payload: &Value) -> Result<bool, NodeError> {
        let listener = self
            .element(node)?
            .listeners
            .get(&event.to_ascii_lowercase())
            .cloned();
        match listener {
            Some(Value::Handler(handler)) => {
                handler.call(payload);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Serializes the children of `node`.
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        if let Some(entry) = self.nodes.get(node) {
            self.write_children(entry, &mut out);
        }
        out
    }

    /// Serializes `node` and its subtree.
    pub fn html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_node(node, &mut out);
        out
    }

    fn write_node(&self, node: NodeId, out: &mut String) {
        let Some(entry) = self.nodes.get(node) else {
            return;
        };
        match &entry.kind {
            NodeKind::Text(text) => out.push_str(&escape(text)),
            NodeKind::Element(data) => {
                let _ = write!(out, "<{}", data.tag);
                for (name, value) in &data.attributes {
                    if let Some(text) = value.to_text() {
                        let _ = write!(out, " {name}=\"{}\"", escape(&text));
                    }
                }
                out.push('>');
                self.write_children(entry, out);
                let _ = write!(out, "</{}>", data.tag);
            }
        }
    }

    fn write_children(&self, entry: &MemoryNode, out: &mut String) {
        if let NodeKind::Element(ElementData { inner_html: Some(html), .. }) = &entry.kind {
            out.push_str(html);
            return;
        }
        for &child in &entry.children {
            self.write_node(child, out);
        }
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(MemoryNode {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn entry(&self, node: NodeId) -> Result<&MemoryNode, NodeError> {
        self.nodes.get(node).ok_or(NodeError::Missing { id: node })
    }

    fn entry_mut(&mut self, node: NodeId) -> Result<&mut MemoryNode, NodeError> {
        self.nodes.get_mut(node).ok_or(NodeError::Missing { id: node })
    }

    fn element(&self, node: NodeId) -> Result<&ElementData, NodeError> {
        match &self.entry(node)?.kind {
            NodeKind::Element(data) => Ok(data),
            NodeKind::Text(_) => Err(NodeError::NotAnElement { id: node }),
        }
    }

    fn element_mut(&mut self, node: NodeId) -> Result<&mut ElementData, NodeError> {
        match &mut self.entry_mut(node)?.kind {
            NodeKind::Element(data) => Ok(data),
            NodeKind::Text(_) => Err(NodeError::NotAnElement { id: node }),
        }
    }

    fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.nodes.get_mut(node).and_then(|n| n.parent.take()) else {
            return;
        };
        if let Some(parent) = self.nodes.get_mut(parent) {
            parent.children.retain(|&child| child != node);
        }
    }

    fn attach(&mut self, parent: NodeId, child: NodeId, before: Option<NodeId>) {
        self.detach(child);
        if let Some(entry) = self.nodes.get_mut(parent) {
            let index = before
                .and_then(|reference| entry.children.iter().position(|&c| c == reference))
                .unwrap_or(entry.children.len());
            entry.children.insert(index, child);
        }
        if let Some(entry) = self.nodes.get_mut(child) {
            entry.parent = Some(parent);
        }
    }

    fn check_parent(&self, parent: NodeId, child: NodeId) -> Result<(), NodeError> {
        self.element(parent)?;
        self.entry(child)?;
        Ok(())
    }
}

impl ElementData {
    fn new(tag: &str, svg: bool) -> Self {
        Self {
            tag: tag.to_owned(),
            svg,
            attributes: Attributes::default(),
            properties: Attributes::default(),
            listeners: Attributes::default(),
            inner_html: None,
        }
    }
}

impl Renderer for MemoryRenderer {
    fn create_element(&mut self, tag: &str, svg: bool) -> NodeId {
        let node = self.push(NodeKind::Element(ElementData::new(tag, svg)));
        self.ops.push(RendererOp::CreateElement {
            node,
            tag: tag.to_owned(),
        });
        node
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        let node = self.push(NodeKind::Text(text.to_owned()));
        self.ops.push(RendererOp::CreateText {
            node,
            text: text.to_owned(),
        });
        node
    }

    fn set_accessor(
        &mut self,
        node: NodeId,
        name: &str,
        _old: Option<&Value>,
        new: Option<&Value>,
        svg: bool,
    ) -> Result<(), NodeError> {
        let data = self.element_mut(node)?;
        let value = new.filter(|v| !v.is_null()).cloned();
        if let Some(event) = name.strip_prefix("on").filter(|e| !e.is_empty()) {
            let event = event.to_ascii_lowercase();
            match &value {
                Some(handler @ Value::Handler(_)) => {
                    data.listeners.insert(event, handler.clone());
                }
                _ => {
                    data.listeners.shift_remove(&event);
                }
            }
        } else if name == "dangerouslySetInnerHTML" {
            data.inner_html = value.as_ref().and_then(Value::to_text);
        } else if !svg && PROPERTIES.contains(&name) {
            data.properties
                .insert(name.to_owned(), value.clone().unwrap_or(Value::Null));
        } else {
            match &value {
                None | Some(Value::Bool(false)) => {
                    data.attributes.shift_remove(name);
                }
                Some(value) => {
                    data.attributes.insert(name.to_owned(), value.clone());
                }
            }
        }
        self.ops.push(RendererOp::SetAccessor {
            node,
            name: name.to_owned(),
            value,
        });
        Ok(())
    }

    fn remove_node(&mut self, node: NodeId) -> Result<(), NodeError> {
        let attached = self.entry(node)?.parent.is_some();
        if attached {
            self.detach(node);
            self.ops.push(RendererOp::RemoveNode { node });
        }
        Ok(())
    }

    fn node_type(&self, node: NodeId) -> Result<NodeType, NodeError> {
        Ok(match self.entry(node)?.kind {
            NodeKind::Element(_) => NodeType::Element,
            NodeKind::Text(_) => NodeType::Text,
        })
    }

    fn node_name(&self, node: NodeId) -> Result<&str, NodeError> {
        Ok(&self.element(node)?.tag)
    }

    fn text(&self, node: NodeId) -> Result<&str, NodeError> {
        match &self.entry(node)?.kind {
            NodeKind::Text(text) => Ok(text),
            NodeKind::Element(_) => Err(NodeError::NotText { id: node }),
        }
    }

    fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), NodeError> {
        match &mut self.entry_mut(node)?.kind {
            NodeKind::Text(current) => {
                current.clear();
                current.push_str(text);
            }
            NodeKind::Element(_) => return Err(NodeError::NotText { id: node }),
        }
        self.ops.push(RendererOp::SetText {
            node,
            text: text.to_owned(),
        });
        Ok(())
    }

    fn parent(&self, node: NodeId) -> Result<Option<NodeId>, NodeError> {
        Ok(self.entry(node)?.parent)
    }

    fn children(&self, node: NodeId) -> Result<Vec<NodeId>, NodeError> {
        Ok(self.entry(node)?.children.clone())
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), NodeError> {
        self.check_parent(parent, child)?;
        self.attach(parent, child, None);
        self.ops.push(RendererOp::AppendChild { parent, child });
        Ok(())
    }

    fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) -> Result<(), NodeError> {
        self.check_parent(parent, child)?;
        if self.entry(reference)?.parent != Some(parent) {
            return Err(NodeError::Missing { id: reference });
        }
        self.attach(parent, child, Some(reference));
        self.ops.push(RendererOp::InsertBefore {
            parent,
            child,
            reference,
        });
        Ok(())
    }

    fn replace_child(&mut self, parent: NodeId, new: NodeId, old: NodeId) -> Result<(), NodeError> {
        self.check_parent(parent, new)?;
        if self.entry(old)?.parent != Some(parent) {
            return Err(NodeError::Missing { id: old });
        }
        self.attach(parent, new, Some(old));
        self.detach(old);
        self.ops.push(RendererOp::ReplaceChild { parent, new, old });
        Ok(())
    }

    fn child_at(&self, parent: NodeId, index: usize) -> Result<Option<NodeId>, NodeError> {
        Ok(self.entry(parent)?.children.get(index).copied())
    }

    fn first_child(&self, parent: NodeId) -> Result<Option<NodeId>, NodeError> {
        Ok(self.entry(parent)?.children.first().copied())
    }

    fn last_child(&self, parent: NodeId) -> Result<Option<NodeId>, NodeError> {
        Ok(self.entry(parent)?.children.last().copied())
    }

    fn attributes(&self, node: NodeId) -> Result<Vec<(String, Value)>, NodeError> {
        Ok(self
            .element(node)?
            .attributes
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect())
    }

    fn property(&self, node: NodeId, name: &str) -> Result<Option<Value>, NodeError> {
        Ok(self.element(node)?.properties.get(name).cloned())
    }

    fn is_svg(&self, node: NodeId) -> bool {
        self.element(node).is_ok_and(|data| data.svg)
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
