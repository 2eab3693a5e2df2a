//! Immutable tree descriptions and the `h` builder that produces them.

use std::fmt;
use std::rc::Rc;

use crate::component::ComponentType;
use crate::options;
use crate::value::{Attributes, Key, Value};

/// What an element description names: a host tag or a component.
#[derive(Clone, PartialEq)]
pub enum NodeName {
    Tag(Rc<str>),
    Component(ComponentType),
}

impl NodeName {
    pub fn as_tag(&self) -> Option<&str> {
        match self {
            NodeName::Tag(tag) => Some(tag),
            NodeName::Component(_) => None,
        }
    }

    pub fn as_component(&self) -> Option<&ComponentType> {
        match self {
            NodeName::Component(ty) => Some(ty),
            NodeName::Tag(_) => None,
        }
    }
}

impl fmt::Debug for NodeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeName::Tag(tag) => write!(f, "<{tag}>"),
            NodeName::Component(ty) => write!(f, "<{}/>", ty.name()),
        }
    }
}

impl From<&str> for NodeName {
    fn from(tag: &str) -> Self {
        NodeName::Tag(Rc::from(tag))
    }
}

impl From<String> for NodeName {
    fn from(tag: String) -> Self {
        NodeName::Tag(Rc::from(tag))
    }
}

impl From<ComponentType> for NodeName {
    fn from(ty: ComponentType) -> Self {
        NodeName::Component(ty)
    }
}

impl From<&ComponentType> for NodeName {
    fn from(ty: &ComponentType) -> Self {
        NodeName::Component(ty.clone())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct VElement {
    pub name: NodeName,
    pub attributes: Option<Attributes>,
    pub children: Vec<VNode>,
    pub key: Option<Key>,
}

impl VElement {
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.as_ref().and_then(|attrs| attrs.get(name))
    }
}

/// A node of a desired tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum VNode {
    /// `null`, `undefined` and booleans; realized as an empty text node.
    #[default]
    Empty,
    Text(Rc<str>),
    Element(Rc<VElement>),
}

impl VNode {
    pub fn text(text: impl Into<Rc<str>>) -> Self {
        VNode::Text(text.into())
    }

    pub fn key(&self) -> Option<&Key> {
        match self {
            VNode::Element(el) => el.key.as_ref(),
            _ => None,
        }
    }

    pub fn as_element(&self) -> Option<&VElement> {
        match self {
            VNode::Element(el) => Some(el),
            _ => None,
        }
    }

    /// The text this node realizes as, if it is not an element.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            VNode::Empty => Some(""),
            VNode::Text(text) => Some(text),
            VNode::Element(_) => None,
        }
    }
}

impl From<&str> for VNode {
    fn from(text: &str) -> Self {
        VNode::Text(Rc::from(text))
    }
}

impl From<String> for VNode {
    fn from(text: String) -> Self {
        VNode::Text(Rc::from(text))
    }
}

/// Props handed to a component: the element's attributes plus its children.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Props {
    attributes: Attributes,
    children: Vec<VNode>,
}

impl Props {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_attributes(attributes: Attributes) -> Self {
        Self {
            attributes,
            children: Vec::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn children(&self) -> &[VNode] {
        &self.children
    }

    pub fn key(&self) -> Option<Key> {
        self.get("key").and_then(Value::to_key)
    }

    pub(crate) fn take(&mut self, name: &str) -> Option<Value> {
        self.attributes.shift_remove(name)
    }

    /// Props for the component named by `element`, defaults filled in.
    pub(crate) fn for_element(element: &VElement, ty: &ComponentType) -> Self {
        let mut attributes = element.attributes.clone().unwrap_or_default();
        if let Some(defaults) = ty.default_props() {
            for (name, value) in defaults {
                if !attributes.contains_key(&name) {
                    attributes.insert(name, value);
                }
            }
        }
        Self {
            attributes,
            children: element.children.clone(),
        }
    }
}

/// Input accepted by [`h`] as a child. Lists are flattened.
#[derive(Clone, Debug)]
pub enum Child {
    Null,
    Bool(bool),
    Text(Rc<str>),
    Int(i64),
    Float(f64),
    Node(VNode),
    List(Vec<Child>),
}

impl From<&str> for Child {
    fn from(text: &str) -> Self {
        Child::Text(Rc::from(text))
    }
}

impl From<String> for Child {
    fn from(text: String) -> Self {
        Child::Text(Rc::from(text))
    }
}

impl From<bool> for Child {
    fn from(value: bool) -> Self {
        Child::Bool(value)
    }
}

impl From<i32> for Child {
    fn from(value: i32) -> Self {
        Child::Int(value as i64)
    }
}

impl From<i64> for Child {
    fn from(value: i64) -> Self {
        Child::Int(value)
    }
}

impl From<usize> for Child {
    fn from(value: usize) -> Self {
        Child::Int(value as i64)
    }
}

impl From<f64> for Child {
    fn from(value: f64) -> Self {
        Child::Float(value)
    }
}

impl From<VNode> for Child {
    fn from(node: VNode) -> Self {
        Child::Node(node)
    }
}

impl<T: Into<Child>> From<Vec<T>> for Child {
    fn from(items: Vec<T>) -> Self {
        Child::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Child>> From<Option<T>> for Child {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Child::Null)
    }
}

/// Builds an element description.
///
/// Nested lists are flattened in order. For tag elements, `null` and booleans
/// become empty text, numbers become text and adjacent texts are merged.
/// Component elements receive their children as given, with booleans turned
/// into [`VNode::Empty`]. The `key` attribute is lifted onto the description.
pub fn h<C: Into<Child>>(
    name: impl Into<NodeName>,
    attributes: impl Into<Option<Attributes>>,
    children: impl IntoIterator<Item = C>,
) -> VNode {
    let name = name.into();
    let simple_children = matches!(name, NodeName::Tag(_));
    let mut flat = Vec::new();
    let mut last_simple = false;
    for child in children {
        flatten_child(child.into(), simple_children, &mut flat, &mut last_simple);
    }
    let attributes = attributes.into();
    let key = attributes
        .as_ref()
        .and_then(|attrs| attrs.get("key"))
        .and_then(Value::to_key);
    let mut element = VElement {
        name,
        attributes,
        children: flat,
        key,
    };
    options::run_vnode_hook(&mut element);
    VNode::Element(Rc::new(element))
}

fn flatten_child(child: Child, simple_children: bool, out: &mut Vec<VNode>, last_simple: &mut bool) {
    if let Child::List(items) = child {
        for item in items {
            flatten_child(item, simple_children, out, last_simple);
        }
        return;
    }
    let (node, simple) = match child {
        Child::Null | Child::Bool(_) if simple_children => (VNode::Text(Rc::from("")), true),
        Child::Null | Child::Bool(_) => (VNode::Empty, false),
        Child::Text(text) => (VNode::Text(text), simple_children),
        Child::Int(i) => (VNode::Text(Rc::from(i.to_string())), simple_children),
        Child::Float(x) => (VNode::Text(Rc::from(x.to_string())), simple_children),
        Child::Node(node @ VNode::Text(_)) => (node, simple_children),
        Child::Node(VNode::Empty) if simple_children => (VNode::Text(Rc::from("")), true),
        Child::Node(node) => (node, false),
        Child::List(_) => unreachable!("lists are flattened above"),
    };
    if simple && *last_simple {
        if let Some(VNode::Text(previous)) = out.last_mut() {
            if let VNode::Text(text) = &node {
                *previous = Rc::from(format!("{previous}{text}"));
            }
        }
    } else {
        out.push(node);
    }
    *last_simple = simple;
}

/// Copies `element`, overlaying `attributes` and optionally replacing its
/// children.
pub fn clone_element(
    element: &VElement,
    attributes: Attributes,
    children: Option<Vec<Child>>,
) -> VNode {
    let mut merged = element.attributes.clone().unwrap_or_default();
    merged.extend(attributes);
    let children = children.unwrap_or_else(|| {
        element
            .children
            .iter()
            .cloned()
            .map(Child::Node)
            .collect()
    });
    h(element.name.clone(), merged, children)
}
