//! Attribute, prop and state values.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::collections::map::IndexMap;
use crate::component::ComponentHandle;
use crate::NodeId;

/// Insertion-ordered name → value map used for attributes, props, state and
/// context alike.
pub type Attributes = IndexMap<String, Value>;

/// Component state: a flat map that updates shallow-merge into.
pub type State = Attributes;

/// Identity of a keyed child.
pub type Key = Rc<str>;

/// Event handler payloads are renderer defined, so they travel as a `Value`.
#[derive(Clone)]
pub struct Handler(Rc<dyn Fn(&Value)>);

impl Handler {
    pub fn new(f: impl Fn(&Value) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, event: &Value) {
        (self.0)(event)
    }

    pub fn ptr_eq(&self, other: &Handler) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({:p})", Rc::as_ptr(&self.0))
    }
}

/// What a ref is attached to.
#[derive(Clone)]
pub enum RefTarget {
    Node(NodeId),
    Component(ComponentHandle),
}

impl fmt::Debug for RefTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefTarget::Node(id) => write!(f, "Node({id})"),
            RefTarget::Component(handle) => write!(f, "Component({})", handle.name()),
        }
    }
}

/// Callback ref. Receives the target on attach and `None` on detach.
#[derive(Clone)]
pub struct Ref(Rc<dyn Fn(Option<RefTarget>)>);

impl Ref {
    pub fn new(f: impl Fn(Option<RefTarget>) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn ptr_eq(&self, other: &Ref) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn apply(&self, target: Option<RefTarget>) {
        (self.0)(target)
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ref({:p})", Rc::as_ptr(&self.0))
    }
}

pub(crate) fn apply_ref(node_ref: Option<&Ref>, target: Option<RefTarget>) {
    if let Some(node_ref) = node_ref {
        node_ref.apply(target);
    }
}

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Handler(Handler),
    Ref(Ref),
    Any(Rc<dyn Any>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn to_ref(&self) -> Option<Ref> {
        match self {
            Value::Ref(r) => Some(r.clone()),
            _ => None,
        }
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        match self {
            Value::Any(any) => any.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Key derived from this value, if it can act as one.
    pub fn to_key(&self) -> Option<Key> {
        match self {
            Value::Str(s) => Some(s.clone()),
            Value::Int(i) => Some(Rc::from(i.to_string())),
            Value::Float(f) => Some(Rc::from(f.to_string())),
            Value::Bool(b) => Some(Rc::from(b.to_string())),
            _ => None,
        }
    }

    /// Text form of scalar values; `None` for null, callbacks and opaque values.
    pub fn to_text(&self) -> Option<String> {
        match self {
            Value::Str(s) => Some(s.to_string()),
            Value::Int(i) => Some(i.to_string()),
            Value::Float(f) => Some(f.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Handler(a), Value::Handler(b)) => a.ptr_eq(b),
            (Value::Ref(a), Value::Ref(b)) => a.ptr_eq(b),
            (Value::Any(a), Value::Any(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Handler(h) => h.fmt(f),
            Value::Ref(r) => r.fmt(f),
            Value::Any(any) => write!(f, "Any({:p})", Rc::as_ptr(any)),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(Rc::from(value))
    }
}

impl From<Rc<str>> for Value {
    fn from(value: Rc<str>) -> Self {
        Value::Str(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value as i64)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Int(value as i64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<Handler> for Value {
    fn from(value: Handler) -> Self {
        Value::Handler(value)
    }
}

impl From<Ref> for Value {
    fn from(value: Ref) -> Self {
        Value::Ref(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Builds an [`Attributes`] map from `name => value` pairs.
///
/// ```
/// let attrs = arbor_core::attrs! { "id" => "main", "tabindex" => 1 };
/// assert_eq!(attrs.len(), 2);
/// ```
#[macro_export]
macro_rules! attrs {
    () => {
        $crate::Attributes::default()
    };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::Attributes::default();
        $(
            map.insert(::std::string::String::from($name), $crate::Value::from($value));
        )+
        map
    }};
}
