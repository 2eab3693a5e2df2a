#![doc = r"Tree reconciliation engine with a component lifecycle, render queue and instance pool."]

extern crate self as arbor_core;

use std::collections::VecDeque;
use std::fmt;
use std::rc::Weak;
use std::sync::Arc;

pub mod collections;
pub mod component;
mod diff;
pub mod hash;
mod lifecycle;
pub mod options;
pub mod platform;
mod pool;
pub mod renderer;
pub mod runtime;
pub mod value;
pub mod vnode;

pub use component::{
    Component, ComponentClass, ComponentHandle, ComponentType, Context, DeriveStateFn, InstanceId,
    RenderFn,
};
pub use options::{set_vnode_hook, LifecycleHook, Options, VNodeHook};
pub use platform::RenderScheduler;
pub use renderer::{MemoryRenderer, NodeType, Renderer, RendererOp};
pub use runtime::{DefaultScheduler, Runtime, RuntimeHandle};
pub use value::{Attributes, Handler, Key, Ref, RefTarget, State, Value};
pub use vnode::{clone_element, h, Child, NodeName, Props, VElement, VNode};

use collections::map::HashMap;
use component::{Instance, InstanceInner};
use pool::InstancePool;

pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeError {
    Missing { id: NodeId },
    NotAnElement { id: NodeId },
    NotText { id: NodeId },
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::Missing { id } => write!(f, "node {id} missing"),
            NodeError::NotAnElement { id } => write!(f, "node {id} is not an element"),
            NodeError::NotText { id } => write!(f, "node {id} is not a text node"),
        }
    }
}

impl std::error::Error for NodeError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    Node(NodeError),
    /// A render function reported a failure.
    Render {
        component: &'static str,
        message: String,
    },
    /// A component finished rendering without producing a node.
    Unrendered { component: &'static str },
}

impl Error {
    pub fn render(component: &'static str, message: impl Into<String>) -> Self {
        Error::Render {
            component,
            message: message.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Node(err) => err.fmt(f),
            Error::Render { component, message } => {
                write!(f, "render of {component} failed: {message}")
            }
            Error::Unrendered { component } => write!(f, "{component} produced no node"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Node(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NodeError> for Error {
    fn from(err: NodeError) -> Self {
        Error::Node(err)
    }
}

/// What a render function returns.
pub type RenderResult = Result<VNode, Error>;

/// How a component render was requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    /// Commit props without rendering.
    None,
    Sync,
    /// Render even if `should_update` would veto.
    Force,
    /// Queue the render unless synchronous updates are enabled or the
    /// instance has never rendered.
    Async,
}

/// The reconciliation engine: a renderer plus everything the engine tracks
/// about the nodes it manages.
pub struct Vdom<R: Renderer> {
    renderer: R,
    runtime: Runtime,
    options: Options,
    pool: InstancePool,
    /// Attributes last applied to each managed node. Text nodes get an empty
    /// map, which marks them as managed.
    caches: HashMap<NodeId, Attributes>,
    /// Outermost component whose base is the node. Lookup only.
    owners: HashMap<NodeId, Weak<InstanceInner>>,
    owner_types: HashMap<NodeId, ComponentType>,
    /// Instances currently mounted or mounting.
    live: HashMap<InstanceId, Instance>,
    mounts: VecDeque<Instance>,
    diff_level: usize,
    svg_mode: bool,
    hydrating: bool,
}

impl<R: Renderer> Vdom<R> {
    pub fn new(renderer: R) -> Self {
        Self::with_scheduler(renderer, Arc::new(DefaultScheduler))
    }

    pub fn with_scheduler(renderer: R, scheduler: Arc<dyn RenderScheduler>) -> Self {
        Self {
            renderer,
            runtime: Runtime::new(scheduler),
            options: Options::default(),
            pool: InstancePool::new(),
            caches: HashMap::default(),
            owners: HashMap::default(),
            owner_types: HashMap::default(),
            live: HashMap::default(),
            mounts: VecDeque::new(),
            diff_level: 0,
            svg_mode: false,
            hydrating: false,
        }
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Renders `vnode` into `parent`.
    ///
    /// With `merge`, the existing node is diffed against `vnode` instead of
    /// building a new tree. A `merge` node the engine did not create is
    /// adopted (hydrated) in place.
    pub fn render(&mut self, vnode: &VNode, parent: NodeId, merge: Option<NodeId>) -> Result<NodeId, Error> {
        self.diff(merge, vnode, &Context::default(), false, Some(parent), false)
    }

    /// Tears down a tree previously returned by [`Vdom::render`].
    pub fn unmount(&mut self, node: NodeId) -> Result<(), Error> {
        self.recollect_node_tree(node, false)
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    /// Whether queued renders are waiting for [`Vdom::rerender`].
    pub fn needs_flush(&self) -> bool {
        self.runtime.needs_flush()
    }

    /// The outermost component whose base is `node`.
    pub fn component_at(&self, node: NodeId) -> Option<ComponentHandle> {
        self.owner(node).map(|instance| instance.handle())
    }

    /// Retired instances waiting for reuse.
    pub fn pooled_count(&self) -> usize {
        self.pool.len()
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Nodes the engine currently holds attribute records for.
    pub fn tracked_nodes(&self) -> usize {
        self.caches.len()
    }

    fn owner(&self, node: NodeId) -> Option<Instance> {
        self.owners
            .get(&node)
            .and_then(Weak::upgrade)
            .map(Instance::from_inner)
    }
}
