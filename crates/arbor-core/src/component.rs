//! Component types, instances and the handle components use to update
//! themselves.

use std::any::TypeId;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::runtime::RuntimeHandle;
use crate::value::{Attributes, Key, Ref, State, Value};
use crate::vnode::Props;
use crate::{NodeId, RenderResult};

pub type InstanceId = usize;

static NEXT_INSTANCE_ID: AtomicUsize = AtomicUsize::new(1);

fn next_instance_id() -> InstanceId {
    NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed)
}

/// Render function of a function component.
pub type RenderFn = fn(&Props, &Context) -> RenderResult;

/// Static props → state deriver. The returned patch is merged into state
/// before every render.
pub type DeriveStateFn = fn(&Props, &State) -> Option<State>;

pub(crate) type RenderCallback = Box<dyn FnOnce()>;

/// Values passed implicitly from a component to all its descendants.
#[derive(Clone, Default)]
pub struct Context(Rc<Attributes>);

impl Context {
    pub fn new(values: Attributes) -> Self {
        Self(Rc::new(values))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn values(&self) -> &Attributes {
        &self.0
    }

    pub fn ptr_eq(&self, other: &Context) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn extend(&self, extra: Attributes) -> Context {
        let mut values = (*self.0).clone();
        values.extend(extra);
        Context::new(values)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

/// Behaviour of a stateful component.
///
/// Only `render` is required. While `should_update` and `will_update` run,
/// the component's handle still reports the previous props, state and
/// context; the incoming values are passed as arguments.
pub trait Component: 'static {
    fn render(&mut self, props: &Props, state: &State, context: &Context) -> RenderResult;

    fn initial_state(&self) -> State {
        State::default()
    }

    /// Before the first render. Not called when the type derives state.
    fn will_mount(&mut self) {}

    fn did_mount(&mut self) {}

    /// Before new props are committed. Not called when the type derives state.
    fn will_receive_props(&mut self, _next_props: &Props, _next_context: &Context) {}

    fn should_update(&mut self, _next_props: &Props, _next_state: &State, _next_context: &Context) -> bool {
        true
    }

    fn will_update(&mut self, _next_props: &Props, _next_state: &State, _next_context: &Context) {}

    fn snapshot_before_update(&mut self, _prev_props: &Props, _prev_state: &State) -> Option<Value> {
        None
    }

    fn did_update(&mut self, _prev_props: &Props, _prev_state: &State, _snapshot: Option<&Value>) {}

    /// Entries added to the context seen by descendants.
    fn child_context(&mut self) -> Option<Attributes> {
        None
    }

    fn will_unmount(&mut self) {}
}

/// A component that can be named in a tree description.
pub trait ComponentClass: Component + Sized {
    /// Builds a fresh instance. The handle cannot schedule updates until
    /// construction has finished.
    fn create(props: &Props, context: &Context, handle: ComponentHandle) -> Self;

    fn name() -> &'static str {
        std::any::type_name::<Self>()
    }

    fn derived_state_from_props() -> Option<DeriveStateFn> {
        None
    }

    fn default_props() -> Option<Attributes> {
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum ComponentId {
    Type(TypeId),
    Function(usize),
}

#[derive(Clone, Copy)]
enum Constructor {
    Class(fn(&Props, &Context, ComponentHandle) -> Box<dyn Component>),
    Function(RenderFn),
}

fn construct_class<C: ComponentClass>(
    props: &Props,
    context: &Context,
    handle: ComponentHandle,
) -> Box<dyn Component> {
    Box::new(C::create(props, context, handle))
}

fn no_defaults() -> Option<Attributes> {
    None
}

/// Constructor identity of a component. Equality is identity.
#[derive(Clone, Copy)]
pub struct ComponentType {
    id: ComponentId,
    name: &'static str,
    constructor: Constructor,
    derive_state: Option<DeriveStateFn>,
    default_props: fn() -> Option<Attributes>,
}

impl ComponentType {
    pub fn of<C: ComponentClass>() -> Self {
        Self {
            id: ComponentId::Type(TypeId::of::<C>()),
            name: C::name(),
            constructor: Constructor::Class(construct_class::<C>),
            derive_state: C::derived_state_from_props(),
            default_props: C::default_props,
        }
    }

    /// A function component identified by the function's address.
    ///
    /// Identical function bodies may be merged by the compiler and then share
    /// an identity; [`ComponentType::from_fn`] (or `#[component]`) avoids that.
    pub fn function(name: &'static str, render: RenderFn) -> Self {
        Self {
            id: ComponentId::Function(render as usize),
            name,
            constructor: Constructor::Function(render),
            derive_state: None,
            default_props: no_defaults,
        }
    }

    /// A function component identified by the marker type `M`.
    pub fn from_fn<M: 'static>(name: &'static str, render: RenderFn) -> Self {
        Self {
            id: ComponentId::Type(TypeId::of::<M>()),
            ..Self::function(name, render)
        }
    }

    pub fn with_default_props(mut self, defaults: fn() -> Option<Attributes>) -> Self {
        self.default_props = defaults;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_function(&self) -> bool {
        matches!(self.constructor, Constructor::Function(_))
    }

    pub(crate) fn derive_state(&self) -> Option<DeriveStateFn> {
        self.derive_state
    }

    pub(crate) fn default_props(&self) -> Option<Attributes> {
        (self.default_props)()
    }

    fn construct(&self, props: &Props, context: &Context, handle: ComponentHandle) -> Box<dyn Component> {
        match self.constructor {
            Constructor::Class(create) => create(props, context, handle),
            Constructor::Function(render) => Box::new(FunctionComponent { render }),
        }
    }
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ComponentType {}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentType").field(&self.name).finish()
    }
}

/// Backing instance of a function component.
struct FunctionComponent {
    render: RenderFn,
}

impl Component for FunctionComponent {
    fn render(&mut self, props: &Props, _state: &State, context: &Context) -> RenderResult {
        (self.render)(props, context)
    }
}

pub(crate) struct InstanceInner {
    pub(crate) id: InstanceId,
    pub(crate) ty: ComponentType,
    pub(crate) component: RefCell<Box<dyn Component>>,
    pub(crate) props: RefCell<Rc<Props>>,
    pub(crate) state: RefCell<Rc<State>>,
    pub(crate) context: RefCell<Context>,
    pub(crate) prev_props: RefCell<Option<Rc<Props>>>,
    pub(crate) prev_state: RefCell<Option<Rc<State>>>,
    pub(crate) prev_context: RefCell<Option<Context>>,
    pub(crate) dirty: Cell<bool>,
    pub(crate) disabled: Cell<bool>,
    pub(crate) force: Cell<bool>,
    pub(crate) base: Cell<Option<NodeId>>,
    pub(crate) next_base: Cell<Option<NodeId>>,
    pub(crate) child: RefCell<Option<Instance>>,
    pub(crate) parent: RefCell<Weak<InstanceInner>>,
    pub(crate) key: RefCell<Option<Key>>,
    pub(crate) node_ref: RefCell<Option<Ref>>,
    pub(crate) render_callbacks: RefCell<Vec<RenderCallback>>,
    runtime: RuntimeHandle,
}

/// Strong reference to a component instance.
#[derive(Clone)]
pub(crate) struct Instance {
    inner: Rc<InstanceInner>,
}

impl Instance {
    pub(crate) fn new(ty: &ComponentType, props: Props, context: &Context, runtime: RuntimeHandle) -> Self {
        let id = next_instance_id();
        let inner = Rc::new_cyclic(|weak: &Weak<InstanceInner>| {
            let handle = ComponentHandle {
                inner: weak.clone(),
                runtime: runtime.clone(),
                id,
                name: ty.name(),
            };
            let component = ty.construct(&props, context, handle);
            let state = component.initial_state();
            InstanceInner {
                id,
                ty: *ty,
                component: RefCell::new(component),
                props: RefCell::new(Rc::new(props)),
                state: RefCell::new(Rc::new(state)),
                context: RefCell::new(context.clone()),
                prev_props: RefCell::new(None),
                prev_state: RefCell::new(None),
                prev_context: RefCell::new(None),
                dirty: Cell::new(true),
                disabled: Cell::new(false),
                force: Cell::new(false),
                base: Cell::new(None),
                next_base: Cell::new(None),
                child: RefCell::new(None),
                parent: RefCell::new(Weak::new()),
                key: RefCell::new(None),
                node_ref: RefCell::new(None),
                render_callbacks: RefCell::new(Vec::new()),
                runtime,
            }
        });
        Self { inner }
    }

    pub(crate) fn from_inner(inner: Rc<InstanceInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Rc<InstanceInner> {
        &self.inner
    }

    pub(crate) fn ptr_eq(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> Weak<InstanceInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn handle(&self) -> ComponentHandle {
        ComponentHandle {
            inner: Rc::downgrade(&self.inner),
            runtime: self.inner.runtime.clone(),
            id: self.inner.id,
            name: self.inner.ty.name(),
        }
    }

    pub(crate) fn parent(&self) -> Option<Instance> {
        self.inner.parent.borrow().upgrade().map(Instance::from_inner)
    }

    pub(crate) fn child(&self) -> Option<Instance> {
        self.inner.child.borrow().clone()
    }

    pub(crate) fn set_parent(&self, parent: &Instance) {
        *self.inner.parent.borrow_mut() = parent.downgrade();
    }
}

pub(crate) fn same_instance(a: Option<&Instance>, b: Option<&Instance>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.ptr_eq(b),
        (None, None) => true,
        _ => false,
    }
}

/// Handle a component uses to read and update itself.
///
/// It does not keep the instance alive; once the instance is gone, reads
/// return empty values and updates are ignored.
#[derive(Clone)]
pub struct ComponentHandle {
    inner: Weak<InstanceInner>,
    runtime: RuntimeHandle,
    id: InstanceId,
    name: &'static str,
}

impl ComponentHandle {
    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn ptr_eq(&self, other: &ComponentHandle) -> bool {
        Weak::ptr_eq(&self.inner, &other.inner)
    }

    pub fn is_mounted(&self) -> bool {
        self.inner
            .upgrade()
            .is_some_and(|inner| inner.base.get().is_some())
    }

    pub fn base(&self) -> Option<NodeId> {
        self.inner.upgrade().and_then(|inner| inner.base.get())
    }

    pub fn props(&self) -> Rc<Props> {
        self.inner
            .upgrade()
            .map(|inner| inner.props.borrow().clone())
            .unwrap_or_default()
    }

    pub fn state(&self) -> Rc<State> {
        self.inner
            .upgrade()
            .map(|inner| inner.state.borrow().clone())
            .unwrap_or_default()
    }

    pub fn context(&self) -> Context {
        self.inner
            .upgrade()
            .map(|inner| inner.context.borrow().clone())
            .unwrap_or_default()
    }

    /// Shallow-merges `patch` into state and queues a render.
    pub fn set_state(&self, patch: State) {
        self.apply_state(|_, _| patch, None);
    }

    /// Like [`ComponentHandle::set_state`]; `callback` runs after the render.
    pub fn set_state_with(&self, patch: State, callback: impl FnOnce() + 'static) {
        self.apply_state(|_, _| patch, Some(Box::new(callback)));
    }

    /// Computes the patch from the current state and props.
    pub fn update_state(&self, update: impl FnOnce(&State, &Props) -> State) {
        self.apply_state(update, None);
    }

    /// Queues a render that bypasses `should_update`.
    ///
    /// [`crate::Vdom::force_update`] renders synchronously instead.
    pub fn force_update(&self) {
        self.force_update_with(|| {});
    }

    pub fn force_update_with(&self, callback: impl FnOnce() + 'static) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        inner.render_callbacks.borrow_mut().push(Box::new(callback));
        inner.force.set(true);
        self.runtime.enqueue_render(&inner);
    }

    fn apply_state(&self, update: impl FnOnce(&State, &Props) -> State, callback: Option<RenderCallback>) {
        let Some(inner) = self.inner.upgrade() else {
            return;
        };
        let current = inner.state.borrow().clone();
        {
            let mut previous = inner.prev_state.borrow_mut();
            if previous.is_none() {
                *previous = Some(current.clone());
            }
        }
        let props = inner.props.borrow().clone();
        let patch = update(&current, &props);
        let mut next = (*current).clone();
        next.extend(patch);
        *inner.state.borrow_mut() = Rc::new(next);
        if let Some(callback) = callback {
            inner.render_callbacks.borrow_mut().push(callback);
        }
        self.runtime.enqueue_render(&inner);
    }

    pub(crate) fn upgrade(&self) -> Option<Instance> {
        self.inner.upgrade().map(Instance::from_inner)
    }
}

impl fmt::Debug for ComponentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}
