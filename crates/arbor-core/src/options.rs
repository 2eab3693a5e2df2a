//! Engine configuration.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::component::ComponentHandle;
use crate::vnode::VElement;

/// Global observer called with the handle of the affected component.
pub type LifecycleHook = Rc<dyn Fn(&ComponentHandle)>;

/// Hook run on every element description built by [`crate::h`].
pub type VNodeHook = Rc<dyn Fn(&mut VElement)>;

/// Options recognized by a [`crate::Vdom`].
///
/// The deferral primitive used for batched renders is not an option here: it
/// is the [`crate::RenderScheduler`] the engine is constructed with.
#[derive(Clone)]
pub struct Options {
    /// Re-render synchronously when a parent passes new props, instead of
    /// queueing the child. Enabled unless explicitly turned off.
    pub sync_component_updates: bool,
    pub after_mount: Option<LifecycleHook>,
    pub after_update: Option<LifecycleHook>,
    pub before_unmount: Option<LifecycleHook>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            sync_component_updates: true,
            after_mount: None,
            after_update: None,
            before_unmount: None,
        }
    }
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sync_component_updates(mut self, enabled: bool) -> Self {
        self.sync_component_updates = enabled;
        self
    }

    pub fn after_mount(mut self, hook: impl Fn(&ComponentHandle) + 'static) -> Self {
        self.after_mount = Some(Rc::new(hook));
        self
    }

    pub fn after_update(mut self, hook: impl Fn(&ComponentHandle) + 'static) -> Self {
        self.after_update = Some(Rc::new(hook));
        self
    }

    pub fn before_unmount(mut self, hook: impl Fn(&ComponentHandle) + 'static) -> Self {
        self.before_unmount = Some(Rc::new(hook));
        self
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("sync_component_updates", &self.sync_component_updates)
            .field("after_mount", &self.after_mount.is_some())
            .field("after_update", &self.after_update.is_some())
            .field("before_unmount", &self.before_unmount.is_some())
            .finish()
    }
}

thread_local! {
    static VNODE_HOOK: RefCell<Option<VNodeHook>> = RefCell::new(None);
}

/// Installs (or with `None`, removes) the hook run on every built element.
///
/// The builder has no engine to consult, so the hook is per thread.
pub fn set_vnode_hook(hook: Option<VNodeHook>) {
    VNODE_HOOK.with(|slot| *slot.borrow_mut() = hook);
}

pub(crate) fn run_vnode_hook(element: &mut VElement) {
    let hook = VNODE_HOOK.with(|slot| slot.borrow().clone());
    if let Some(hook) = hook {
        hook(element);
    }
}
