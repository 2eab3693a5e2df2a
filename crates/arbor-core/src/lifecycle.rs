//! Component lifecycle: prop commits, renders, composition and unmounting.

use std::rc::Rc;

use crate::component::{same_instance, ComponentHandle, ComponentType, Context, Instance};
use crate::renderer::Renderer;
use crate::value::{apply_ref, RefTarget, Value};
use crate::vnode::{Props, VElement};
use crate::{Error, NodeId, RenderMode, Vdom};

impl<R: Renderer> Vdom<R> {
    /// Commits `props` and `context` to `instance`, then renders it as
    /// `mode` asks.
    pub(crate) fn set_component_props(
        &mut self,
        instance: &Instance,
        mut props: Props,
        mode: RenderMode,
        context: &Context,
        mount_all: bool,
    ) -> Result<(), Error> {
        let inner = instance.inner();
        if inner.disabled.get() {
            return Ok(());
        }
        inner.disabled.set(true);

        let node_ref = props.take("ref").and_then(|value| value.to_ref());
        let key = props.take("key").and_then(|value| value.to_key());
        *inner.node_ref.borrow_mut() = node_ref.clone();
        *inner.key.borrow_mut() = key;

        if inner.ty.derive_state().is_none() {
            let mut component = inner.component.borrow_mut();
            if inner.base.get().is_none() || mount_all {
                component.will_mount();
            } else {
                component.will_receive_props(&props, context);
            }
        }

        let current_context = inner.context.borrow().clone();
        if !current_context.ptr_eq(context) {
            let mut previous = inner.prev_context.borrow_mut();
            if previous.is_none() {
                *previous = Some(current_context);
            }
            drop(previous);
            *inner.context.borrow_mut() = context.clone();
        }

        let current_props = inner.props.borrow().clone();
        {
            let mut previous = inner.prev_props.borrow_mut();
            if previous.is_none() {
                *previous = Some(current_props);
            }
        }
        *inner.props.borrow_mut() = Rc::new(props);

        inner.disabled.set(false);

        match mode {
            RenderMode::None => {}
            RenderMode::Sync => self.render_component(instance, RenderMode::Sync, mount_all, false)?,
            _ if self.options.sync_component_updates || inner.base.get().is_none() => {
                self.render_component(instance, RenderMode::Sync, mount_all, false)?;
            }
            _ => self.runtime.handle().enqueue_render(inner),
        }

        apply_ref(node_ref.as_ref(), Some(RefTarget::Component(instance.handle())));
        Ok(())
    }

    /// Renders `instance` and reconciles its output against its base.
    ///
    /// `is_child` marks the first render of a nested instance, whose wrapper
    /// takes care of base propagation and mount flushing.
    pub(crate) fn render_component(
        &mut self,
        instance: &Instance,
        mode: RenderMode,
        mount_all: bool,
        is_child: bool,
    ) -> Result<(), Error> {
        let inner = instance.inner().clone();
        if inner.disabled.get() {
            return Ok(());
        }

        let props = inner.props.borrow().clone();
        let mut state = inner.state.borrow().clone();
        let context = inner.context.borrow().clone();
        let previous_props = inner.prev_props.borrow().clone().unwrap_or_else(|| props.clone());
        let previous_state = inner.prev_state.borrow().clone().unwrap_or_else(|| state.clone());
        let previous_context = inner
            .prev_context
            .borrow()
            .clone()
            .unwrap_or_else(|| context.clone());
        let is_update = inner.base.get().is_some();
        let next_base = inner.next_base.get();
        let initial_base = inner.base.get().or(next_base);
        let initial_child = instance.child();
        let mut skip = false;
        let mut snapshot: Option<Value> = None;

        if let Some(derive) = inner.ty.derive_state() {
            let mut derived = (*state).clone();
            if let Some(patch) = derive(&props, &state) {
                derived.extend(patch);
            }
            state = Rc::new(derived);
            *inner.state.borrow_mut() = state.clone();
        }

        if is_update {
            *inner.props.borrow_mut() = previous_props.clone();
            *inner.state.borrow_mut() = previous_state.clone();
            *inner.context.borrow_mut() = previous_context.clone();
            {
                let mut component = inner.component.borrow_mut();
                if mode != RenderMode::Force && !component.should_update(&props, &state, &context) {
                    skip = true;
                } else {
                    component.will_update(&props, &state, &context);
                }
            }
            *inner.props.borrow_mut() = props.clone();
            *inner.state.borrow_mut() = state.clone();
            *inner.context.borrow_mut() = context.clone();
        }

        *inner.prev_props.borrow_mut() = None;
        *inner.prev_state.borrow_mut() = None;
        *inner.prev_context.borrow_mut() = None;
        inner.next_base.set(None);
        inner.dirty.set(false);
        inner.force.set(false);

        if !skip {
            let rendered = inner.component.borrow_mut().render(&props, &state, &context)?;

            let mut child_context = context.clone();
            if let Some(extra) = inner.component.borrow_mut().child_context() {
                child_context = context.extend(extra);
            }

            if is_update {
                snapshot = inner
                    .component
                    .borrow_mut()
                    .snapshot_before_update(&previous_props, &previous_state);
            }

            let mut to_unmount = None;
            let mut nested = None;
            let base;

            let child_component = rendered
                .as_element()
                .and_then(|element| element.name.as_component().map(|ty| (element, *ty)));

            if let Some((element, child_ty)) = child_component {
                let child_props = Props::for_element(element, &child_ty);
                let reusable = initial_child
                    .as_ref()
                    .filter(|child| {
                        child.inner().ty == child_ty && *child.inner().key.borrow() == child_props.key()
                    })
                    .cloned();

                let child = match reusable {
                    Some(child) => {
                        self.set_component_props(&child, child_props, RenderMode::Sync, &child_context, false)?;
                        child
                    }
                    None => {
                        to_unmount = initial_child.clone();
                        let child = self.create_component(&child_ty, child_props.clone(), &child_context);
                        if child.inner().next_base.get().is_none() {
                            child.inner().next_base.set(next_base);
                        }
                        child.set_parent(instance);
                        *inner.child.borrow_mut() = Some(child.clone());
                        let rendered = self
                            .set_component_props(&child, child_props, RenderMode::None, &child_context, false)
                            .and_then(|()| self.render_component(&child, RenderMode::Sync, mount_all, true));
                        if let Err(err) = rendered {
                            *inner.child.borrow_mut() = initial_child.clone();
                            self.abandon(&child);
                            return Err(err);
                        }
                        child
                    }
                };
                base = child.inner().base.get();
                nested = Some(child);
            } else {
                let mut cbase = initial_base;
                to_unmount = initial_child.clone();
                if to_unmount.is_some() {
                    cbase = None;
                    *inner.child.borrow_mut() = None;
                }

                base = if initial_base.is_some() || mode == RenderMode::Sync {
                    if let Some(cbase) = cbase {
                        self.owners.remove(&cbase);
                    }
                    let parent = match initial_base {
                        Some(initial) => self.renderer.parent(initial)?,
                        None => None,
                    };
                    Some(self.diff(
                        cbase,
                        &rendered,
                        &child_context,
                        mount_all || !is_update,
                        parent,
                        true,
                    )?)
                } else {
                    None
                };
            }

            if let (Some(initial), Some(base)) = (initial_base, base) {
                if base != initial && !same_instance(nested.as_ref(), initial_child.as_ref()) {
                    if let Some(parent) = self.renderer.parent(initial)? {
                        if parent != base {
                            self.renderer.replace_child(parent, base, initial)?;
                            log::trace!("replaced base {initial} of {} with {base}", inner.ty.name());
                            if to_unmount.is_none() {
                                self.owners.remove(&initial);
                                self.recollect_node_tree(initial, false)?;
                            }
                        }
                    }
                }
            }

            if let Some(previous) = to_unmount {
                self.unmount_component(&previous)?;
            }

            inner.base.set(base);
            if let (Some(base), false) = (base, is_child) {
                let mut owner = instance.clone();
                let mut wrapper = instance.parent();
                while let Some(current) = wrapper {
                    current.inner().base.set(Some(base));
                    wrapper = current.parent();
                    owner = current;
                }
                self.owners.insert(base, owner.downgrade());
                self.owner_types.insert(base, owner.inner().ty);
            }
        }

        if !is_update || mount_all {
            self.mounts.push_back(instance.clone());
        } else if !skip {
            inner
                .component
                .borrow_mut()
                .did_update(&previous_props, &previous_state, snapshot.as_ref());
            if let Some(hook) = &self.options.after_update {
                hook(&instance.handle());
            }
        }

        loop {
            let callback = inner.render_callbacks.borrow_mut().pop();
            match callback {
                Some(callback) => callback(),
                None => break,
            }
        }

        if self.diff_level == 0 && !is_child {
            self.flush_mounts();
        }
        Ok(())
    }

    /// Realizes a component description against `dom`, reusing the
    /// instance that owns `dom` when it has the same type.
    pub(crate) fn build_component_from_vnode(
        &mut self,
        dom: Option<NodeId>,
        element: &VElement,
        ty: ComponentType,
        context: &Context,
        mount_all: bool,
    ) -> Result<NodeId, Error> {
        let original = dom.and_then(|dom| self.owner(dom));
        let is_direct_owner =
            original.is_some() && dom.and_then(|dom| self.owner_types.get(&dom)) == Some(&ty);
        let props = Props::for_element(element, &ty);

        let mut candidate = original.clone();
        let mut is_owner = is_direct_owner;
        while !is_owner {
            let Some(parent) = candidate.as_ref().and_then(Instance::parent) else {
                candidate = None;
                break;
            };
            is_owner = parent.inner().ty == ty;
            candidate = Some(parent);
        }

        if let Some(owner) = candidate.filter(|owner| is_owner && (!mount_all || owner.child().is_some())) {
            self.set_component_props(&owner, props, RenderMode::Async, context, mount_all)?;
            return owner
                .inner()
                .base
                .get()
                .ok_or(Error::Unrendered { component: ty.name() });
        }

        let mut dom = dom;
        let mut old_dom = dom;
        if let Some(original) = original.filter(|_| !is_direct_owner) {
            self.unmount_component(&original)?;
            dom = None;
            old_dom = None;
        }

        let instance = self.create_component(&ty, props.clone(), context);
        if let Some(dom) = dom {
            if instance.inner().next_base.get().is_none() {
                instance.inner().next_base.set(Some(dom));
                old_dom = None;
            }
        }
        if let Err(err) = self.set_component_props(&instance, props, RenderMode::Sync, context, mount_all) {
            self.abandon(&instance);
            return Err(err);
        }
        let base = instance
            .inner()
            .base
            .get()
            .ok_or(Error::Unrendered { component: ty.name() })?;

        if let Some(old) = old_dom.filter(|&old| old != base) {
            self.owners.remove(&old);
            self.recollect_node_tree(old, false)?;
        }
        Ok(base)
    }

    /// Builds an instance, reusing a retired instance's backing node, and
    /// tracks it as live.
    fn create_component(&mut self, ty: &ComponentType, props: Props, context: &Context) -> Instance {
        let instance = self.pool.acquire(ty, props, context, self.runtime.handle());
        self.live.insert(instance.inner().id, instance.clone());
        log::trace!("created {} instance {}", ty.name(), instance.inner().id);
        instance
    }

    /// Stops tracking an instance whose first render failed.
    fn abandon(&mut self, instance: &Instance) {
        self.live.remove(&instance.inner().id);
        let inner = instance.inner();
        log::debug!("dropped {} instance {} after a failed render", inner.ty.name(), inner.id);
    }

    /// Unmounts `instance` for good and retires it to the pool.
    pub(crate) fn unmount_component(&mut self, instance: &Instance) -> Result<(), Error> {
        let inner = instance.inner();
        if let Some(hook) = &self.options.before_unmount {
            hook(&instance.handle());
        }

        let base = inner.base.get();
        inner.disabled.set(true);
        inner.component.borrow_mut().will_unmount();
        inner.base.set(None);
        self.live.remove(&inner.id);
        log::trace!("unmounting {} instance {}", inner.ty.name(), inner.id);

        if let Some(child) = instance.child() {
            self.unmount_component(&child)?;
        } else if let Some(base) = base {
            let node_ref = self
                .caches
                .get(&base)
                .and_then(|cache| cache.get("ref"))
                .and_then(Value::to_ref);
            apply_ref(node_ref.as_ref(), None);

            inner.next_base.set(Some(base));
            self.renderer.remove_node(base)?;
            self.pool.release(instance.clone());
            self.remove_children(base, false)?;
        }

        let own_ref = inner.node_ref.borrow().clone();
        apply_ref(own_ref.as_ref(), None);
        Ok(())
    }

    /// Renders the component behind `handle` right away, bypassing
    /// `should_update`.
    pub fn force_update(&mut self, handle: &ComponentHandle) -> Result<(), Error> {
        match handle.upgrade() {
            Some(instance) => self.render_component(&instance, RenderMode::Force, false, false),
            None => Ok(()),
        }
    }

    /// Renders every queued component, most recently queued first.
    ///
    /// Components queued while flushing are rendered before this returns.
    pub fn rerender(&mut self) -> Result<(), Error> {
        let mut rendered = 0usize;
        while let Some(instance) = self.runtime.pop() {
            let inner = instance.inner();
            if !inner.dirty.get() {
                continue;
            }
            let mode = if inner.force.get() {
                RenderMode::Force
            } else {
                RenderMode::Async
            };
            if let Err(err) = self.render_component(&instance, mode, false, false) {
                log::warn!("flush aborted while rendering {}: {err}", inner.ty.name());
                self.runtime.finish_flush();
                return Err(err);
            }
            rendered += 1;
        }
        self.runtime.finish_flush();
        log::debug!("flushed {rendered} queued renders");
        Ok(())
    }
}
