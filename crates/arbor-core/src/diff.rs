//! Node and child-list reconciliation.

use crate::collections::map::IndexMap;
use crate::component::Context;
use crate::renderer::Renderer;
use crate::value::{apply_ref, Attributes, Key, RefTarget, Value};
use crate::vnode::{NodeName, VElement, VNode};
use crate::{Error, NodeId, Vdom};

impl<R: Renderer> Vdom<R> {
    /// Morphs `dom` (or nothing) into `vnode` and returns the resulting node.
    ///
    /// The outermost call decides the namespace from `parent` and whether
    /// `dom` is foreign markup to adopt. When it returns, queued mount hooks
    /// run unless this is a component's own render.
    pub(crate) fn diff(
        &mut self,
        dom: Option<NodeId>,
        vnode: &VNode,
        context: &Context,
        mount_all: bool,
        parent: Option<NodeId>,
        component_root: bool,
    ) -> Result<NodeId, Error> {
        let outermost = self.diff_level == 0;
        self.diff_level += 1;
        if outermost {
            self.svg_mode = parent.is_some_and(|parent| self.renderer.is_svg(parent));
            self.hydrating = dom.is_some_and(|dom| !self.caches.contains_key(&dom));
        }

        let result = self.diff_attached(dom, vnode, context, mount_all, parent, component_root);

        self.diff_level -= 1;
        if self.diff_level == 0 {
            self.hydrating = false;
            match result {
                Ok(_) if !component_root => self.flush_mounts(),
                Ok(_) => {}
                Err(_) => self.mounts.clear(),
            }
        }
        result
    }

    fn diff_attached(
        &mut self,
        dom: Option<NodeId>,
        vnode: &VNode,
        context: &Context,
        mount_all: bool,
        parent: Option<NodeId>,
        component_root: bool,
    ) -> Result<NodeId, Error> {
        let out = self.idiff(dom, vnode, context, mount_all, component_root)?;
        if let Some(parent) = parent {
            if self.renderer.parent(out)? != Some(parent) {
                self.renderer.append_child(parent, out)?;
            }
        }
        Ok(out)
    }

    fn idiff(
        &mut self,
        dom: Option<NodeId>,
        vnode: &VNode,
        context: &Context,
        mount_all: bool,
        component_root: bool,
    ) -> Result<NodeId, Error> {
        let element = match vnode {
            VNode::Empty => return self.diff_text(dom, "", component_root),
            VNode::Text(text) => return self.diff_text(dom, text, component_root),
            VNode::Element(element) => element,
        };
        let tag = match &element.name {
            NodeName::Component(ty) => {
                return self.build_component_from_vnode(dom, element, *ty, context, mount_all);
            }
            NodeName::Tag(tag) => tag.clone(),
        };

        let previous_svg = self.svg_mode;
        if &*tag == "svg" {
            self.svg_mode = true;
        } else if &*tag == "foreignObject" {
            self.svg_mode = false;
        }
        let result = self.diff_element(dom, element, &tag, context, mount_all);
        self.svg_mode = previous_svg;
        result
    }

    fn diff_text(&mut self, dom: Option<NodeId>, text: &str, component_root: bool) -> Result<NodeId, Error> {
        if let Some(dom) = dom {
            let reusable = self.renderer.is_text(dom)?
                && self.renderer.parent(dom)?.is_some()
                && (component_root || !self.owners.contains_key(&dom));
            if reusable {
                if self.renderer.text(dom)? != text {
                    self.renderer.set_text(dom, text)?;
                }
                self.caches.entry(dom).or_default();
                return Ok(dom);
            }
        }

        let out = self.renderer.create_text(text);
        log::trace!("created text node {out}");
        if let Some(dom) = dom {
            if let Some(parent) = self.renderer.parent(dom)? {
                self.renderer.replace_child(parent, out, dom)?;
            }
            self.recollect_node_tree(dom, true)?;
        }
        self.caches.insert(out, Attributes::default());
        Ok(out)
    }

    fn diff_element(
        &mut self,
        dom: Option<NodeId>,
        element: &VElement,
        tag: &str,
        context: &Context,
        mount_all: bool,
    ) -> Result<NodeId, Error> {
        let out = match dom {
            Some(dom) if self.renderer.is_named(dom, tag)? => dom,
            _ => {
                let out = self.renderer.create_element(tag, self.svg_mode);
                log::trace!("created <{tag}> as node {out}");
                if let Some(dom) = dom {
                    while let Some(child) = self.renderer.first_child(dom)? {
                        self.renderer.append_child(out, child)?;
                    }
                    if let Some(parent) = self.renderer.parent(dom)? {
                        self.renderer.replace_child(parent, out, dom)?;
                    }
                    self.recollect_node_tree(dom, true)?;
                }
                out
            }
        };

        if !self.caches.contains_key(&out) {
            let adopted: Attributes = self.renderer.attributes(out)?.into_iter().collect();
            self.caches.insert(out, adopted);
        }

        let first = self.renderer.first_child(out)?;
        let children = &element.children;
        if let (false, [VNode::Text(text)], Some(first)) = (self.hydrating, children.as_slice(), first) {
            if self.is_lone_text(first)? {
                if self.renderer.text(first)? != &**text {
                    self.renderer.set_text(first, text)?;
                }
                self.diff_attributes(out, element.attributes.as_ref())?;
                return Ok(out);
            }
        }
        if !children.is_empty() || first.is_some() {
            let inner_html = self
                .caches
                .get(&out)
                .and_then(|cache| cache.get("dangerouslySetInnerHTML"))
                .is_some_and(|value| !value.is_null());
            let hydrating = self.hydrating || inner_html;
            self.inner_diff_node(out, children, context, mount_all, hydrating)?;
        }
        self.diff_attributes(out, element.attributes.as_ref())?;
        Ok(out)
    }

    fn is_lone_text(&self, node: NodeId) -> Result<bool, Error> {
        Ok(self.renderer.is_text(node)? && self.renderer.next_sibling(node)?.is_none())
    }

    /// Reconciles the children of `dom` against `vchildren` in one pass.
    fn inner_diff_node(
        &mut self,
        dom: NodeId,
        vchildren: &[VNode],
        context: &Context,
        mount_all: bool,
        hydrating: bool,
    ) -> Result<(), Error> {
        let original = self.renderer.children(dom)?;
        let mut keyed: IndexMap<Key, Option<NodeId>> = IndexMap::default();
        let mut unkeyed: Vec<Option<NodeId>> = Vec::new();

        for &child in &original {
            let cache = self.caches.get(&child);
            let key = match cache {
                Some(cache) if !vchildren.is_empty() => match self.owner(child) {
                    Some(owner) => owner.inner().key.borrow().clone(),
                    None => cache.get("key").and_then(Value::to_key),
                },
                _ => None,
            };
            if let Some(key) = key {
                keyed.insert(key, Some(child));
            } else if cache.is_some() || self.poolable(child, hydrating)? {
                unkeyed.push(Some(child));
            }
        }

        let mut min = 0;
        let mut len = unkeyed.len();
        for (index, vchild) in vchildren.iter().enumerate() {
            let mut matched = None;
            if let Some(key) = vchild.key() {
                matched = keyed.get_mut(key).and_then(Option::take);
            } else if min < len {
                for j in min..len {
                    let Some(candidate) = unkeyed[j] else {
                        continue;
                    };
                    if self.is_same_node_type(candidate, vchild, hydrating)? {
                        matched = Some(candidate);
                        unkeyed[j] = None;
                        if j == len - 1 {
                            len -= 1;
                        }
                        if j == min {
                            min += 1;
                        }
                        break;
                    }
                }
            }

            let child = self.idiff(matched, vchild, context, mount_all, false)?;

            let slot = self.renderer.child_at(dom, index)?;
            if child != dom && Some(child) != slot {
                match slot {
                    None => self.renderer.append_child(dom, child)?,
                    Some(slot) if self.renderer.next_sibling(slot)? == Some(child) => {
                        self.renderer.remove_node(slot)?;
                    }
                    Some(slot) => self.renderer.insert_before(dom, child, slot)?,
                }
                log::trace!("placed node {child} at index {index} of {dom}");
            }
        }

        for node in keyed.into_values().flatten() {
            self.recollect_node_tree(node, false)?;
        }
        for index in (min..=len).rev() {
            if let Some(Some(node)) = unkeyed.get(index).copied() {
                self.recollect_node_tree(node, false)?;
            }
        }
        Ok(())
    }

    /// Whether an unmanaged child may be matched against desired children.
    fn poolable(&self, child: NodeId, hydrating: bool) -> Result<bool, Error> {
        if self.renderer.is_text(child)? {
            Ok(!hydrating || !self.renderer.text(child)?.trim().is_empty())
        } else {
            Ok(hydrating)
        }
    }

    pub(crate) fn is_same_node_type(&self, node: NodeId, vnode: &VNode, hydrating: bool) -> Result<bool, Error> {
        let element = match vnode {
            VNode::Empty | VNode::Text(_) => return Ok(self.renderer.is_text(node)?),
            VNode::Element(element) => element,
        };
        match &element.name {
            NodeName::Tag(tag) => {
                Ok(!self.owner_types.contains_key(&node) && self.renderer.is_named(node, tag)?)
            }
            NodeName::Component(ty) => Ok(hydrating || self.owner_types.get(&node) == Some(ty)),
        }
    }

    /// Brings the attributes of `dom` in line with `attributes`, using the
    /// node's cache as the baseline.
    fn diff_attributes(&mut self, dom: NodeId, attributes: Option<&Attributes>) -> Result<(), Error> {
        let mut cache = self.caches.remove(&dom).unwrap_or_default();
        let result = self.patch_attributes(dom, attributes, &mut cache);
        self.caches.insert(dom, cache);
        result
    }

    fn patch_attributes(
        &mut self,
        dom: NodeId,
        attributes: Option<&Attributes>,
        cache: &mut Attributes,
    ) -> Result<(), Error> {
        let stale: Vec<String> = cache
            .iter()
            .filter(|(name, value)| {
                !value.is_null()
                    && attributes
                        .and_then(|attrs| attrs.get(name.as_str()))
                        .map_or(true, Value::is_null)
            })
            .map(|(name, _)| name.clone())
            .collect();
        for name in stale {
            let old = cache.insert(name.clone(), Value::Null);
            self.set_accessor(dom, &name, old.as_ref(), None)?;
        }

        let Some(attributes) = attributes else {
            return Ok(());
        };
        for (name, value) in attributes {
            if name == "children" || name == "innerHTML" {
                continue;
            }
            let changed = match cache.get(name) {
                None => true,
                Some(_) if name == "value" || name == "checked" => {
                    self.renderer.property(dom, name)?.as_ref() != Some(value)
                }
                Some(cached) => cached != value,
            };
            if changed {
                let old = cache.insert(name.clone(), value.clone());
                self.set_accessor(dom, name, old.as_ref(), Some(value))?;
            }
        }
        Ok(())
    }

    fn set_accessor(
        &mut self,
        dom: NodeId,
        name: &str,
        old: Option<&Value>,
        new: Option<&Value>,
    ) -> Result<(), Error> {
        match name {
            "key" => Ok(()),
            "ref" => {
                apply_ref(old.and_then(Value::to_ref).as_ref(), None);
                apply_ref(new.and_then(Value::to_ref).as_ref(), Some(RefTarget::Node(dom)));
                Ok(())
            }
            _ => Ok(self.renderer.set_accessor(dom, name, old, new, self.svg_mode)?),
        }
    }

    /// Tears down `node`: unmounts the component that owns it, or fires its
    /// ref, detaches it and tears down its children.
    ///
    /// With `unmount_only`, a managed node stays attached; its parent is
    /// being discarded anyway.
    pub(crate) fn recollect_node_tree(&mut self, node: NodeId, unmount_only: bool) -> Result<(), Error> {
        self.collect_node(node, unmount_only, true)
    }

    /// With `forget`, the engine's records of every discarded node are
    /// dropped too. Nodes kept for a pooled instance are collected without it.
    fn collect_node(&mut self, node: NodeId, unmount_only: bool, forget: bool) -> Result<(), Error> {
        if let Some(owner) = self.owner(node) {
            return self.unmount_component(&owner);
        }
        let cache = self.caches.get(&node);
        let node_ref = cache.and_then(|cache| cache.get("ref")).and_then(Value::to_ref);
        apply_ref(node_ref.as_ref(), None);
        if !unmount_only || cache.is_none() {
            self.renderer.remove_node(node)?;
            log::trace!("removed node {node}");
        }
        self.remove_children(node, forget)?;
        if forget {
            self.forget_node(node);
        }
        Ok(())
    }

    /// Tears down the children of `node`, last child first.
    pub(crate) fn remove_children(&mut self, node: NodeId, forget: bool) -> Result<(), Error> {
        let mut next = self.renderer.last_child(node)?;
        while let Some(child) = next {
            next = self.renderer.previous_sibling(child)?;
            self.collect_node(child, true, forget)?;
        }
        Ok(())
    }

    fn forget_node(&mut self, node: NodeId) {
        self.caches.remove(&node);
        self.owners.remove(&node);
        self.owner_types.remove(&node);
    }

    /// Runs queued mount hooks, first mounted first.
    pub(crate) fn flush_mounts(&mut self) {
        while let Some(instance) = self.mounts.pop_front() {
            if let Some(hook) = &self.options.after_mount {
                hook(&instance.handle());
            }
            instance.inner().component.borrow_mut().did_mount();
        }
    }
}
