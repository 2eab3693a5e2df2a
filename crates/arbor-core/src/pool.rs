//! Retired component instances kept for their backing nodes.

use crate::component::{ComponentType, Context, Instance};
use crate::runtime::RuntimeHandle;
use crate::vnode::Props;

/// Instances returned on unmount, scanned by constructor identity.
#[derive(Default)]
pub(crate) struct InstancePool {
    entries: Vec<Instance>,
}

impl InstancePool {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Builds a fresh instance of `ty`. When a retired instance of the same
    /// type exists, the most recently retired one is removed and its backing
    /// node becomes the new instance's `next_base`.
    pub(crate) fn acquire(
        &mut self,
        ty: &ComponentType,
        props: Props,
        context: &Context,
        runtime: RuntimeHandle,
    ) -> Instance {
        let instance = Instance::new(ty, props, context, runtime);
        if let Some(position) = self.entries.iter().rposition(|entry| entry.inner().ty == *ty) {
            let retired = self.entries.remove(position);
            let recycled = retired.inner().next_base.get();
            log::debug!(
                "reusing retired {} backing node {:?}",
                ty.name(),
                recycled
            );
            instance.inner().next_base.set(recycled);
        }
        instance
    }

    pub(crate) fn release(&mut self, instance: Instance) {
        self.entries.push(instance);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
