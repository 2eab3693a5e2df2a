//! The render queue and the handle components use to reach it.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::component::{Instance, InstanceInner};
use crate::platform::RenderScheduler;

struct RuntimeInner {
    scheduler: Arc<dyn RenderScheduler>,
    needs_flush: Cell<bool>,
    queue: RefCell<Vec<Weak<InstanceInner>>>,
}

impl RuntimeInner {
    fn new(scheduler: Arc<dyn RenderScheduler>) -> Self {
        Self {
            scheduler,
            needs_flush: Cell::new(false),
            queue: RefCell::new(Vec::new()),
        }
    }

    fn enqueue_render(&self, instance: &Rc<InstanceInner>) {
        if instance.dirty.replace(true) {
            return;
        }
        let len = {
            let mut queue = self.queue.borrow_mut();
            queue.push(Rc::downgrade(instance));
            queue.len()
        };
        if len == 1 {
            log::trace!("render queue armed by {}", instance.ty.name());
            self.needs_flush.set(true);
            self.scheduler.schedule_flush();
        }
    }

    fn pop(&self) -> Option<Instance> {
        loop {
            let weak = self.queue.borrow_mut().pop()?;
            if let Some(inner) = weak.upgrade() {
                return Some(Instance::from_inner(inner));
            }
        }
    }
}

/// Owner of the render queue. One per engine; never torn down.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(scheduler: Arc<dyn RenderScheduler>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(scheduler)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    /// Whether a flush has been requested and not yet run to completion.
    pub fn needs_flush(&self) -> bool {
        self.inner.needs_flush.get()
    }

    pub fn queued(&self) -> usize {
        self.inner.queue.borrow().len()
    }

    /// Pops the most recently queued instance.
    pub(crate) fn pop(&self) -> Option<Instance> {
        self.inner.pop()
    }

    pub(crate) fn finish_flush(&self) {
        if self.inner.queue.borrow().is_empty() {
            self.inner.needs_flush.set(false);
        }
    }
}

/// Scheduler that only raises [`crate::Vdom::needs_flush`]; the host polls.
#[derive(Debug, Default)]
pub struct DefaultScheduler;

impl RenderScheduler for DefaultScheduler {
    fn schedule_flush(&self) {}
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct TestScheduler {
    requests: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl TestScheduler {
    pub fn requests(&self) -> usize {
        self.requests.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
impl RenderScheduler for TestScheduler {
    fn schedule_flush(&self) {
        self.requests
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }
}

/// Non-owning handle to a [`Runtime`].
#[derive(Clone)]
pub struct RuntimeHandle(Weak<RuntimeInner>);

impl RuntimeHandle {
    /// Marks `instance` dirty and queues it, unless it already is.
    pub(crate) fn enqueue_render(&self, instance: &Rc<InstanceInner>) {
        if let Some(inner) = self.0.upgrade() {
            inner.enqueue_render(instance);
        }
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}
