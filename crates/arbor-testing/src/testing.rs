use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use arbor_core::{
    Error, MemoryRenderer, NodeId, Options, RenderScheduler, RendererOp, VNode, Vdom,
};

/// Scheduler that counts flush requests instead of deferring anything.
#[derive(Debug, Default)]
pub struct CountingScheduler {
    requests: AtomicUsize,
}

impl CountingScheduler {
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl RenderScheduler for CountingScheduler {
    fn schedule_flush(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }
}

/// Headless harness for exercising the engine in tests.
///
/// `TestRoot` owns an engine backed by a [`MemoryRenderer`] and a container
/// element to render into. Successive calls to [`TestRoot::render`] diff
/// against the previously rendered tree, the way an application re-renders
/// its root.
pub struct TestRoot {
    vdom: Vdom<MemoryRenderer>,
    scheduler: Arc<CountingScheduler>,
    container: NodeId,
    root: Option<NodeId>,
}

impl TestRoot {
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(options: Options) -> Self {
        let scheduler = Arc::new(CountingScheduler::default());
        let mut renderer = MemoryRenderer::new();
        let container = renderer.create_container("body");
        let vdom = Vdom::with_scheduler(renderer, scheduler.clone()).with_options(options);
        Self {
            vdom,
            scheduler,
            container,
            root: None,
        }
    }

    /// Renders `vnode` into the container, reusing the previous root.
    pub fn render(&mut self, vnode: &VNode) -> Result<NodeId, Error> {
        let root = self.vdom.render(vnode, self.container, self.root)?;
        self.root = Some(root);
        Ok(root)
    }

    /// Runs queued renders until the queue is empty.
    pub fn flush(&mut self) -> Result<(), Error> {
        self.vdom.rerender()
    }

    /// Tears the rendered tree down.
    pub fn unmount(&mut self) -> Result<(), Error> {
        match self.root.take() {
            Some(root) => self.vdom.unmount(root),
            None => Ok(()),
        }
    }

    /// Serialized contents of the container.
    pub fn html(&self) -> String {
        self.vdom.renderer().inner_html(self.container)
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn vdom(&self) -> &Vdom<MemoryRenderer> {
        &self.vdom
    }

    pub fn vdom_mut(&mut self) -> &mut Vdom<MemoryRenderer> {
        &mut self.vdom
    }

    pub fn renderer(&self) -> &MemoryRenderer {
        self.vdom.renderer()
    }

    pub fn renderer_mut(&mut self) -> &mut MemoryRenderer {
        self.vdom.renderer_mut()
    }

    pub fn ops(&self) -> &[RendererOp] {
        self.vdom.renderer().ops()
    }

    pub fn take_ops(&mut self) -> Vec<RendererOp> {
        self.vdom.renderer_mut().take_ops()
    }

    pub fn clear_ops(&mut self) {
        self.vdom.renderer_mut().clear_ops();
    }

    /// Number of flushes the engine has requested.
    pub fn flush_requests(&self) -> usize {
        self.scheduler.requests()
    }
}

impl Default for TestRoot {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for tests that only need temporary access to a
/// `TestRoot`.
pub fn run_test_root<R>(f: impl FnOnce(&mut TestRoot) -> R) -> R {
    let mut root = TestRoot::new();
    f(&mut root)
}

/// Shared, append-only record of lifecycle events.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<String>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.events.borrow_mut().push(event.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    /// Returns the recorded events and starts a fresh record.
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.events.borrow_mut())
    }

    pub fn len(&self) -> usize {
        self.events.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.borrow().is_empty()
    }
}
