//! Platform abstraction for deferred rendering.
//!
//! The engine never blocks or spawns; when the render queue goes from empty
//! to non-empty it asks the host, through a [`RenderScheduler`], to call
//! [`crate::Vdom::rerender`] once the current unit of work has finished.

/// Deferral primitive for batched renders.
///
/// Implementations may forward the request to another thread. The flush
/// itself always runs on the thread that owns the engine.
pub trait RenderScheduler: Send + Sync {
    /// Request that the host flush the render queue soon.
    ///
    /// Called at most once per batch: further requests are folded into the
    /// pending flush until the queue drains.
    fn schedule_flush(&self);
}
