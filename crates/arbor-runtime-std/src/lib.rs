//! Standard runtime services backed by Rust's `std` library.
//!
//! This crate provides a concrete [`RenderScheduler`] for `arbor-core`.
//! Applications construct a [`StdRuntime`], build their engine with
//! [`StdRuntime::vdom`] and call [`StdRuntime::pump`] whenever the
//! registered waker fires.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use arbor_core::{Error, RenderScheduler, Renderer, Vdom};

type Waker = Arc<dyn Fn() + Send + Sync + 'static>;

/// Scheduler that records flush requests and wakes the host.
pub struct StdScheduler {
    flush_requested: AtomicBool,
    waker: RwLock<Option<Waker>>,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            flush_requested: AtomicBool::new(false),
            waker: RwLock::new(None),
        }
    }

    /// Returns whether a flush has been requested since the last call.
    pub fn take_flush_request(&self) -> bool {
        self.flush_requested.swap(false, Ordering::SeqCst)
    }

    /// Registers a waker that will be invoked whenever a flush is requested.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        *self.waker.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(waker));
    }

    pub fn clear_waker(&self) {
        *self.waker.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn wake(&self) {
        let waker = self
            .waker
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(waker) = waker {
            waker();
        }
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdScheduler")
            .field(
                "flush_requested",
                &self.flush_requested.load(Ordering::SeqCst),
            )
            .finish()
    }
}

impl RenderScheduler for StdScheduler {
    fn schedule_flush(&self) {
        self.flush_requested.store(true, Ordering::SeqCst);
        self.wake();
    }
}

/// Convenience container owning the standard scheduler.
#[derive(Clone, Default)]
pub struct StdRuntime {
    scheduler: Arc<StdScheduler>,
}

impl StdRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an engine whose flush requests go to this runtime.
    pub fn vdom<R: Renderer>(&self, renderer: R) -> Vdom<R> {
        Vdom::with_scheduler(renderer, self.scheduler.clone())
    }

    pub fn scheduler(&self) -> Arc<StdScheduler> {
        Arc::clone(&self.scheduler)
    }

    /// Returns whether a flush was requested since the last poll.
    pub fn take_flush_request(&self) -> bool {
        self.scheduler.take_flush_request()
    }

    /// Registers a waker to be called when the engine requests a flush.
    pub fn set_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.scheduler.set_waker(waker);
    }

    pub fn clear_waker(&self) {
        self.scheduler.clear_waker();
    }

    /// Flushes `vdom` if a flush was requested. Returns whether it ran.
    pub fn pump<R: Renderer>(&self, vdom: &mut Vdom<R>) -> Result<bool, Error> {
        if !self.take_flush_request() {
            return Ok(false);
        }
        log::debug!("flush requested; rerendering");
        vdom.rerender()?;
        Ok(true)
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .finish()
    }
}
