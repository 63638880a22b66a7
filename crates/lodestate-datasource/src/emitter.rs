//! Load request emitters
//!
//! An emitter is the single source of "current request" for a datasource.
//! Sources subscribe to it and start loading whenever a request arrives.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use tracing::{debug, trace};

use lodestate_core::{LoadRequest, Observable, Observer, Property, ResourceParams, Subscription};

use crate::tasks::TaskRegistry;

/// A stream of load requests that can also be pushed into.
pub trait LoadRequestEmitter<P>: Observable<LoadRequest<P>> {
    /// Emit `request` to every observer.
    fn emit(&self, request: LoadRequest<P>);

    /// The most recently emitted (or initial) request.
    fn latest(&self) -> Option<LoadRequest<P>>;
}

/// Emitter replaying its most recent request to new observers.
pub struct SimpleLoadRequestEmitter<P> {
    latest: Property<Option<LoadRequest<P>>>,
}

impl<P: ResourceParams> SimpleLoadRequestEmitter<P> {
    /// Emitter that starts out with `initial`, if any.
    pub fn new(initial: Option<LoadRequest<P>>) -> Self {
        Self {
            latest: Property::new(initial),
        }
    }
}

impl<P: ResourceParams> Observable<LoadRequest<P>> for SimpleLoadRequestEmitter<P> {
    fn observe(&self, observer: Observer<LoadRequest<P>>) -> Subscription {
        self.latest
            .observe(Arc::new(move |request: &Option<LoadRequest<P>>| {
                if let Some(request) = request {
                    observer(request);
                }
            }))
    }
}

impl<P: ResourceParams> LoadRequestEmitter<P> for SimpleLoadRequestEmitter<P> {
    fn emit(&self, request: LoadRequest<P>) {
        trace!(request = %request.identity(), "emitting load request");
        self.latest.set(Some(request));
    }

    fn latest(&self) -> Option<LoadRequest<P>> {
        self.latest.get()
    }
}

/// Emitter re-emitting its most recent request periodically.
///
/// Every explicit [`emit`](LoadRequestEmitter::emit) restarts the period.
/// The timer task stops when the emitter is dropped.
pub struct RecurringLoadRequestEmitter<P> {
    inner: Arc<SimpleLoadRequestEmitter<P>>,
    interval: Mutex<Option<Duration>>,
    timer: Mutex<Option<AbortHandle>>,
    tasks: TaskRegistry,
}

impl<P: ResourceParams> RecurringLoadRequestEmitter<P> {
    /// Emitter starting with `initial` and re-emitting every `interval`.
    pub fn new(
        initial: Option<LoadRequest<P>>,
        interval: Option<Duration>,
        runtime: Handle,
    ) -> Self {
        let emitter = Self {
            inner: Arc::new(SimpleLoadRequestEmitter::new(initial)),
            interval: Mutex::new(interval),
            timer: Mutex::new(None),
            tasks: TaskRegistry::new(runtime),
        };
        emitter.reset_timer();
        emitter
    }

    /// Change the period; `None` stops re-emitting.
    pub fn set_interval(&self, interval: Option<Duration>) {
        debug!(?interval, "recurring emitter interval changed");
        *self.interval.lock() = interval;
        self.reset_timer();
    }

    /// Current period.
    pub fn interval(&self) -> Option<Duration> {
        *self.interval.lock()
    }

    fn reset_timer(&self) {
        let mut timer = self.timer.lock();
        if let Some(previous) = timer.take() {
            previous.abort();
        }
        let Some(period) = self.interval() else {
            return;
        };

        let emitter = Arc::downgrade(&self.inner);
        *timer = Some(self.tasks.spawn_interval_until(period, move || {
            let Some(emitter) = emitter.upgrade() else {
                return false;
            };
            if let Some(request) = emitter.latest() {
                trace!(request = %request.identity(), "re-emitting load request");
                emitter.emit(request);
            }
            true
        }));
    }
}

impl<P: ResourceParams> Observable<LoadRequest<P>> for RecurringLoadRequestEmitter<P> {
    fn observe(&self, observer: Observer<LoadRequest<P>>) -> Subscription {
        self.inner.observe(observer)
    }
}

impl<P: ResourceParams> LoadRequestEmitter<P> for RecurringLoadRequestEmitter<P> {
    fn emit(&self, request: LoadRequest<P>) {
        self.inner.emit(request);
        self.reset_timer();
    }

    fn latest(&self) -> Option<LoadRequest<P>> {
        self.inner.latest()
    }
}
