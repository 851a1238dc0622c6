//! Workers: units of logic that run only while an interactor scope is active.
//!
//! A [`Worker`] is started against an [`InteractorScope`] with
//! [`WorkerHandle::start`]. The handle follows the scope's activity stream:
//!
//! ```text
//! scope true  ──► open window, did_start(window)
//! scope false ──► dispose window, did_stop()
//! completion  ──► same as false, observation ends
//! ```
//!
//! Everything a worker inserts into the window it is handed is disposed when
//! that window closes.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::interactor::InteractorScope;
use crate::stream::{CompositeDisposable, Disposable, Subscription};

/// Logic bound to the activity windows of an interactor scope.
pub trait Worker: Send + Sync + 'static {
    /// Called when an activity window opens. Disposables inserted into
    /// `window` are released when it closes.
    fn did_start(&self, window: &CompositeDisposable);

    /// Called after the window opened by the matching `did_start` closed.
    fn did_stop(&self) {}
}

struct WorkerState {
    worker: Arc<dyn Worker>,
    window: Mutex<Option<Arc<CompositeDisposable>>>,
    observation: Mutex<Option<Subscription>>,
    started: AtomicBool,
}

impl WorkerState {
    fn on_activity(&self, active: bool) {
        if active {
            self.open_window();
        } else {
            self.close_window();
        }
    }

    fn open_window(&self) {
        let window = {
            let mut slot = self.window.lock();
            if slot.is_some() {
                return;
            }
            let window = Arc::new(CompositeDisposable::new());
            *slot = Some(window.clone());
            window
        };
        tracing::trace!("worker started");
        self.worker.did_start(&window);
    }

    fn close_window(&self) {
        let window = self.window.lock().take();
        if let Some(window) = window {
            window.dispose();
            tracing::trace!("worker stopped");
            self.worker.did_stop();
        }
    }
}

/// A started worker.
///
/// Dropping the handle stops the worker.
#[must_use = "dropping a WorkerHandle stops the worker"]
pub struct WorkerHandle {
    state: Arc<WorkerState>,
}

impl WorkerHandle {
    /// Start `worker` against `scope`.
    ///
    /// If `scope` is already active the worker starts before this returns.
    pub fn start<W, S>(worker: Arc<W>, scope: &S) -> Self
    where
        W: Worker,
        S: InteractorScope + ?Sized,
    {
        let state = Arc::new(WorkerState {
            worker,
            window: Mutex::new(None),
            observation: Mutex::new(None),
            started: AtomicBool::new(true),
        });

        let on_next: Weak<WorkerState> = Arc::downgrade(&state);
        let on_completed = on_next.clone();
        let observation = scope.is_active_stream().subscribe_with(
            move |active| {
                if let Some(state) = on_next.upgrade() {
                    state.on_activity(active);
                }
            },
            move || {
                if let Some(state) = on_completed.upgrade() {
                    state.started.store(false, Ordering::Release);
                    state.close_window();
                }
            },
        );
        // The scope may have completed during subscribe.
        if state.started.load(Ordering::Acquire) {
            *state.observation.lock() = Some(observation);
        }

        Self { state }
    }

    /// Stop observing the scope, stopping the worker if it is running.
    pub fn stop(&self) {
        if !self.state.started.swap(false, Ordering::AcqRel) {
            return;
        }
        let observation = self.state.observation.lock().take();
        drop(observation);
        self.state.close_window();
    }

    /// Whether the handle is still observing its scope.
    pub fn is_started(&self) -> bool {
        self.state.started.load(Ordering::Acquire)
    }

    /// Whether the worker is inside an activity window.
    pub fn is_running(&self) -> bool {
        self.state.window.lock().is_some()
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interactor::Interactor;
    use crate::test_support::CountingDisposable;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingWorker {
        starts: AtomicUsize,
        stops: AtomicUsize,
        resource: Mutex<Option<CountingDisposable>>,
    }

    impl Worker for CountingWorker {
        fn did_start(&self, window: &CompositeDisposable) {
            self.starts.fetch_add(1, Ordering::Relaxed);
            if let Some(resource) = self.resource.lock().clone() {
                window.insert(resource);
            }
        }

        fn did_stop(&self) {
            self.stops.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn runs_once_per_activity_window() {
        let interactor = Interactor::new();
        let worker = Arc::new(CountingWorker::default());
        let handle = WorkerHandle::start(worker.clone(), &interactor);
        assert!(handle.is_started());
        assert!(!handle.is_running());

        interactor.activate();
        interactor.activate();
        assert!(handle.is_running());
        interactor.deactivate();
        interactor.activate();

        assert_eq!(worker.starts.load(Ordering::Relaxed), 2);
        assert_eq!(worker.stops.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn starts_immediately_on_active_scope() {
        let interactor = Interactor::new();
        interactor.activate();
        let worker = Arc::new(CountingWorker::default());

        let handle = WorkerHandle::start(worker.clone(), &interactor);

        assert!(handle.is_running());
        assert_eq!(worker.starts.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn nested_resign_leaves_worker_stopped() {
        let interactor = Arc::new(Interactor::new());
        let weak = Arc::downgrade(&interactor);
        let _resign_on_activate = interactor.is_active_stream().subscribe(move |active| {
            if let Some(interactor) = weak.upgrade().filter(|_| active) {
                interactor.deactivate();
            }
        });
        let worker = Arc::new(CountingWorker::default());
        let handle = WorkerHandle::start(worker.clone(), &*interactor);

        interactor.activate();

        assert!(!interactor.is_active());
        assert!(!handle.is_running());
        assert_eq!(worker.starts.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn window_disposables_released_on_deactivate() {
        let interactor = Interactor::new();
        let resource = CountingDisposable::new();
        let worker = Arc::new(CountingWorker {
            resource: Mutex::new(Some(resource.clone())),
            ..CountingWorker::default()
        });
        let _handle = WorkerHandle::start(worker, &interactor);

        interactor.activate();
        assert_eq!(resource.disposals(), 0);
        interactor.deactivate();
        assert_eq!(resource.disposals(), 1);
    }

    #[test]
    fn stop_ends_observation() {
        let interactor = Interactor::new();
        interactor.activate();
        let worker = Arc::new(CountingWorker::default());
        let handle = WorkerHandle::start(worker.clone(), &interactor);

        handle.stop();
        handle.stop();
        interactor.deactivate();
        interactor.activate();

        assert!(!handle.is_started());
        assert!(!handle.is_running());
        assert_eq!(worker.starts.load(Ordering::Relaxed), 1);
        assert_eq!(worker.stops.load(Ordering::Relaxed), 1);
        assert!(!interactor.activity().is_completed());
    }

    #[test]
    fn scope_destruction_stops_worker() {
        let interactor = Interactor::new();
        interactor.activate();
        let worker = Arc::new(CountingWorker::default());
        let handle = WorkerHandle::start(worker.clone(), &interactor);

        drop(interactor);

        assert!(!handle.is_started());
        assert_eq!(worker.stops.load(Ordering::Relaxed), 1);
    }
}
