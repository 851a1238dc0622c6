// Test doubles shared by the unit tests
//
// - InteractableMock: counts activate/deactivate calls and publishes on a
//   non-replaying stream, like a hand-written interactable would
// - CountingHooks: counts interactor hook invocations
// - RecordingLeakDetector: records expectations without scheduling anything
// - ViewMock: a view whose disappearance is triggered by hand
// - CountingDisposable: counts dispose calls

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::interactor::{Interactable, Interactor, InteractorHooks, InteractorScope};
use crate::leak::{LeakDetection, LeakDetectionHandle, LeakDetectionStatus, Tracked};
use crate::stream::{Disposable, Observable, Subject, Subscription};
use crate::view::ViewControllable;

/// Subscribe to `observable`, collecting every value it emits.
pub(crate) fn record<T>(observable: Observable<T>) -> (Arc<Mutex<Vec<T>>>, Subscription)
where
    T: Send + 'static,
{
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = seen.clone();
    let subscription = observable.subscribe(move |value| seen_clone.lock().push(value));
    (seen, subscription)
}

pub(crate) struct InteractableMock {
    name: &'static str,
    active: AtomicBool,
    stream: Subject<bool>,
    activate_calls: AtomicUsize,
    deactivate_calls: AtomicUsize,
    order: Option<Arc<Mutex<Vec<String>>>>,
}

impl InteractableMock {
    pub(crate) fn new() -> Self {
        Self {
            name: "mock",
            active: AtomicBool::new(false),
            stream: Subject::publish(),
            activate_calls: AtomicUsize::new(0),
            deactivate_calls: AtomicUsize::new(0),
            order: None,
        }
    }

    /// A mock that appends `"<name>:activate"` / `"<name>:deactivate"` to
    /// `order` on every call.
    pub(crate) fn named(name: &'static str, order: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            name,
            order: Some(order),
            ..Self::new()
        }
    }

    pub(crate) fn activate_calls(&self) -> usize {
        self.activate_calls.load(Ordering::Relaxed)
    }

    pub(crate) fn deactivate_calls(&self) -> usize {
        self.deactivate_calls.load(Ordering::Relaxed)
    }

    /// Flip the flag without counting a call or publishing.
    pub(crate) fn set_active(&self, active: bool) {
        self.active.store(active, Ordering::Relaxed);
    }

    fn log(&self, event: &str) {
        if let Some(order) = &self.order {
            order.lock().push(format!("{}:{event}", self.name));
        }
    }
}

impl InteractorScope for InteractableMock {
    fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed)
    }

    fn is_active_stream(&self) -> Observable<bool> {
        self.stream.observable()
    }
}

impl Interactable for InteractableMock {
    fn activate(&self) {
        self.activate_calls.fetch_add(1, Ordering::Relaxed);
        self.log("activate");
        self.active.store(true, Ordering::Relaxed);
        self.stream.push(true);
    }

    fn deactivate(&self) {
        self.deactivate_calls.fetch_add(1, Ordering::Relaxed);
        self.log("deactivate");
        self.active.store(false, Ordering::Relaxed);
        self.stream.push(false);
    }
}

#[derive(Clone, Default)]
pub(crate) struct CountingHooks {
    became_active: Arc<AtomicUsize>,
    resigned_active: Arc<AtomicUsize>,
}

impl CountingHooks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn became_active(&self) -> usize {
        self.became_active.load(Ordering::Relaxed)
    }

    pub(crate) fn resigned_active(&self) -> usize {
        self.resigned_active.load(Ordering::Relaxed)
    }
}

impl InteractorHooks for CountingHooks {
    fn did_become_active(&self, _interactor: &Interactor) {
        self.became_active.fetch_add(1, Ordering::Relaxed);
    }

    fn will_resign_active(&self, _interactor: &Interactor) {
        self.resigned_active.fetch_add(1, Ordering::Relaxed);
    }
}

struct HandleMock {
    cancelled: Arc<AtomicUsize>,
    done: AtomicBool,
}

impl LeakDetectionHandle for HandleMock {
    fn cancel(&self) {
        if !self.done.swap(true, Ordering::Relaxed) {
            self.cancelled.fetch_add(1, Ordering::Relaxed);
        }
    }
}

pub(crate) struct RecordingLeakDetector {
    deallocate_calls: AtomicUsize,
    view_disappear_calls: AtomicUsize,
    cancelled: Arc<AtomicUsize>,
    tracked: Mutex<Vec<String>>,
    status: Subject<LeakDetectionStatus>,
}

impl RecordingLeakDetector {
    pub(crate) fn new() -> Self {
        Self {
            deallocate_calls: AtomicUsize::new(0),
            view_disappear_calls: AtomicUsize::new(0),
            cancelled: Arc::new(AtomicUsize::new(0)),
            tracked: Mutex::new(Vec::new()),
            status: Subject::behavior(LeakDetectionStatus::DidComplete),
        }
    }

    pub(crate) fn deallocate_calls(&self) -> usize {
        self.deallocate_calls.load(Ordering::Relaxed)
    }

    pub(crate) fn view_disappear_calls(&self) -> usize {
        self.view_disappear_calls.load(Ordering::Relaxed)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.deallocate_calls() + self.view_disappear_calls()
    }

    /// Number of distinct handles cancelled.
    pub(crate) fn cancelled_handles(&self) -> usize {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Descriptions passed to `expect_deallocate`, in call order.
    pub(crate) fn tracked_descriptions(&self) -> Vec<String> {
        self.tracked.lock().clone()
    }

    fn handle(&self) -> Box<dyn LeakDetectionHandle> {
        Box::new(HandleMock {
            cancelled: self.cancelled.clone(),
            done: AtomicBool::new(false),
        })
    }
}

impl LeakDetection for RecordingLeakDetector {
    fn expect_deallocate(&self, object: Tracked, _within: Duration) -> Box<dyn LeakDetectionHandle> {
        self.deallocate_calls.fetch_add(1, Ordering::Relaxed);
        self.tracked.lock().push(object.description().to_owned());
        self.handle()
    }

    fn expect_view_disappear(
        &self,
        _view: &Arc<dyn ViewControllable>,
        _within: Duration,
    ) -> Box<dyn LeakDetectionHandle> {
        self.view_disappear_calls.fetch_add(1, Ordering::Relaxed);
        self.handle()
    }

    fn status(&self) -> Observable<LeakDetectionStatus> {
        self.status.observable()
    }
}

pub(crate) struct ViewMock {
    disappear: Subject<()>,
}

impl ViewMock {
    pub(crate) fn new() -> Self {
        Self {
            disappear: Subject::publish(),
        }
    }

    pub(crate) fn disappear(&self) {
        self.disappear.push(());
    }

    pub(crate) fn did_disappear_observers(&self) -> usize {
        self.disappear.observer_count()
    }
}

impl ViewControllable for ViewMock {
    fn did_disappear(&self) -> Observable<()> {
        self.disappear.observable()
    }
}

#[derive(Clone, Default)]
pub(crate) struct CountingDisposable {
    calls: Arc<AtomicUsize>,
}

impl CountingDisposable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of times `dispose` has been called.
    pub(crate) fn disposals(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Disposable for CountingDisposable {
    fn dispose(&self) {
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    fn is_disposed(&self) -> bool {
        self.disposals() > 0
    }
}
