//! # LeakDetector: timer-driven leak checks.
//!
//! Each expectation becomes one [`PendingCheck`] plus one task on the
//! detector's tokio runtime. The task sleeps for the grace period and then
//! fires the check, unless the check's [`CancellationToken`] is cancelled
//! first.
//!
//! ## Check lifecycle
//! ```text
//! expect_* ──► Pending ──┬─► Fired      (timer won: evaluate, report, resolve)
//!                        └─► Cancelled  (handle won: resolve)
//! ```
//!
//! ## Rules
//! - Firing and cancelling race on one compare-exchange of the check state;
//!   exactly one side resolves the check
//! - Status goes `InProgress` on 0→1 outstanding checks and `DidComplete`
//!   on 1→0
//! - A failed check is reported before it is resolved, so a `DidComplete`
//!   observer sees every report of the checks that led to it
//! - A report with no `leaks()` observer is kept when
//!   `fail_on_unobserved_leak` is set, and raised as a panic by
//!   `assert_no_leaks` or on drop

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use papaya::HashMap as PapayaHashMap;
use parking_lot::{Mutex, ReentrantMutex};
use tokio::runtime::{Handle, Runtime};
use tokio::{select, time};
use tokio_util::sync::CancellationToken;

use super::config::LeakDetectorConfig;
use super::tracked::Tracked;
use super::{LeakDetection, LeakDetectionHandle, LeakDetectionStatus};
use crate::error::{LeakDetectorError, LeakReport};
use crate::stream::{Observable, Subject, Subscription};
use crate::view::ViewControllable;

const PENDING: u8 = 0;
const CANCELLED: u8 = 1;
const FIRED: u8 = 2;

struct Shared {
    config: LeakDetectorConfig,
    outstanding: ReentrantMutex<Cell<usize>>,
    status: Subject<LeakDetectionStatus>,
    leaks: Subject<LeakReport>,
    /// Descriptions of checks that have neither fired nor been cancelled.
    pending: PapayaHashMap<u64, String>,
    next_check: AtomicU64,
    /// Reports delivered while nothing observed `leaks`.
    unobserved: Mutex<Vec<LeakReport>>,
}

impl Shared {
    // The outstanding counter stays locked while status is published so that
    // transitions from the timer thread and the caller's thread are delivered
    // in the order they happened. The lock is reentrant: a status observer
    // may schedule or cancel checks on the same thread.
    fn begin(&self, id: u64, description: String) {
        self.pending.pin().insert(id, description);
        let outstanding = self.outstanding.lock();
        let count = outstanding.get();
        outstanding.set(count + 1);
        if count == 0 {
            self.status.push_if_changed(LeakDetectionStatus::InProgress);
        }
    }

    fn resolve(&self, id: u64) {
        self.pending.pin().remove(&id);
        let outstanding = self.outstanding.lock();
        let count = outstanding.get().saturating_sub(1);
        outstanding.set(count);
        if count == 0 {
            self.status.push_if_changed(LeakDetectionStatus::DidComplete);
        }
    }

    fn tracked(&self) -> Vec<String> {
        let pending = self.pending.pin();
        let mut tracked: Vec<(u64, String)> =
            pending.iter().map(|(id, description)| (*id, description.clone())).collect();
        tracked.sort_unstable_by_key(|(id, _)| *id);
        tracked.into_iter().map(|(_, description)| description).collect()
    }

    fn report(&self, report: LeakReport) {
        if self.config.disabled {
            tracing::warn!(label = report.as_label(), "{report}");
            return;
        }
        tracing::error!(label = report.as_label(), "{report}");
        if self.leaks.has_observers() {
            self.leaks.push(report);
        } else if self.config.fail_on_unobserved_leak {
            cov_mark::hit!(leak_report_unobserved);
            self.unobserved.lock().push(report);
        }
    }
}

enum Expectation {
    Deallocate(Tracked),
    ViewDisappear {
        view: Weak<dyn ViewControllable>,
        disappeared: Arc<AtomicBool>,
        _subscription: Subscription,
    },
}

impl Expectation {
    fn holds(&self) -> bool {
        match self {
            Expectation::Deallocate(tracked) => !tracked.is_alive(),
            Expectation::ViewDisappear {
                view, disappeared, ..
            } => disappeared.load(Ordering::Acquire) || view.strong_count() == 0,
        }
    }

    fn into_report(self, description: String, within: Duration, tracked: Vec<String>) -> LeakReport {
        match self {
            Expectation::Deallocate(_) => LeakReport::Retained {
                object: description,
                within,
                tracked,
            },
            Expectation::ViewDisappear { .. } => LeakReport::ViewNotDisappeared {
                view: description,
                within,
                tracked,
            },
        }
    }
}

struct PendingCheck {
    id: u64,
    description: String,
    state: AtomicU8,
    token: CancellationToken,
    shared: Arc<Shared>,
}

impl PendingCheck {
    fn fire(&self, expectation: Expectation, within: Duration) {
        if self
            .state
            .compare_exchange(PENDING, FIRED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            cov_mark::hit!(leak_check_lost_race_to_cancel);
            return;
        }
        if expectation.holds() {
            tracing::trace!(check = self.id, object = %self.description, "leak check passed");
        } else {
            let tracked = self.shared.tracked();
            let report = expectation.into_report(self.description.clone(), within, tracked);
            self.shared.report(report);
        }
        self.shared.resolve(self.id);
    }
}

impl LeakDetectionHandle for Arc<PendingCheck> {
    fn cancel(&self) {
        if self
            .state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        tracing::trace!(check = self.id, object = %self.description, "leak check cancelled");
        self.token.cancel();
        self.shared.resolve(self.id);
    }
}

/// The default [`LeakDetection`] service.
///
/// Checks run on a tokio runtime: either a dedicated single-worker runtime
/// owned by the detector ([`LeakDetector::new`]) or one the caller provides
/// ([`LeakDetector::with_handle`]).
///
/// Every failed check is logged at `error`. [`leaks`](LeakDetector::leaks)
/// is the hook for test harnesses: subscribe to it to fail on reports as
/// they arrive. With
/// [`fail_on_unobserved_leak`](LeakDetectorConfig::fail_on_unobserved_leak)
/// set, reports nobody observed make [`assert_no_leaks`](LeakDetector::assert_no_leaks)
/// and the detector's drop panic.
///
/// # Example
/// ```ignore
/// let detector = LeakDetector::new(LeakDetectorConfig::from_env())?;
/// let leaks = detector.leaks().subscribe(|report| eprintln!("{report}"));
/// set_leak_detector(Arc::new(detector));
/// ```
pub struct LeakDetector {
    shared: Arc<Shared>,
    handle: Handle,
    runtime: Option<Runtime>,
}

impl LeakDetector {
    /// Create a detector with its own background timer runtime.
    pub fn new(config: LeakDetectorConfig) -> Result<Self, LeakDetectorError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("leak-detector")
            .enable_time()
            .build()?;
        let handle = runtime.handle().clone();
        Ok(Self {
            shared: Self::shared(config),
            handle,
            runtime: Some(runtime),
        })
    }

    /// Create a detector that schedules its checks on an existing runtime.
    pub fn with_handle(config: LeakDetectorConfig, handle: Handle) -> Self {
        Self {
            shared: Self::shared(config),
            handle,
            runtime: None,
        }
    }

    fn shared(config: LeakDetectorConfig) -> Arc<Shared> {
        Arc::new(Shared {
            config,
            outstanding: ReentrantMutex::new(Cell::new(0)),
            status: Subject::behavior(LeakDetectionStatus::DidComplete),
            leaks: Subject::publish(),
            unobserved: Mutex::new(Vec::new()),
            pending: PapayaHashMap::new(),
            next_check: AtomicU64::new(0),
        })
    }

    /// The detector's configuration.
    pub fn config(&self) -> &LeakDetectorConfig {
        &self.shared.config
    }

    /// Stream of failed checks. Nothing is emitted while detection is
    /// disabled.
    ///
    /// A harness subscribes here to turn a leak into a test failure.
    pub fn leaks(&self) -> Observable<LeakReport> {
        self.shared.leaks.observable()
    }

    /// Panic if a leak was reported while nothing observed
    /// [`leaks`](LeakDetector::leaks).
    ///
    /// The kept reports are cleared, so a second call passes.
    pub fn assert_no_leaks(&self) {
        let unobserved = std::mem::take(&mut *self.shared.unobserved.lock());
        if unobserved.is_empty() {
            return;
        }
        let reports: Vec<String> = unobserved.iter().map(ToString::to_string).collect();
        panic!("{} unobserved leak report(s):\n{}", reports.len(), reports.join("\n"));
    }

    /// Number of checks that have neither fired nor been cancelled.
    pub fn outstanding(&self) -> usize {
        self.shared.outstanding.lock().get()
    }

    /// Descriptions of outstanding checks, in scheduling order.
    pub fn tracked(&self) -> Vec<String> {
        self.shared.tracked()
    }

    fn schedule(
        &self,
        description: String,
        expectation: Expectation,
        within: Duration,
    ) -> Box<dyn LeakDetectionHandle> {
        let id = self.shared.next_check.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(check = id, object = %description, ?within, "leak check scheduled");
        self.shared.begin(id, description.clone());

        let check = Arc::new(PendingCheck {
            id,
            description,
            state: AtomicU8::new(PENDING),
            token: CancellationToken::new(),
            shared: self.shared.clone(),
        });
        let task_check = check.clone();
        self.handle.spawn(async move {
            select! {
                _ = task_check.token.cancelled() => {}
                _ = time::sleep(within) => task_check.fire(expectation, within),
            }
        });
        Box::new(check)
    }
}

impl LeakDetection for LeakDetector {
    fn expect_deallocate(&self, object: Tracked, within: Duration) -> Box<dyn LeakDetectionHandle> {
        let description = object.description().to_owned();
        self.schedule(description, Expectation::Deallocate(object), within)
    }

    fn expect_view_disappear(
        &self,
        view: &Arc<dyn ViewControllable>,
        within: Duration,
    ) -> Box<dyn LeakDetectionHandle> {
        let disappeared = Arc::new(AtomicBool::new(false));
        let flag = disappeared.clone();
        let subscription = view
            .did_disappear()
            .subscribe(move |()| flag.store(true, Ordering::Release));
        let expectation = Expectation::ViewDisappear {
            view: Arc::downgrade(view),
            disappeared,
            _subscription: subscription,
        };
        self.schedule(view.description(), expectation, within)
    }

    fn status(&self) -> Observable<LeakDetectionStatus> {
        self.shared.status.observable()
    }

    fn deallocation_grace(&self) -> Duration {
        self.shared.config.deallocation_grace
    }

    fn view_disappear_grace(&self) -> Duration {
        self.shared.config.view_disappear_grace
    }
}

impl Drop for LeakDetector {
    fn drop(&mut self) {
        // Dropping a runtime blocks, which panics inside async contexts.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
        if !std::thread::panicking() {
            self.assert_no_leaks();
        }
    }
}

impl fmt::Debug for LeakDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeakDetector")
            .field("config", &self.shared.config)
            .field("outstanding", &self.outstanding())
            .field("owns_runtime", &self.runtime.is_some())
            .finish()
    }
}
