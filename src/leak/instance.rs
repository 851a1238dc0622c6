// Process-wide detector slot
//
// Resolution order for `leak_detector()`:
// 1. the calling thread's override, if one is installed
// 2. the process-wide instance
// 3. a default `LeakDetector` built from the environment on first use
//
// The thread override exists so tests running in parallel can each install
// their own recording detector without observing each other.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use super::config::LeakDetectorConfig;
use super::detector::LeakDetector;
use super::tracked::Tracked;
use super::{LeakDetection, LeakDetectionHandle, LeakDetectionStatus};
use crate::stream::{Observable, Subject};
use crate::view::ViewControllable;

static INSTANCE: RwLock<Option<Arc<dyn LeakDetection>>> = RwLock::new(None);

thread_local! {
    static OVERRIDE: RefCell<Option<Arc<dyn LeakDetection>>> = const { RefCell::new(None) };
}

/// The detector core code reports to.
///
/// Builds the default [`LeakDetector`] from [`LeakDetectorConfig::from_env`]
/// on first use if none has been installed.
pub fn leak_detector() -> Arc<dyn LeakDetection> {
    if let Some(detector) = OVERRIDE.with(|slot| slot.borrow().clone()) {
        return detector;
    }
    {
        let instance = INSTANCE.read();
        if let Some(detector) = instance.as_ref() {
            return detector.clone();
        }
    }
    INSTANCE.write().get_or_insert_with(default_detector).clone()
}

/// Replace the process-wide detector, returning the previous one.
///
/// Swapping the detector while checks are scheduled leaves those checks
/// running on the detector that scheduled them.
pub fn set_leak_detector(detector: Arc<dyn LeakDetection>) -> Option<Arc<dyn LeakDetection>> {
    INSTANCE.write().replace(detector)
}

/// Install `detector` for the current thread until the guard is dropped.
///
/// Overrides nest: dropping a guard restores whatever was installed before
/// it.
pub fn override_leak_detector(detector: Arc<dyn LeakDetection>) -> LeakDetectorOverride {
    let previous = OVERRIDE.with(|slot| slot.borrow_mut().replace(detector));
    LeakDetectorOverride {
        previous,
        _not_send: PhantomData,
    }
}

/// Guard returned by [`override_leak_detector`].
#[must_use = "the override is removed when the guard is dropped"]
pub struct LeakDetectorOverride {
    previous: Option<Arc<dyn LeakDetection>>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for LeakDetectorOverride {
    fn drop(&mut self) {
        let previous = self.previous.take();
        OVERRIDE.with(|slot| *slot.borrow_mut() = previous);
    }
}

fn default_detector() -> Arc<dyn LeakDetection> {
    let config = LeakDetectorConfig::from_env();
    match LeakDetector::new(config.clone()) {
        Ok(detector) => {
            tracing::debug!(disabled = config.disabled, "leak detector started");
            Arc::new(detector)
        }
        Err(err) => {
            tracing::error!(label = err.as_label(), "{err}; leak detection is disabled");
            Arc::new(InertDetector::new(config))
        }
    }
}

/// Stand-in used when the default detector cannot start. Schedules nothing.
struct InertDetector {
    config: LeakDetectorConfig,
    status: Subject<LeakDetectionStatus>,
}

impl InertDetector {
    fn new(config: LeakDetectorConfig) -> Self {
        Self {
            config,
            status: Subject::behavior(LeakDetectionStatus::DidComplete),
        }
    }
}

struct InertHandle;

impl LeakDetectionHandle for InertHandle {
    fn cancel(&self) {}
}

impl LeakDetection for InertDetector {
    fn expect_deallocate(&self, object: Tracked, _within: Duration) -> Box<dyn LeakDetectionHandle> {
        tracing::trace!(object = object.description(), "leak detection inert, check skipped");
        Box::new(InertHandle)
    }

    fn expect_view_disappear(
        &self,
        _view: &Arc<dyn ViewControllable>,
        _within: Duration,
    ) -> Box<dyn LeakDetectionHandle> {
        Box::new(InertHandle)
    }

    fn status(&self) -> Observable<LeakDetectionStatus> {
        self.status.observable()
    }

    fn deallocation_grace(&self) -> Duration {
        self.config.deallocation_grace
    }

    fn view_disappear_grace(&self) -> Duration {
        self.config.view_disappear_grace
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingLeakDetector;

    #[test]
    fn thread_override_nests_and_restores() {
        let outer = Arc::new(RecordingLeakDetector::new());
        let inner = Arc::new(RecordingLeakDetector::new());

        let outer_guard = override_leak_detector(outer.clone());
        {
            let _inner_guard = override_leak_detector(inner.clone());
            leak_detector().expect_deallocate(Tracked::of(&Arc::new(0u8)), Duration::ZERO);
        }
        leak_detector().expect_deallocate(Tracked::of(&Arc::new(0u8)), Duration::ZERO);
        drop(outer_guard);

        assert_eq!(inner.deallocate_calls(), 1);
        assert_eq!(outer.deallocate_calls(), 1);
    }

    #[test]
    fn override_is_thread_local() {
        let recording = Arc::new(RecordingLeakDetector::new());
        let _guard = override_leak_detector(recording.clone());

        std::thread::spawn(|| {
            let detector = leak_detector();
            detector.expect_deallocate(Tracked::of(&Arc::new(0u8)), Duration::from_secs(60)).cancel();
        })
        .join()
        .unwrap();

        assert_eq!(recording.deallocate_calls(), 0);
    }

    #[test]
    fn inert_detector_schedules_nothing() {
        let detector = InertDetector::new(LeakDetectorConfig::default());
        let status = detector.status();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _subscription = status.subscribe(move |value| seen_clone.lock().push(value));

        detector.expect_deallocate(Tracked::of(&Arc::new(0u8)), Duration::ZERO).cancel();

        assert_eq!(*seen.lock(), vec![LeakDetectionStatus::DidComplete]);
        assert_eq!(detector.deallocation_grace(), Duration::from_secs(1));
    }
}
