//! Deferred checks for objects that outlive their expected lifetime.
//!
//! A [`LeakDetection`] service schedules one-shot checks: after a grace
//! period it looks at a weak observation of an object (or at whether a view
//! signalled that it disappeared) and reports the objects that did not go
//! away. Checks never hold a strong reference to what they observe.
//!
//! Core code never stores a detector. It resolves the current one at call
//! time through [`leak_detector`], so tests can substitute a recording
//! implementation with [`set_leak_detector`] or, per thread, with
//! [`override_leak_detector`].

mod config;
mod detector;
mod instance;
mod tracked;

pub use config::{
    DEFAULT_DEALLOCATION_GRACE, DEFAULT_VIEW_DISAPPEAR_GRACE, DISABLE_LEAK_DETECTION_ENV,
    LeakDetectorConfig,
};
pub use detector::LeakDetector;
pub use instance::{LeakDetectorOverride, leak_detector, override_leak_detector, set_leak_detector};
pub use tracked::Tracked;

use std::sync::Arc;
use std::time::Duration;

use crate::stream::Observable;
use crate::view::ViewControllable;

/// Aggregate state of a detector's scheduled checks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LeakDetectionStatus {
    /// At least one check has been scheduled and has not yet fired or been
    /// cancelled.
    InProgress,
    /// No check is outstanding.
    DidComplete,
}

/// Handle to one scheduled check.
///
/// Dropping the handle does not cancel the check.
pub trait LeakDetectionHandle: Send + Sync {
    /// Cancel the check if it has not fired yet. Idempotent.
    fn cancel(&self);
}

/// A leak detection service.
pub trait LeakDetection: Send + Sync {
    /// Check, once `within` has elapsed, that `object` has been deallocated.
    fn expect_deallocate(&self, object: Tracked, within: Duration) -> Box<dyn LeakDetectionHandle>;

    /// Check, once `within` has elapsed, that `view` signalled
    /// [`did_disappear`](ViewControllable::did_disappear) after this call or
    /// has been deallocated.
    fn expect_view_disappear(
        &self,
        view: &Arc<dyn ViewControllable>,
        within: Duration,
    ) -> Box<dyn LeakDetectionHandle>;

    /// Aggregate status stream. Replays the current status to new observers.
    fn status(&self) -> Observable<LeakDetectionStatus>;

    /// Grace period core code passes to [`expect_deallocate`](LeakDetection::expect_deallocate).
    fn deallocation_grace(&self) -> Duration {
        DEFAULT_DEALLOCATION_GRACE
    }

    /// Grace period core code passes to
    /// [`expect_view_disappear`](LeakDetection::expect_view_disappear).
    fn view_disappear_grace(&self) -> Duration {
        DEFAULT_VIEW_DISAPPEAR_GRACE
    }
}
