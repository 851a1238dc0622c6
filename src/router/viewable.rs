use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Weak};

use super::Router;
use crate::arena::RouterId;
use crate::interactor::Interactable;
use crate::leak::leak_detector;
use crate::view::ViewControllable;

/// A [`Router`] that owns a view.
///
/// Once loaded, every `false` on the interactor's activity stream asks the
/// current leak detector to confirm that the view disappears within its
/// view grace period. That includes the value replayed at load, so loading
/// with an inactive interactor schedules a check at once. Any value
/// cancels the previous check first, so activating in time withdraws it.
pub struct ViewableRouter<I: ?Sized = dyn Interactable, V: ?Sized = dyn ViewControllable> {
    router: Router<I>,
    view: Arc<V>,
}

impl<I: Interactable, V: ViewControllable> ViewableRouter<I, V> {
    /// Create an unloaded router driving `interactor` and owning `view`.
    pub fn new(interactor: Arc<I>, view: Arc<V>) -> Self {
        let erased: Arc<dyn ViewControllable> = view.clone();
        Self {
            router: Router::with_view(interactor, Some(erased)),
            view,
        }
    }
}

impl<I: ?Sized, V: ?Sized> ViewableRouter<I, V> {
    /// The owned view.
    pub fn view(&self) -> &Arc<V> {
        &self.view
    }

    /// The underlying router handle.
    pub fn router(&self) -> &Router<I> {
        &self.router
    }
}

impl<I: ?Sized, V: ?Sized> Clone for ViewableRouter<I, V> {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
            view: self.view.clone(),
        }
    }
}

impl<I: ?Sized, V: ?Sized> Deref for ViewableRouter<I, V> {
    type Target = Router<I>;

    fn deref(&self) -> &Router<I> {
        &self.router
    }
}

impl<I: ?Sized + Interactable, V: ?Sized> fmt::Debug for ViewableRouter<I, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewableRouter")
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

/// Schedule a view disappearance check on every `false` `interactable`
/// publishes, cancelling the previous check on every value.
pub(super) fn bind_view_leak_check(
    id: RouterId,
    interactable: &Arc<dyn Interactable>,
    view: &Arc<dyn ViewControllable>,
) {
    let view: Weak<dyn ViewControllable> = Arc::downgrade(view);
    let subscription = interactable.is_active_stream().subscribe(move |active| {
        let previous = id.replace_view_expectation(None);
        if let Some(previous) = previous {
            previous.cancel();
        }
        if active {
            return;
        }
        let Some(view) = view.upgrade() else {
            return;
        };
        let detector = leak_detector();
        let expectation = detector.expect_view_disappear(&view, detector.view_disappear_grace());
        tracing::trace!(router = %id, "expecting view to disappear");
        id.replace_view_expectation(Some(expectation));
    });
    id.bind(subscription);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interactor::Interactor;
    use crate::leak::override_leak_detector;
    use crate::test_support::{InteractableMock, RecordingLeakDetector, ViewMock};

    #[test]
    fn destroying_after_deactivation_checks_view_and_interactor() {
        let detector = Arc::new(RecordingLeakDetector::new());
        let _guard = override_leak_detector(detector.clone());
        let interactor = Arc::new(Interactor::new());
        let router = ViewableRouter::new(interactor.clone(), Arc::new(ViewMock::new()));
        router.launch();

        interactor.deactivate();
        assert_eq!(detector.view_disappear_calls(), 1);

        drop(router);
        assert_eq!(detector.view_disappear_calls(), 1);
        assert_eq!(detector.deallocate_calls(), 1);
        assert_eq!(detector.total_calls(), 2);
    }

    #[test]
    fn reactivation_cancels_pending_view_check() {
        let detector = Arc::new(RecordingLeakDetector::new());
        let _guard = override_leak_detector(detector.clone());
        let interactor = Arc::new(InteractableMock::new());
        let router = ViewableRouter::new(interactor.clone(), Arc::new(ViewMock::new()));
        router.load();

        interactor.activate();
        interactor.deactivate();
        assert_eq!(detector.cancelled_handles(), 0);
        interactor.activate();

        assert_eq!(detector.view_disappear_calls(), 1);
        assert_eq!(detector.cancelled_handles(), 1);
    }

    #[test]
    fn loading_with_inactive_interactor_expects_view_to_disappear() {
        let detector = Arc::new(RecordingLeakDetector::new());
        let _guard = override_leak_detector(detector.clone());
        let interactor = Arc::new(Interactor::new());
        let router = ViewableRouter::new(interactor.clone(), Arc::new(ViewMock::new()));
        router.load();

        interactor.deactivate();

        assert_eq!(detector.view_disappear_calls(), 1);
        assert_eq!(detector.cancelled_handles(), 0);

        interactor.activate();
        assert_eq!(detector.view_disappear_calls(), 1);
        assert_eq!(detector.cancelled_handles(), 1);
        drop(router);
    }

    #[test]
    fn loading_with_active_interactor_schedules_nothing() {
        let detector = Arc::new(RecordingLeakDetector::new());
        let _guard = override_leak_detector(detector.clone());
        let interactor = Arc::new(Interactor::new());
        let router = ViewableRouter::new(interactor.clone(), Arc::new(ViewMock::new()));

        router.launch();

        assert_eq!(detector.view_disappear_calls(), 0);
    }

    #[test]
    fn unloaded_router_schedules_no_view_check() {
        let detector = Arc::new(RecordingLeakDetector::new());
        let _guard = override_leak_detector(detector.clone());
        let interactor = Arc::new(Interactor::new());
        let router = ViewableRouter::new(interactor.clone(), Arc::new(ViewMock::new()));

        interactor.activate();
        interactor.deactivate();

        assert_eq!(detector.view_disappear_calls(), 0);
        assert_eq!(router.view().did_disappear_observers(), 0);
    }

    #[test]
    fn viewable_child_attaches_like_any_router() {
        let detector = Arc::new(RecordingLeakDetector::new());
        let _guard = override_leak_detector(detector.clone());
        let root = Router::new(Arc::new(Interactor::new()));
        root.launch();
        let child_interactor = Arc::new(Interactor::new());
        let child = ViewableRouter::new(child_interactor.clone(), Arc::new(ViewMock::new()));

        // The child loads inactive, so its first check is withdrawn by the
        // activation that follows.
        root.attach_child(child.router()).unwrap();
        assert!(child_interactor.activity().is_active());
        assert_eq!(detector.view_disappear_calls(), 1);
        assert_eq!(detector.cancelled_handles(), 1);

        root.detach_child(child.router()).unwrap();
        assert_eq!(detector.view_disappear_calls(), 2);
    }
}
