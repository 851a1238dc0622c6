// Resource scoping against an interactor's activity window
//
// dispose_on_deactivate: the disposable joins the interactor's activeness
// composite, which only exists while active. No composite means the
// interactor is inactive and the disposable is released on the spot.
//
// confine_to: a gate flag follows the scope's activity stream and upstream
// values only pass while it is open. Both subscriptions share one
// completion callback so the downstream observer completes exactly once.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{Interactor, InteractorScope};
use crate::stream::{Disposable, Observable, Observer, Subscription};

/// Bind a disposable to an interactor's current activity window.
pub trait DisposeOnDeactivate: Disposable + Sized + 'static {
    /// Dispose `self` when `interactor` resigns active or is dropped.
    ///
    /// If `interactor` is not active, `self` is disposed before this
    /// returns.
    fn dispose_on_deactivate(self, interactor: &Interactor);
}

impl<D: Disposable + 'static> DisposeOnDeactivate for D {
    fn dispose_on_deactivate(self, interactor: &Interactor) {
        match interactor.activeness() {
            Some(activeness) => {
                activeness.insert(self);
            }
            None => {
                cov_mark::hit!(dispose_on_inactive_interactor);
                tracing::trace!("bound to inactive interactor, disposing immediately");
                self.dispose();
            }
        }
    }
}

impl<T: Send + 'static> Observable<T> {
    /// Forward values only while `scope` is active.
    ///
    /// Values emitted while the scope is inactive are dropped, not buffered.
    /// The confined stream completes when either the upstream or the scope's
    /// activity stream completes. Confining a stream that is already confined
    /// to the same scope returns it unchanged.
    pub fn confine_to<S>(&self, scope: &S) -> Observable<T>
    where
        S: InteractorScope + ?Sized,
    {
        let activity = scope.is_active_stream();
        let scope_id = activity.origin();
        if scope_id.is_some() && self.confinement() == scope_id {
            cov_mark::hit!(confine_to_same_scope);
            return self.clone();
        }

        let upstream = self.clone();
        let confined = Observable::new(move |observer: Observer<T>| {
            let (next, completed) = observer.into_parts();
            let completion = Arc::new(Mutex::new(completed));
            let finish = move || {
                let completed = completion.lock().take();
                if let Some(completed) = completed {
                    completed();
                }
            };

            let gate = Arc::new(AtomicBool::new(false));
            let gate_writer = gate.clone();
            let gate_closer = gate.clone();
            let scope_finish = finish.clone();
            let activity_subscription = activity.subscribe_with(
                move |active| gate_writer.store(active, Ordering::Release),
                move || {
                    gate_closer.store(false, Ordering::Release);
                    scope_finish();
                },
            );
            let upstream_subscription = upstream.subscribe_observer(Observer::with_completion(
                move |value| {
                    if gate.load(Ordering::Acquire) {
                        next(value);
                    }
                },
                finish,
            ));

            Subscription::new(move || {
                activity_subscription.dispose();
                upstream_subscription.dispose();
            })
        });

        match scope_id {
            Some(scope_id) => confined.with_confinement(scope_id),
            None => confined,
        }
    }
}
