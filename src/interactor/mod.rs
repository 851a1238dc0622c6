//! Interactors and the lifecycle they expose to routers.
//!
//! An [`Interactor`] owns one [`ActivityState`] and the hooks that run at
//! its edges:
//!
//! ```text
//! activate():   Inactive ─► Active     open scope, did_become_active, publish true
//! deactivate(): Active ─► Resigning ─► Inactive
//!                         will_resign_active, dispose scope, publish false
//! ```
//!
//! Calling `activate` while active (or `deactivate` while inactive) does
//! nothing, so hooks run exactly once per edge.

mod activity;
mod presentable;
mod scope;

pub use activity::ActivityState;
pub use presentable::PresentableInteractor;
pub use scope::DisposeOnDeactivate;

use parking_lot::Mutex;
use std::sync::Arc;

use crate::stream::{CompositeDisposable, Disposable, Observable};

/// Read access to an activity window.
pub trait InteractorScope: Send + Sync {
    /// Whether the scope is currently active.
    fn is_active(&self) -> bool;

    /// Activity stream: replays the current value, then emits transitions.
    fn is_active_stream(&self) -> Observable<bool>;
}

/// What a [`Router`](crate::Router) needs from the interactor it drives.
pub trait Interactable: InteractorScope + 'static {
    /// Become active. No-op if already active.
    fn activate(&self);

    /// Resign active. No-op if inactive.
    fn deactivate(&self);

    /// Description used in logs and leak reports.
    fn description(&self) -> String {
        std::any::type_name::<Self>().to_owned()
    }
}

/// Business logic run at an interactor's activity edges.
///
/// Both hooks default to doing nothing.
pub trait InteractorHooks: Send + Sync + 'static {
    /// Called after the interactor became active, before `true` is published.
    fn did_become_active(&self, interactor: &Interactor) {
        let _ = interactor;
    }

    /// Called while the interactor is resigning, before its scope is disposed.
    fn will_resign_active(&self, interactor: &Interactor) {
        let _ = interactor;
    }
}

impl InteractorHooks for () {}

/// The default [`Interactable`].
///
/// Owns an [`ActivityState`] and an activeness scope that exists only while
/// active. Disposables bound with
/// [`dispose_on_deactivate`](DisposeOnDeactivate::dispose_on_deactivate) are
/// collected in that scope and released when the interactor resigns active
/// or is dropped.
///
/// Dropping an interactor deactivates it (running `will_resign_active`) and
/// completes its activity stream.
pub struct Interactor {
    activity: ActivityState,
    activeness: Mutex<Option<Arc<CompositeDisposable>>>,
    hooks: Box<dyn InteractorHooks>,
    hooks_name: &'static str,
}

impl Interactor {
    /// An interactor without hooks.
    pub fn new() -> Self {
        Self::with_hooks(())
    }

    /// An interactor running `hooks` at its activity edges.
    pub fn with_hooks<H: InteractorHooks>(hooks: H) -> Self {
        Self {
            activity: ActivityState::new(),
            activeness: Mutex::new(None),
            hooks: Box::new(hooks),
            hooks_name: std::any::type_name::<H>(),
        }
    }

    /// The interactor's activity state.
    pub fn activity(&self) -> &ActivityState {
        &self.activity
    }

    /// Become active. No-op if already active.
    pub fn activate(&self) {
        {
            let mut activeness = self.activeness.lock();
            if !self.activity.try_begin_activation() {
                cov_mark::hit!(activate_while_active);
                return;
            }
            *activeness = Some(Arc::new(CompositeDisposable::new()));
        }
        tracing::trace!(interactor = self.hooks_name, "did become active");
        self.hooks.did_become_active(self);
        self.activity.publish();
    }

    /// Resign active. No-op if inactive.
    pub fn deactivate(&self) {
        if !self.activity.try_begin_resign() {
            cov_mark::hit!(deactivate_while_inactive);
            return;
        }
        tracing::trace!(interactor = self.hooks_name, "will resign active");
        self.hooks.will_resign_active(self);
        let activeness = self.activeness.lock().take();
        if let Some(activeness) = activeness {
            activeness.dispose();
        }
        self.activity.finish_resign();
        self.activity.publish();
    }

    /// The activeness scope, if active.
    pub(crate) fn activeness(&self) -> Option<Arc<CompositeDisposable>> {
        self.activeness.lock().clone()
    }
}

impl InteractorScope for Interactor {
    fn is_active(&self) -> bool {
        self.activity.is_active()
    }

    fn is_active_stream(&self) -> Observable<bool> {
        self.activity.changes()
    }
}

impl Interactable for Interactor {
    fn activate(&self) {
        Interactor::activate(self);
    }

    fn deactivate(&self) {
        Interactor::deactivate(self);
    }

    fn description(&self) -> String {
        if self.hooks_name == "()" {
            "Interactor".to_owned()
        } else {
            format!("Interactor<{}>", self.hooks_name)
        }
    }
}

impl Default for Interactor {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Interactor {
    fn drop(&mut self) {
        self.deactivate();
        self.activity.complete();
    }
}

impl std::fmt::Debug for Interactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interactor")
            .field("hooks", &self.hooks_name)
            .field("activity", &self.activity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CountingHooks, record};

    #[test]
    fn is_active_follows_transitions() {
        let interactor = Interactor::new();
        assert!(!interactor.is_active());

        interactor.activate();
        assert!(interactor.is_active());

        interactor.deactivate();
        assert!(!interactor.is_active());
    }

    #[test]
    fn double_activate_runs_hook_once() {
        cov_mark::check!(activate_while_active);
        let hooks = CountingHooks::new();
        let interactor = Interactor::with_hooks(hooks.clone());

        interactor.activate();
        interactor.activate();

        assert_eq!(hooks.became_active(), 1);
    }

    #[test]
    fn double_deactivate_runs_hook_once() {
        cov_mark::check!(deactivate_while_inactive);
        let hooks = CountingHooks::new();
        let interactor = Interactor::with_hooks(hooks.clone());

        interactor.activate();
        interactor.deactivate();
        interactor.deactivate();

        assert_eq!(hooks.resigned_active(), 1);
    }

    #[test]
    fn stream_replays_current_value_then_transitions() {
        let interactor = Interactor::new();
        interactor.activate();

        let (seen, _subscription) = record(interactor.is_active_stream());
        interactor.activate();
        interactor.deactivate();
        interactor.activate();

        assert_eq!(*seen.lock(), vec![true, false, true]);
    }

    #[test]
    fn drop_deactivates_then_completes() {
        let hooks = CountingHooks::new();
        let interactor = Interactor::with_hooks(hooks.clone());
        interactor.activate();
        let stream = interactor.is_active_stream();
        let (seen, _subscription) = record(stream.clone());

        drop(interactor);

        assert_eq!(hooks.resigned_active(), 1);
        assert_eq!(*seen.lock(), vec![true, false]);

        let completed = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let completed_clone = completed.clone();
        let (late, _late_subscription) = record(stream.clone());
        let _completion = stream.subscribe_with(
            |_| {},
            move || completed_clone.store(true, std::sync::atomic::Ordering::Relaxed),
        );
        assert!(late.lock().is_empty());
        assert!(completed.load(std::sync::atomic::Ordering::Relaxed));
    }

    struct ResignOnActivate;

    impl InteractorHooks for ResignOnActivate {
        fn did_become_active(&self, interactor: &Interactor) {
            interactor.deactivate();
        }
    }

    #[test]
    fn nested_transition_leaves_latest_value_current() {
        cov_mark::check!(activity_publish_superseded);
        let interactor = Interactor::with_hooks(ResignOnActivate);
        let (seen, _subscription) = record(interactor.is_active_stream());

        interactor.activate();

        assert!(!interactor.is_active());
        assert_eq!(*seen.lock(), vec![false]);
        let (late, _late_subscription) = record(interactor.is_active_stream());
        assert_eq!(*late.lock(), vec![false]);
    }

    struct ReactivateOnResign;

    impl InteractorHooks for ReactivateOnResign {
        fn will_resign_active(&self, interactor: &Interactor) {
            interactor.activate();
        }
    }

    #[test]
    fn activate_while_resigning_is_ignored() {
        let interactor = Interactor::with_hooks(ReactivateOnResign);
        interactor.activate();
        interactor.deactivate();
        assert!(!interactor.is_active());
    }

    #[test]
    fn description_names_hooks() {
        assert_eq!(Interactor::new().description(), "Interactor");
        assert!(Interactor::with_hooks(ResignOnActivate)
            .description()
            .ends_with("ResignOnActivate>"));
    }
}
