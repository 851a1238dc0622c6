use std::ops::Deref;
use std::sync::Arc;

use super::{Interactable, Interactor, InteractorHooks, InteractorScope};
use crate::leak::{Tracked, leak_detector};
use crate::stream::Observable;

/// An [`Interactor`] that owns a presenter.
///
/// When dropped, the presenter is expected to deallocate within the current
/// detector's deallocation grace period.
pub struct PresentableInteractor<P: ?Sized + Send + Sync + 'static> {
    interactor: Interactor,
    presenter: Arc<P>,
}

impl<P: ?Sized + Send + Sync + 'static> PresentableInteractor<P> {
    /// A presentable interactor without hooks.
    pub fn new(presenter: Arc<P>) -> Self {
        Self::with_hooks(presenter, ())
    }

    /// A presentable interactor running `hooks` at its activity edges.
    pub fn with_hooks<H: InteractorHooks>(presenter: Arc<P>, hooks: H) -> Self {
        Self {
            interactor: Interactor::with_hooks(hooks),
            presenter,
        }
    }

    /// The owned presenter.
    pub fn presenter(&self) -> &Arc<P> {
        &self.presenter
    }
}

impl<P: ?Sized + Send + Sync + 'static> Deref for PresentableInteractor<P> {
    type Target = Interactor;

    fn deref(&self) -> &Interactor {
        &self.interactor
    }
}

impl<P: ?Sized + Send + Sync + 'static> InteractorScope for PresentableInteractor<P> {
    fn is_active(&self) -> bool {
        self.interactor.is_active()
    }

    fn is_active_stream(&self) -> Observable<bool> {
        self.interactor.is_active_stream()
    }
}

impl<P: ?Sized + Send + Sync + 'static> Interactable for PresentableInteractor<P> {
    fn activate(&self) {
        self.interactor.activate();
    }

    fn deactivate(&self) {
        self.interactor.deactivate();
    }

    fn description(&self) -> String {
        format!("PresentableInteractor<{}>", std::any::type_name::<P>())
    }
}

impl<P: ?Sized + Send + Sync + 'static> Drop for PresentableInteractor<P> {
    fn drop(&mut self) {
        let detector = leak_detector();
        let grace = detector.deallocation_grace();
        detector.expect_deallocate(Tracked::of(&self.presenter), grace);
    }
}
