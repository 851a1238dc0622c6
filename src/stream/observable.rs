use std::fmt;
use std::sync::Arc;

use super::disposable::Subscription;
use super::subject::SubjectId;

/// Callbacks receiving a stream's values and its completion.
pub struct Observer<T> {
    next: Box<dyn Fn(T) + Send + Sync>,
    completed: Option<Box<dyn FnOnce() + Send>>,
}

impl<T> Observer<T> {
    /// An observer that only handles values.
    pub fn new<F>(on_next: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self {
            next: Box::new(on_next),
            completed: None,
        }
    }

    /// An observer handling both values and completion.
    pub fn with_completion<F, C>(on_next: F, on_completed: C) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
        C: FnOnce() + Send + 'static,
    {
        Self {
            next: Box::new(on_next),
            completed: Some(Box::new(on_completed)),
        }
    }

    #[allow(clippy::type_complexity)]
    pub(crate) fn into_parts(
        self,
    ) -> (
        Box<dyn Fn(T) + Send + Sync>,
        Option<Box<dyn FnOnce() + Send>>,
    ) {
        (self.next, self.completed)
    }
}

type SubscribeFn<T> = dyn Fn(Observer<T>) -> Subscription + Send + Sync;

/// A cloneable handle to a stream of values.
///
/// An observable is just a subscribe function. Subscribing registers an
/// [`Observer`] and returns the [`Subscription`] that unregisters it. Values
/// are delivered synchronously on whichever thread produced them.
pub struct Observable<T> {
    subscribe: Arc<SubscribeFn<T>>,
    origin: Option<SubjectId>,
    confinement: Option<SubjectId>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            subscribe: self.subscribe.clone(),
            origin: self.origin,
            confinement: self.confinement,
        }
    }
}

impl<T: Send + 'static> Observable<T> {
    /// Build an observable from a subscribe function.
    pub fn new<F>(subscribe: F) -> Self
    where
        F: Fn(Observer<T>) -> Subscription + Send + Sync + 'static,
    {
        Self {
            subscribe: Arc::new(subscribe),
            origin: None,
            confinement: None,
        }
    }

    pub(crate) fn with_origin(mut self, origin: SubjectId) -> Self {
        self.origin = Some(origin);
        self
    }

    pub(crate) fn with_confinement(mut self, scope: SubjectId) -> Self {
        self.confinement = Some(scope);
        self
    }

    /// The subject this observable reads directly from, if any.
    pub(crate) fn origin(&self) -> Option<SubjectId> {
        self.origin
    }

    /// The activity stream this observable has been confined to, if any.
    pub(crate) fn confinement(&self) -> Option<SubjectId> {
        self.confinement
    }

    /// Whether both handles subscribe through the same function.
    #[cfg(test)]
    pub(crate) fn shares_source_with(&self, other: &Observable<T>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.subscribe), Arc::as_ptr(&other.subscribe))
    }

    /// Subscribe with a value callback.
    pub fn subscribe<F>(&self, on_next: F) -> Subscription
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.subscribe_observer(Observer::new(on_next))
    }

    /// Subscribe with value and completion callbacks.
    pub fn subscribe_with<F, C>(&self, on_next: F, on_completed: C) -> Subscription
    where
        F: Fn(T) + Send + Sync + 'static,
        C: FnOnce() + Send + 'static,
    {
        self.subscribe_observer(Observer::with_completion(on_next, on_completed))
    }

    /// Subscribe a prebuilt [`Observer`].
    pub fn subscribe_observer(&self, observer: Observer<T>) -> Subscription {
        (self.subscribe)(observer)
    }

    /// Forward only the values matching `predicate`.
    pub fn filter<P>(&self, predicate: P) -> Observable<T>
    where
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let predicate = Arc::new(predicate);
        Observable::new(move |observer: Observer<T>| {
            let (next, completed) = observer.into_parts();
            let predicate = predicate.clone();
            upstream.subscribe_observer(Observer {
                next: Box::new(move |value| {
                    if predicate(&value) {
                        next(value);
                    }
                }),
                completed,
            })
        })
    }

    /// Transform every value with `f`.
    pub fn map<U, F>(&self, f: F) -> Observable<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let f = Arc::new(f);
        Observable::new(move |observer: Observer<U>| {
            let (next, completed) = observer.into_parts();
            let f = f.clone();
            upstream.subscribe_observer(Observer {
                next: Box::new(move |value| next(f(value))),
                completed,
            })
        })
    }
}

impl<T> fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observable")
            .field("origin", &self.origin)
            .field("confinement", &self.confinement)
            .finish_non_exhaustive()
    }
}
