// Multicast subject
//
// Observers live in a slab keyed by insertion slot. Each observer is wrapped
// in an Arc<ObserverSlot> with a `live` flag so that delivery can snapshot the
// observer list, release the lock, and still skip observers disposed
// mid-delivery. Slab keys are reused, so teardown only removes a slot if it
// is still the same Arc it inserted.
//
// Replaying subjects hold state, not events. Every push bumps a generation
// counter, and a delivery stops as soon as a nested push has superseded it:
// the remaining observers already received the newer value from the nested
// delivery and must not see the older one after it.

use parking_lot::Mutex;
use slab::Slab;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use super::disposable::Subscription;
use super::observable::{Observable, Observer};

static NEXT_SUBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Subject`].
///
/// Observables created by [`Subject::observable`] remember the id of the
/// subject they came from, which lets operators recognise a stream they have
/// already been applied to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubjectId(u64);

impl SubjectId {
    fn next() -> Self {
        Self(NEXT_SUBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

struct ObserverSlot<T> {
    live: AtomicBool,
    next: Box<dyn Fn(T) + Send + Sync>,
    completed: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl<T> ObserverSlot<T> {
    fn deliver(&self, value: T) {
        if self.live.load(Ordering::Acquire) {
            (self.next)(value);
        }
    }

    fn complete(&self) {
        if !self.live.swap(false, Ordering::AcqRel) {
            return;
        }
        let completed = self.completed.lock().take();
        if let Some(completed) = completed {
            completed();
        }
    }
}

struct SubjectState<T> {
    observers: Slab<Arc<ObserverSlot<T>>>,
    latest: Option<T>,
    replay: bool,
    completed: bool,
}

struct SubjectInner<T> {
    id: SubjectId,
    state: Mutex<SubjectState<T>>,
    /// Bumped under the state lock on every push to a replaying subject.
    generation: AtomicU64,
}

impl<T> SubjectInner<T> {
    fn is_current(&self, generation: Option<u64>) -> bool {
        generation.is_none_or(|generation| self.generation.load(Ordering::Acquire) == generation)
    }
}

/// A multicast source of values.
///
/// Every value pushed is delivered synchronously, in subscription order, to
/// each observer subscribed at the time of the push. A replaying subject
/// additionally hands its latest value to each new observer on subscribe.
///
/// Completion is terminal. Once [`complete`](Subject::complete) has run no
/// further value is delivered, and new observers are completed immediately
/// without receiving anything.
pub struct Subject<T> {
    inner: Arc<SubjectInner<T>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone + Send + 'static> Subject<T> {
    fn with_state(latest: Option<T>, replay: bool) -> Self {
        Self {
            inner: Arc::new(SubjectInner {
                id: SubjectId::next(),
                state: Mutex::new(SubjectState {
                    observers: Slab::new(),
                    latest,
                    replay,
                    completed: false,
                }),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// A subject that only delivers values pushed after subscription.
    pub fn publish() -> Self {
        Self::with_state(None, false)
    }

    /// A subject that replays its latest value (if any) to new observers.
    pub fn replay() -> Self {
        Self::with_state(None, true)
    }

    /// A replaying subject seeded with an initial value.
    pub fn behavior(initial: T) -> Self {
        Self::with_state(Some(initial), true)
    }

    /// Identity of this subject.
    pub fn id(&self) -> SubjectId {
        self.inner.id
    }

    /// Latest value held for replay, if this subject replays.
    pub fn value(&self) -> Option<T> {
        self.inner.state.lock().latest.clone()
    }

    /// Deliver `value` to every current observer.
    ///
    /// Does nothing after completion.
    pub fn push(&self, value: T) {
        let observers = {
            let mut state = self.inner.state.lock();
            if state.completed {
                return;
            }
            let generation = self.record_latest(&mut state, &value);
            (snapshot(&state.observers), generation)
        };
        deliver(&self.inner, observers, value);
    }

    /// Push `value` unless it equals the latest replayed value.
    ///
    /// Returns whether the value was pushed. Non-replaying subjects hold no
    /// latest value and always push.
    pub fn push_if_changed(&self, value: T) -> bool
    where
        T: PartialEq,
    {
        let observers = {
            let mut state = self.inner.state.lock();
            if state.completed || state.latest.as_ref() == Some(&value) {
                return false;
            }
            let generation = self.record_latest(&mut state, &value);
            (snapshot(&state.observers), generation)
        };
        deliver(&self.inner, observers, value);
        true
    }

    // Called with the state lock held.
    fn record_latest(&self, state: &mut SubjectState<T>, value: &T) -> Option<u64> {
        if !state.replay {
            return None;
        }
        state.latest = Some(value.clone());
        Some(self.inner.generation.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Complete the subject, notifying and releasing every observer.
    pub fn complete(&self) {
        let observers = {
            let mut state = self.inner.state.lock();
            if state.completed {
                return;
            }
            state.completed = true;
            std::mem::take(&mut state.observers)
        };
        for (_, observer) in observers {
            observer.complete();
        }
    }

    /// Whether [`complete`](Subject::complete) has run.
    pub fn is_completed(&self) -> bool {
        self.inner.state.lock().completed
    }

    /// Whether any observer is currently subscribed.
    pub fn has_observers(&self) -> bool {
        !self.inner.state.lock().observers.is_empty()
    }

    /// Number of currently subscribed observers.
    pub fn observer_count(&self) -> usize {
        self.inner.state.lock().observers.len()
    }

    /// A subscribable view of this subject.
    pub fn observable(&self) -> Observable<T> {
        let inner = self.inner.clone();
        Observable::new(move |observer| subscribe(&inner, observer)).with_origin(self.inner.id)
    }
}

impl<T> fmt::Debug for Subject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Subject")
            .field("id", &self.inner.id)
            .field("observers", &state.observers.len())
            .field("replay", &state.replay)
            .field("completed", &state.completed)
            .finish()
    }
}

fn snapshot<T>(observers: &Slab<Arc<ObserverSlot<T>>>) -> Vec<Arc<ObserverSlot<T>>> {
    observers.iter().map(|(_, slot)| slot.clone()).collect()
}

fn deliver<T: Clone>(
    inner: &SubjectInner<T>,
    (observers, generation): (Vec<Arc<ObserverSlot<T>>>, Option<u64>),
    value: T,
) {
    let Some((last, rest)) = observers.split_last() else {
        return;
    };
    for observer in rest {
        if !inner.is_current(generation) {
            cov_mark::hit!(superseded_delivery_stopped);
            return;
        }
        observer.deliver(value.clone());
    }
    if inner.is_current(generation) {
        last.deliver(value);
    } else {
        cov_mark::hit!(superseded_delivery_stopped);
    }
}

fn subscribe<T: Clone + Send + 'static>(
    inner: &Arc<SubjectInner<T>>,
    observer: Observer<T>,
) -> Subscription {
    let (next, completed) = observer.into_parts();
    let slot = Arc::new(ObserverSlot {
        live: AtomicBool::new(true),
        next,
        completed: Mutex::new(completed),
    });

    let (key, replayed) = {
        let mut state = inner.state.lock();
        if state.completed {
            drop(state);
            slot.complete();
            return Subscription::empty();
        }
        let key = state.observers.insert(slot.clone());
        let replayed = if state.replay {
            state
                .latest
                .clone()
                .map(|value| (value, inner.generation.load(Ordering::Acquire)))
        } else {
            None
        };
        (key, replayed)
    };

    if let Some((value, generation)) = replayed {
        if inner.is_current(Some(generation)) {
            slot.deliver(value);
        }
    }

    let weak: Weak<SubjectInner<T>> = Arc::downgrade(inner);
    Subscription::new(move || {
        slot.live.store(false, Ordering::Release);
        let Some(inner) = weak.upgrade() else {
            return;
        };
        // The removed slot drops after the lock is released: dropping the
        // observer closure may run arbitrary destructors.
        let removed = {
            let mut state = inner.state.lock();
            match state.observers.get(key) {
                Some(current) if Arc::ptr_eq(current, &slot) => Some(state.observers.remove(key)),
                _ => None,
            }
        };
        drop(removed);
    })
}
