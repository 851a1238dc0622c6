use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A resource that can be released.
///
/// Implementations must make `dispose` idempotent: only the first call
/// releases anything, later calls are no-ops.
pub trait Disposable: Send + Sync {
    /// Release the resource.
    fn dispose(&self);

    /// Whether [`dispose`](Disposable::dispose) has already run.
    fn is_disposed(&self) -> bool;
}

impl<D: Disposable + ?Sized> Disposable for Arc<D> {
    fn dispose(&self) {
        (**self).dispose();
    }

    fn is_disposed(&self) -> bool {
        (**self).is_disposed()
    }
}

impl<D: Disposable + ?Sized> Disposable for Box<D> {
    fn dispose(&self) {
        (**self).dispose();
    }

    fn is_disposed(&self) -> bool {
        (**self).is_disposed()
    }
}

/// Teardown handle for a live subscription.
///
/// The teardown closure runs exactly once: on the first call to
/// [`dispose`](Disposable::dispose) or when the handle is dropped, whichever
/// comes first.
///
/// ```ignore
/// let subscription = subject.observable().subscribe(|v| println!("{v}"));
/// subject.push(1);          // printed
/// drop(subscription);       // observer removed
/// subject.push(2);          // not printed
/// ```
#[must_use = "dropping a Subscription disposes it immediately"]
pub struct Subscription {
    teardown: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    disposed: AtomicBool,
}

impl Subscription {
    /// Create a subscription that runs `teardown` when disposed.
    pub fn new<F>(teardown: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            teardown: Mutex::new(Some(Box::new(teardown))),
            disposed: AtomicBool::new(false),
        }
    }

    /// A subscription with nothing to tear down.
    ///
    /// Returned when subscribing to a source that has already completed.
    pub fn empty() -> Self {
        Self {
            teardown: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }
}

impl Disposable for Subscription {
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let teardown = self.teardown.lock().take();
        if let Some(teardown) = teardown {
            teardown();
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

struct CompositeState {
    disposed: bool,
    items: Vec<Box<dyn Disposable>>,
}

/// A bag of disposables released together.
///
/// Once the composite is disposed, anything inserted afterwards is disposed
/// immediately instead of being stored.
pub struct CompositeDisposable {
    state: Mutex<CompositeState>,
}

impl CompositeDisposable {
    /// Create an empty, live composite.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CompositeState {
                disposed: false,
                items: Vec::new(),
            }),
        }
    }

    /// Add a disposable to the bag.
    ///
    /// Returns `false` if the composite was already disposed, in which case
    /// `item` has been disposed synchronously before returning.
    pub fn insert<D>(&self, item: D) -> bool
    where
        D: Disposable + 'static,
    {
        let rejected = {
            let mut state = self.state.lock();
            if state.disposed {
                Some(item)
            } else {
                state.items.push(Box::new(item));
                None
            }
        };
        match rejected {
            Some(item) => {
                item.dispose();
                false
            }
            None => true,
        }
    }

    /// Number of disposables currently held.
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Whether the bag currently holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Disposable for CompositeDisposable {
    fn dispose(&self) {
        // Items are disposed outside the lock: their teardown may insert into
        // or query this composite again.
        let items = {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            std::mem::take(&mut state.items)
        };
        for item in items {
            item.dispose();
        }
    }

    fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }
}

impl Default for CompositeDisposable {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CompositeDisposable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("CompositeDisposable")
            .field("disposed", &state.disposed)
            .field("items", &state.items.len())
            .finish()
    }
}
