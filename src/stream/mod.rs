// Push-based multicast streams
//
// This module provides the small stream vocabulary the lifecycle runtime is
// built on:
// - Subject: multicast source, optionally replaying its latest value
// - Observable: cloneable subscribe function with filter/map/confine operators
// - Subscription / CompositeDisposable: teardown handles
//
// Delivery is synchronous on the pushing thread. Subjects never hold their
// lock while an observer runs, so observers may subscribe, dispose, or push
// into other subjects (or the same one) from inside a callback.

mod disposable;
mod observable;
mod subject;

pub use disposable::{CompositeDisposable, Disposable, Subscription};
pub use observable::{Observable, Observer};
pub use subject::{Subject, SubjectId};
