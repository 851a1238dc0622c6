#![deny(missing_docs)]

//! Lifecycle coordination for trees of routers and interactors.
//!
//! Each node of the tree is a [`Router`] that drives one unit of business
//! logic, an [`Interactor`]. An interactor runs only while its router is
//! attached under an active parent, and everything it binds to its active
//! window is released the moment that window closes. When a router goes
//! away, a [`LeakDetection`] service checks that what it drove actually
//! went away too.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use ribs::{DisposeOnDeactivate, Interactor, Router};
//!
//! let root = Router::new(Arc::new(Interactor::new()));
//! root.launch(); // activate, then load
//!
//! let feature = Arc::new(Interactor::new());
//! let child = Router::new(feature.clone());
//! root.attach_child(&child)?; // loads and activates `child`
//!
//! // Only while `feature` is active:
//! updates
//!     .confine_to(&*feature)
//!     .subscribe(|update| render(update))
//!     .dispose_on_deactivate(&feature);
//!
//! root.detach_child(&child)?; // deactivates, disposing the subscription
//! ```
//!
//! # Core Types
//!
//! - [`Interactor`] - Active/inactive state machine with lifecycle hooks.
//! - [`Router`] - Tree node. [`attach_child`](Router::attach_child) and
//!   [`detach_child`](Router::detach_child) propagate activation pre-order.
//! - [`ViewableRouter`] - Router that also owns a view.
//! - [`Subject`] / [`Observable`] - Synchronous multicast streams.
//! - [`LeakDetector`] - Deferred deallocation checks on a tokio timer.
//!
//! # Resource scoping
//!
//! ```ignore
//! subscription.dispose_on_deactivate(&interactor); // disposed on next resign
//! stream.confine_to(&interactor);                  // drops values while inactive
//! let handle = WorkerHandle::start(worker, &interactor);
//! ```
//!
//! # Leak detection
//!
//! ```ignore
//! let detector = Arc::new(LeakDetector::new(LeakDetectorConfig::from_env())?);
//! set_leak_detector(detector.clone());
//! // Routers request `expect_deallocate` for their interactor on drop.
//! let _reports = detector.leaks().subscribe(|report| panic!("{report}"));
//! ```

// Internal modules
pub(crate) mod arena;
mod error;
mod hash;
mod interactor;
mod leak;
mod router;
mod stream;
mod view;
mod worker;

// Streams
pub use stream::{
    CompositeDisposable, Disposable, Observable, Observer, Subject, SubjectId, Subscription,
};

// Interactors and resource scoping
pub use interactor::{
    ActivityState, DisposeOnDeactivate, Interactable, Interactor, InteractorHooks,
    InteractorScope, PresentableInteractor,
};
pub use worker::{Worker, WorkerHandle};

// Routers
pub use arena::RouterId;
pub use router::{Router, RouterLifecycle, ViewableRouter};
pub use view::ViewControllable;

// Leak detection
pub use leak::{
    DEFAULT_DEALLOCATION_GRACE, DEFAULT_VIEW_DISAPPEAR_GRACE, DISABLE_LEAK_DETECTION_ENV,
    LeakDetection, LeakDetectionHandle, LeakDetectionStatus, LeakDetector, LeakDetectorConfig,
    LeakDetectorOverride, Tracked, leak_detector, override_leak_detector, set_leak_detector,
};

// Errors
pub use error::{LeakDetectorError, LeakReport, RouterError};

#[cfg(test)]
mod test_support;
