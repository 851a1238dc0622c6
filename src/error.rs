//! Error types reported by the router tree and the leak detector.
//!
//! - [`RouterError`]: protocol misuse of [`attach_child`](crate::Router::attach_child)
//!   and [`detach_child`](crate::Router::detach_child). The tree is never
//!   modified when one of these is returned.
//! - [`LeakDetectorError`]: failure to set up a [`LeakDetector`](crate::LeakDetector).
//! - [`LeakReport`]: an expectation that did not hold when its check fired.
//!   Reports are surfaced through `tracing` and
//!   [`LeakDetector::leaks`](crate::LeakDetector::leaks), never through `Result`.
//!
//! All three provide `as_label` for stable snake_case labels in logs.

use std::time::Duration;
use thiserror::Error;

use crate::RouterId;

/// Misuse of the router tree mutation API.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    /// The child is already attached to this router.
    #[error("{child} is already attached to {parent}")]
    AlreadyAttached {
        /// Router the attach was requested on.
        parent: RouterId,
        /// Router that was to be attached.
        child: RouterId,
    },

    /// The child is attached to a different router.
    #[error("{child} is attached to {current_parent}, detach it before attaching to {parent}")]
    AttachedElsewhere {
        /// Router the attach was requested on.
        parent: RouterId,
        /// Router that was to be attached.
        child: RouterId,
        /// Router the child is currently attached to.
        current_parent: RouterId,
    },

    /// Attaching would make a router its own descendant.
    #[error("attaching {child} to {parent} would create a cycle")]
    CyclicAttach {
        /// Router the attach was requested on.
        parent: RouterId,
        /// Router that was to be attached.
        child: RouterId,
    },

    /// The child is not attached to this router.
    #[error("{child} is not attached to {parent}")]
    NotAttached {
        /// Router the detach was requested on.
        parent: RouterId,
        /// Router that was to be detached.
        child: RouterId,
    },
}

impl RouterError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use ribs::{Interactor, Router, RouterError};
    /// use std::sync::Arc;
    ///
    /// let parent = Router::new(Arc::new(Interactor::new()));
    /// let child = Router::new(Arc::new(Interactor::new()));
    /// let err = parent.detach_child(&child).unwrap_err();
    /// assert_eq!(err.as_label(), "router_not_attached");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RouterError::AlreadyAttached { .. } => "router_already_attached",
            RouterError::AttachedElsewhere { .. } => "router_attached_elsewhere",
            RouterError::CyclicAttach { .. } => "router_cyclic_attach",
            RouterError::NotAttached { .. } => "router_not_attached",
        }
    }

    /// The router that was to be attached or detached.
    pub fn child(&self) -> RouterId {
        match self {
            RouterError::AlreadyAttached { child, .. }
            | RouterError::AttachedElsewhere { child, .. }
            | RouterError::CyclicAttach { child, .. }
            | RouterError::NotAttached { child, .. } => *child,
        }
    }
}

/// Failure to construct a leak detector.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LeakDetectorError {
    /// The background timer runtime could not be built.
    #[error("failed to build leak detector runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

impl LeakDetectorError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            LeakDetectorError::Runtime(_) => "leak_detector_runtime",
        }
    }
}

/// An expectation that did not hold when its check fired.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LeakReport {
    /// An object was still alive after its deallocation grace period.
    #[error(
        "leak detected: {object} still alive {within:?} after it was expected to deallocate; \
         objects still tracked: [{}]",
        .tracked.join(", ")
    )]
    Retained {
        /// Description of the leaked object.
        object: String,
        /// Grace period the object was given.
        within: Duration,
        /// Every object the detector was still tracking when the check fired.
        tracked: Vec<String>,
    },

    /// A view did not signal disappearance within its grace period.
    #[error(
        "{view} did not disappear within {within:?} after its interactor resigned active; \
         objects still tracked: [{}]",
        .tracked.join(", ")
    )]
    ViewNotDisappeared {
        /// Description of the view.
        view: String,
        /// Grace period the view was given.
        within: Duration,
        /// Every object the detector was still tracking when the check fired.
        tracked: Vec<String>,
    },
}

impl LeakReport {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use ribs::LeakReport;
    /// use std::time::Duration;
    ///
    /// let report = LeakReport::Retained {
    ///     object: "Interactor".into(),
    ///     within: Duration::from_secs(1),
    ///     tracked: vec![],
    /// };
    /// assert_eq!(report.as_label(), "leak_retained");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            LeakReport::Retained { .. } => "leak_retained",
            LeakReport::ViewNotDisappeared { .. } => "leak_view_not_disappeared",
        }
    }

    /// Description of the object the report is about.
    pub fn subject(&self) -> &str {
        match self {
            LeakReport::Retained { object, .. } => object,
            LeakReport::ViewNotDisappeared { view, .. } => view,
        }
    }
}
