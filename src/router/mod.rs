//! Routers: the tree that drives interactor lifecycles.
//!
//! A [`Router`] owns a handle to an [`Interactable`] and an ordered set of
//! child routers. Attaching a child under an active router activates the
//! child's whole subtree; detaching deactivates it. Once loaded, a router
//! also follows its own interactor: every value its activity stream
//! publishes is pushed down the subtree in pre-order.
//!
//! ```text
//!            P (active)
//!           / \
//!  attach  C   D        C.load(), then activate C, then C's subtree
//!          |
//!          G
//! ```
//!
//! Tree mutation is expected to happen on one logical thread. Hooks and
//! observers run with no arena lock held, so they may attach or detach
//! routers themselves.

mod viewable;

pub use viewable::ViewableRouter;

use std::fmt;
use std::sync::Arc;

use crate::arena::{
    RouterId, RouterNode, clear_parent, link_child, router_arena_insert, router_arena_remove,
    unlink_child,
};
use crate::error::RouterError;
use crate::interactor::Interactable;
use crate::leak::{Tracked, leak_detector};
use crate::stream::{Disposable, Observable, Subject};
use crate::view::ViewControllable;

/// Lifecycle events of a router.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RouterLifecycle {
    /// The router has been loaded.
    DidLoad,
}

/// Shared core of every handle to one router.
///
/// Parents hold their children's handles; the router is destroyed when the
/// last handle (user-held or parent-held) drops.
pub(crate) struct NodeHandle {
    pub(crate) id: RouterId,
    pub(crate) interactable: Arc<dyn Interactable>,
    lifecycle: Subject<RouterLifecycle>,
    pub(crate) view: Option<Arc<dyn ViewControllable>>,
}

impl NodeHandle {
    fn new(interactable: Arc<dyn Interactable>, view: Option<Arc<dyn ViewControllable>>) -> Arc<Self> {
        let id = router_arena_insert();
        tracing::trace!(router = %id, interactable = %interactable.description(), "router created");
        Arc::new(Self {
            id,
            interactable,
            lifecycle: Subject::replay(),
            view,
        })
    }
}

impl Drop for NodeHandle {
    fn drop(&mut self) {
        set_active(&*self.interactable, false);
        set_subtree_active(self.id, false);

        if let Some(node) = router_arena_remove(self.id) {
            let RouterNode {
                children,
                bindings,
                view_expectation,
                ..
            } = node;
            for (child_id, child) in children {
                clear_parent(child_id);
                drop(child);
            }
            self.lifecycle.complete();
            bindings.dispose();
            drop(view_expectation);
        } else {
            self.lifecycle.complete();
        }
        tracing::debug!(router = %self.id, "router destroyed");

        let detector = leak_detector();
        let description = self.interactable.description();
        detector.expect_deallocate(
            Tracked::named(&self.interactable, description),
            detector.deallocation_grace(),
        );
    }
}

/// Bring one interactable to the requested state, calling it only if its
/// state differs.
fn set_active(interactable: &dyn Interactable, active: bool) {
    if active && !interactable.is_active() {
        interactable.activate();
    } else if !active && interactable.is_active() {
        interactable.deactivate();
    }
}

/// Bring every descendant of `root` to the requested state, pre-order.
///
/// Children are re-read at each level, so routers attached or detached by a
/// hook during the walk are seen (or skipped) accordingly.
fn set_subtree_active(root: RouterId, active: bool) {
    for child in root.child_handles() {
        set_active(&*child.interactable, active);
        set_subtree_active(child.id, active);
    }
}

/// A node of the router tree.
///
/// `Router` is a cheap handle: clones refer to the same router. The type
/// parameter is the concrete interactor type, available through
/// [`interactor`](Router::interactor); [`Router<dyn Interactable>`](Router)
/// (the default) is the type-erased form used for children.
///
/// Dropping the last handle destroys the router: its subtree is deactivated,
/// its children are detached (they survive as roots if held elsewhere), its
/// lifecycle stream completes, its load-time bindings are disposed, and the
/// current leak detector is asked to confirm that the interactor deallocates.
///
/// # Example
/// ```
/// use ribs::{Interactor, InteractorScope, Router};
/// use std::sync::Arc;
///
/// let root = Router::new(Arc::new(Interactor::new()));
/// let child = Router::new(Arc::new(Interactor::new()));
/// root.launch();
///
/// root.attach_child(&child).unwrap();
/// assert!(child.interactor().is_active());
///
/// root.detach_child(&child).unwrap();
/// assert!(!child.interactor().is_active());
/// ```
pub struct Router<I: ?Sized = dyn Interactable> {
    node: Arc<NodeHandle>,
    interactor: Arc<I>,
}

impl<I: ?Sized> Clone for Router<I> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            interactor: self.interactor.clone(),
        }
    }
}

impl<I: Interactable> Router<I> {
    /// Create an unloaded, unattached router driving `interactor`.
    pub fn new(interactor: Arc<I>) -> Self {
        Self::with_view(interactor, None)
    }

    pub(crate) fn with_view(interactor: Arc<I>, view: Option<Arc<dyn ViewControllable>>) -> Self {
        let interactable: Arc<dyn Interactable> = interactor.clone();
        Self {
            node: NodeHandle::new(interactable, view),
            interactor,
        }
    }
}

impl Router {
    /// Create a router from an already type-erased interactable.
    pub fn from_dyn(interactable: Arc<dyn Interactable>) -> Self {
        Self {
            node: NodeHandle::new(interactable.clone(), None),
            interactor: interactable,
        }
    }

    fn from_handle(node: Arc<NodeHandle>) -> Self {
        let interactor = node.interactable.clone();
        Self { node, interactor }
    }
}

impl<I: ?Sized + Interactable> Router<I> {
    /// This router's id.
    pub fn id(&self) -> RouterId {
        self.node.id
    }

    /// The interactor this router drives.
    pub fn interactor(&self) -> &Arc<I> {
        &self.interactor
    }

    /// The interactor as a type-erased [`Interactable`].
    pub fn interactable(&self) -> &Arc<dyn Interactable> {
        &self.node.interactable
    }

    /// A type-erased handle to this router.
    pub fn erased(&self) -> Router {
        Router::from_handle(self.node.clone())
    }

    /// Whether both handles refer to the same router.
    pub fn same<J: ?Sized>(&self, other: &Router<J>) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    /// Attached children in attach order.
    pub fn children(&self) -> Vec<Router> {
        self.id()
            .child_handles()
            .into_iter()
            .map(Router::from_handle)
            .collect()
    }

    /// Number of attached children.
    pub fn child_count(&self) -> usize {
        self.id().child_count()
    }

    /// Id of the router this one is attached to.
    pub fn parent(&self) -> Option<RouterId> {
        self.id().parent()
    }

    /// Whether [`load`](Router::load) has run.
    pub fn is_loaded(&self) -> bool {
        self.id().is_loaded()
    }

    /// Lifecycle stream.
    ///
    /// Emits [`RouterLifecycle::DidLoad`] once, replays it to later
    /// observers, and completes when the router is destroyed.
    pub fn lifecycle(&self) -> Observable<RouterLifecycle> {
        self.node.lifecycle.observable()
    }

    /// Load the router. Only the first call has any effect.
    ///
    /// Binds the router to its interactor's activity stream so that every
    /// published value is pushed down the subtree, binds the view
    /// disappearance check for routers that own a view, then emits
    /// [`RouterLifecycle::DidLoad`].
    pub fn load(&self) {
        let id = self.id();
        if !id.mark_loaded() {
            cov_mark::hit!(router_load_twice);
            return;
        }

        let subtree = self
            .node
            .interactable
            .is_active_stream()
            .subscribe(move |active| set_subtree_active(id, active));
        id.bind(subtree);

        if let Some(view) = &self.node.view {
            viewable::bind_view_leak_check(id, &self.node.interactable, view);
        }

        tracing::debug!(router = %id, "router loaded");
        self.node.lifecycle.push(RouterLifecycle::DidLoad);
    }

    /// Bootstrap this router as the root of a tree: activate its interactor,
    /// then load it.
    pub fn launch(&self) {
        tracing::debug!(router = %self.id(), "launching root router");
        self.node.interactable.activate();
        self.load();
    }

    /// Attach `child` as the last child of this router.
    ///
    /// The child is loaded, then its subtree is brought to this router's
    /// activity state: activated pre-order if this router is active,
    /// deactivated otherwise.
    ///
    /// # Errors
    /// Returns [`RouterError::AlreadyAttached`] or
    /// [`RouterError::AttachedElsewhere`] if `child` already has a parent,
    /// and [`RouterError::CyclicAttach`] if `child` is this router or one of
    /// its ancestors. The tree is not modified.
    pub fn attach_child<J: ?Sized + Interactable>(&self, child: &Router<J>) -> Result<(), RouterError> {
        if let Err(err) = link_child(self.id(), &child.node) {
            tracing::warn!(label = err.as_label(), "{err}");
            return Err(err);
        }
        tracing::debug!(parent = %self.id(), child = %child.id(), "attached child");

        child.load();

        let active = self.node.interactable.is_active();
        set_active(&*child.node.interactable, active);
        set_subtree_active(child.id(), active);
        Ok(())
    }

    /// Detach `child` from this router.
    ///
    /// The child's subtree is deactivated pre-order, then the child is
    /// removed. If nothing else holds the child it is destroyed.
    ///
    /// # Errors
    /// Returns [`RouterError::NotAttached`] if `child` is not a child of
    /// this router. Nothing is deactivated or removed in that case.
    pub fn detach_child<J: ?Sized + Interactable>(&self, child: &Router<J>) -> Result<(), RouterError> {
        let parent = self.id();
        let child_id = child.id();
        if !parent.has_child(child_id) {
            cov_mark::hit!(detach_unattached_child);
            let err = RouterError::NotAttached {
                parent,
                child: child_id,
            };
            tracing::debug!(label = err.as_label(), "{err}");
            return Err(err);
        }

        set_active(&*child.node.interactable, false);
        set_subtree_active(child_id, false);

        let removed = unlink_child(parent, child_id)?;
        tracing::debug!(parent = %parent, child = %child_id, "detached child");
        drop(removed);
        Ok(())
    }
}

impl<I: ?Sized + Interactable> fmt::Debug for Router<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("id", &self.id())
            .field("interactable", &self.node.interactable.description())
            .field("active", &self.node.interactable.is_active())
            .field("children", &self.child_count())
            .finish()
    }
}
