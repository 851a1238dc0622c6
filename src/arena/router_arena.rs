// Router arena - storage for router tree nodes
//
// This module defines RouterNode and RouterId and provides the functions the
// router module uses to read and mutate the tree.
//
// OWNERSHIP MODEL:
// - A node owns strong handles (Arc<NodeHandle>) to its children
// - A node's parent link is a plain RouterId and never keeps the parent alive
// - A node is removed from the arena when its last NodeHandle drops
//
// LOCKING:
// - Every mutation of parent/children links happens under one write lock, so
//   attach validation (duplicate, foreign parent, cycle) and the link itself
//   are atomic
// - Node handles removed from the tree are returned to the caller and must be
//   dropped after the lock is released: dropping the last handle re-enters the
//   arena to remove the node

use indexmap::IndexMap;
use parking_lot::RwLock;
use slab::Slab;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::RouterError;
use crate::hash::FastHashBuilder;
use crate::leak::LeakDetectionHandle;
use crate::router::NodeHandle;
use crate::stream::{CompositeDisposable, Disposable};

/// Global router arena - stores all live router nodes
static ROUTER_ARENA: RwLock<Slab<RouterNode>> = RwLock::new(Slab::new());

/// Source of node generations. Slab slots are reused, generations are not.
static NEXT_GENERATION: AtomicU32 = AtomicU32::new(1);

/// Stable identity of a router.
///
/// Ids are generational: an id whose router has been destroyed never aliases
/// a router created later in the same arena slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RouterId {
    index: u32,
    generation: u32,
}

impl fmt::Display for RouterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "router#{}.{}", self.index, self.generation)
    }
}

/// Node metadata for one router
pub(crate) struct RouterNode {
    generation: u32,
    /// Router this node is attached to, if any.
    pub(crate) parent: Option<RouterId>,
    /// Attached children in attach order.
    pub(crate) children: IndexMap<RouterId, Arc<NodeHandle>, FastHashBuilder>,
    pub(crate) loaded: bool,
    /// Subscriptions made at load, disposed when the router is destroyed.
    pub(crate) bindings: Arc<CompositeDisposable>,
    /// Latest view disappearance check scheduled for this router.
    pub(crate) view_expectation: Option<Box<dyn LeakDetectionHandle>>,
}

impl RouterNode {
    fn new(generation: u32) -> Self {
        Self {
            generation,
            parent: None,
            children: IndexMap::with_hasher(FastHashBuilder),
            loaded: false,
            bindings: Arc::new(CompositeDisposable::new()),
            view_expectation: None,
        }
    }
}

fn node(arena: &Slab<RouterNode>, id: RouterId) -> Option<&RouterNode> {
    arena
        .get(id.index())
        .filter(|node| node.generation == id.generation)
}

fn node_mut(arena: &mut Slab<RouterNode>, id: RouterId) -> Option<&mut RouterNode> {
    arena
        .get_mut(id.index())
        .filter(|node| node.generation == id.generation)
}

impl RouterId {
    /// Convert to usize for slab indexing
    fn index(self) -> usize {
        self.index as usize
    }

    /// Access the node with a closure (read-only)
    ///
    /// Returns None if the router has been destroyed (stale access).
    pub(crate) fn with<F, R>(self, f: F) -> Option<R>
    where
        F: FnOnce(&RouterNode) -> R,
    {
        let arena = ROUTER_ARENA.read();
        node(&arena, self).map(f)
    }

    /// Access the node with a closure (mutable)
    ///
    /// Returns None if the router has been destroyed (stale access).
    pub(crate) fn with_mut<F, R>(self, f: F) -> Option<R>
    where
        F: FnOnce(&mut RouterNode) -> R,
    {
        let mut arena = ROUTER_ARENA.write();
        node_mut(&mut arena, self).map(f)
    }

    /// Whether the router is still alive.
    pub(crate) fn is_live(self) -> bool {
        self.with(|_| ()).is_some()
    }

    /// Router this one is attached to.
    pub(crate) fn parent(self) -> Option<RouterId> {
        self.with(|node| node.parent).flatten()
    }

    /// Snapshot of the child handles in attach order.
    pub(crate) fn child_handles(self) -> Vec<Arc<NodeHandle>> {
        self.with(|node| node.children.values().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn child_count(self) -> usize {
        self.with(|node| node.children.len()).unwrap_or(0)
    }

    pub(crate) fn has_child(self, child: RouterId) -> bool {
        self.with(|node| node.children.contains_key(&child))
            .unwrap_or(false)
    }

    pub(crate) fn is_loaded(self) -> bool {
        self.with(|node| node.loaded).unwrap_or(false)
    }

    /// Unloaded → Loaded. Returns false if the router was already loaded.
    pub(crate) fn mark_loaded(self) -> bool {
        self.with_mut(|node| !std::mem::replace(&mut node.loaded, true))
            .unwrap_or(false)
    }

    /// Keep `subscription` alive until the router is destroyed.
    pub(crate) fn bind<D: Disposable + 'static>(self, subscription: D) {
        match self.with(|node| node.bindings.clone()) {
            // Inserted outside the arena lock: a disposed composite disposes
            // the subscription synchronously.
            Some(bindings) => {
                bindings.insert(subscription);
            }
            None => subscription.dispose(),
        }
    }

    /// Store the router's latest view check, returning the previous one.
    pub(crate) fn replace_view_expectation(
        self,
        expectation: Option<Box<dyn LeakDetectionHandle>>,
    ) -> Option<Box<dyn LeakDetectionHandle>> {
        self.with_mut(|node| std::mem::replace(&mut node.view_expectation, expectation))
            .flatten()
    }
}

/// Insert a fresh, unattached node and return its id
pub(crate) fn router_arena_insert() -> RouterId {
    let generation = NEXT_GENERATION.fetch_add(1, Ordering::Relaxed);
    let mut arena = ROUTER_ARENA.write();
    let entry = arena.vacant_entry();
    let key = entry.key();
    entry.insert(RouterNode::new(generation));
    RouterId {
        index: key as u32,
        generation,
    }
}

/// Remove a node from the arena
///
/// The returned node still owns its child handles; drop it outside any arena
/// access.
pub(crate) fn router_arena_remove(id: RouterId) -> Option<RouterNode> {
    let mut arena = ROUTER_ARENA.write();
    if node(&arena, id).is_some() {
        Some(arena.remove(id.index()))
    } else {
        None
    }
}

/// Attach `child` under `parent`.
///
/// Fails without touching the tree if `child` is `parent` itself, one of its
/// ancestors, or already attached anywhere.
pub(crate) fn link_child(parent: RouterId, child: &Arc<NodeHandle>) -> Result<(), RouterError> {
    let child_id = child.id;
    if parent == child_id {
        return Err(RouterError::CyclicAttach {
            parent,
            child: child_id,
        });
    }

    let mut arena = ROUTER_ARENA.write();

    let mut ancestor = node(&arena, parent).and_then(|node| node.parent);
    while let Some(id) = ancestor {
        if id == child_id {
            return Err(RouterError::CyclicAttach {
                parent,
                child: child_id,
            });
        }
        ancestor = node(&arena, id).and_then(|node| node.parent);
    }

    match node(&arena, child_id).and_then(|node| node.parent) {
        Some(current) if current == parent => {
            return Err(RouterError::AlreadyAttached {
                parent,
                child: child_id,
            });
        }
        Some(current_parent) => {
            return Err(RouterError::AttachedElsewhere {
                parent,
                child: child_id,
                current_parent,
            });
        }
        None => {}
    }

    if let Some(node) = node_mut(&mut arena, child_id) {
        node.parent = Some(parent);
    }
    if let Some(node) = node_mut(&mut arena, parent) {
        node.children.insert(child_id, child.clone());
    }
    Ok(())
}

/// Detach `child` from `parent`, returning the handle `parent` held.
pub(crate) fn unlink_child(parent: RouterId, child: RouterId) -> Result<Arc<NodeHandle>, RouterError> {
    let mut arena = ROUTER_ARENA.write();
    let handle = node_mut(&mut arena, parent)
        .and_then(|node| node.children.shift_remove(&child))
        .ok_or(RouterError::NotAttached { parent, child })?;
    if let Some(node) = node_mut(&mut arena, child) {
        node.parent = None;
    }
    Ok(handle)
}

/// Clear the parent link of a child whose parent has been removed.
pub(crate) fn clear_parent(child: RouterId) {
    child.with_mut(|node| node.parent = None);
}

