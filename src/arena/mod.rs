// Arena-based storage for the router tree
//
// Router nodes live in one global slab behind an RwLock. RouterId is a
// lightweight generational handle that indexes into it; the tree links
// (parent, children) are stored in the nodes themselves.

pub mod router_arena;

pub use router_arena::RouterId;
pub(crate) use router_arena::{
    RouterNode, clear_parent, link_child, router_arena_insert, router_arena_remove,
    unlink_child,
};
