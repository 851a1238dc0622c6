//! Zero-sized hash builder for the router tree's child sets.
//!
//! Child sets are keyed by [`RouterId`](crate::RouterId), which the crate
//! allocates itself, so HashDoS resistance buys nothing there.

use std::hash::BuildHasher;

use foldhash::fast::{FixedState, FoldHasher};

/// A zero-sized BuildHasher that uses foldhash with a fixed seed.
///
/// Every router node carries one child map, so the builder adds no bytes to
/// a node and hashes identically across nodes.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct FastHashBuilder;

impl BuildHasher for FastHashBuilder {
    type Hasher = FoldHasher<'static>;

    #[inline]
    fn build_hasher(&self) -> Self::Hasher {
        FixedState::with_seed(0x517cc1b727220a95).build_hasher()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RouterId;
    use crate::arena::router_arena_insert;
    use crate::arena::router_arena_remove;

    #[test]
    fn fast_hash_builder_is_zero_sized() {
        assert_eq!(std::mem::size_of::<FastHashBuilder>(), 0);
    }

    #[test]
    fn router_ids_hash_identically_across_builders() {
        let id: RouterId = router_arena_insert();

        assert_eq!(FastHashBuilder.hash_one(id), FastHashBuilder.hash_one(id));

        router_arena_remove(id);
    }
}
