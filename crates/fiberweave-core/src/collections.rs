//! Hash collections used by the reconciler.
//!
//! Fx hashing by default; the `std-hash` feature swaps in the std hasher
//! without touching call sites.

#[cfg(feature = "std-hash")]
pub mod map {
    pub use std::collections::{HashMap, HashSet};
}

#[cfg(not(feature = "std-hash"))]
pub mod map {
    pub use rustc_hash::{FxHashMap as HashMap, FxHashSet as HashSet};
}

/// Empty map sized for `capacity` entries under either hasher.
pub fn map_with_capacity<K, V>(capacity: usize) -> map::HashMap<K, V> {
    map::HashMap::with_capacity_and_hasher(capacity, Default::default())
}
