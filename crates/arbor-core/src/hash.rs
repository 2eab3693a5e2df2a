//! Hasher selection for the engine's side tables.
//!
//! Both hashers are built with fixed keys, so iteration order of a map is a
//! pure function of its insertion history.

use core::hash::BuildHasherDefault;

#[cfg(feature = "std-hash")]
pub mod default {
    pub use std::collections::hash_map::DefaultHasher;
}

#[cfg(not(feature = "std-hash"))]
pub mod default {
    pub use ahash::AHasher as DefaultHasher;
}

/// Builder used by every map in the crate.
pub type BuildHasher = BuildHasherDefault<default::DefaultHasher>;
