//! # void_core - Void Engine Core
//!
//! Zero-dependency primitives shared by the simulation crates:
//! - **Handles**: generational indices into owned arenas, so a removed
//!   body or joint can never be reached through a stale reference
//! - **Ids**: plain entity identifiers and monotonic generators
//!
//! Nothing in here allocates globally; every arena and generator is a
//! value owned by whoever needs it.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

#[cfg(feature = "std")]
extern crate std as alloc;

pub mod handle;
pub mod id;

pub use handle::*;
pub use id::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::handle::{Handle, HandleAllocator, HandleMap};
    pub use crate::id::{EntityId, IdGenerator};
}
