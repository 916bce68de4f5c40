//! A slab-backed pool allocator for many small objects of a single shape.
//!
//! This crate provides [`CellPool<T>`], an allocator that obtains large slabs
//! from the system allocator and carves them into `T`-sized cells, together
//! with the raw [`Slab`] building block and the [`Allocator`] trait that
//! node-based containers in this workspace are parameterized over.
//!
//! # Key Features
//!
//! - **Bump allocation**: single instances come from the newest slab at the
//!   cost of one index increment
//! - **Free-list recycling**: deallocated cells are re-issued in LIFO order,
//!   maximizing cache reuse (can be disabled)
//! - **Stable addresses**: cells never move; slabs are only released when the
//!   pool is dropped
//! - **Array fallback**: multi-instance requests go straight to the system
//!   allocator, since slabs are not contiguous with each other
//! - **Builder configuration**: slab capacity, first-slab pre-sizing and
//!   free-list recycling via [`CellPool::builder()`]
//!
//! # Example
//!
//! ```rust
//! use cell_pool::CellPool;
//! use new_zealand::nz;
//!
//! let mut pool = CellPool::<u32>::builder().slab_capacity(nz!(128)).build();
//!
//! let cell = pool.allocate(1);
//!
//! // SAFETY: The cell is valid for writes of u32.
//! unsafe { cell.write(7) };
//!
//! // SAFETY: The cell holds an initialized u32 that needs no drop.
//! unsafe { pool.deallocate(cell, 1) };
//! ```
//!
//! # Thread Safety
//!
//! Pools are thread-mobile but not thread-safe: move a pool between threads
//! freely, but do not share one without external synchronization.

mod allocator;
mod builder;
mod pool;
mod slab;

pub use allocator::*;
pub use builder::*;
pub use pool::CellPool;
pub use slab::*;
