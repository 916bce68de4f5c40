//! A slab allocator that serves several object shapes behind numeric class
//! IDs, with footprint-based pool sharing.
//!
//! This crate multiplexes [`cell_pool`]-style slab pools over a small set of
//! allocation classes. Types are classified by footprint - normalized size
//! plus alignment - so distinct types of the same shape transparently share
//! slabs. It is the allocation engine underneath the reference-counted
//! handles in the `refc` crate.
//!
//! # Key Types
//!
//! - [`RawShapeDriver`] - the single-owner driver: classification, per-class
//!   bump allocation, free lists, and `reserve` pre-allocation
//! - [`LocalShapeDriver`] - a cloneable single-threaded handle sharing one
//!   driver among many callers
//! - [`ShapeAllocator<T>`] - a typed façade with a lazily resolved, cached
//!   class ID, giving the driver the allocator-trait shape node containers
//!   expect
//! - [`CellShape`] / [`ClassId`] - the classification vocabulary
//!
//! # Example
//!
//! ```rust
//! use shape_pool::RawShapeDriver;
//!
//! let mut driver = RawShapeDriver::new();
//!
//! // Same footprint, same pool.
//! let id = driver.class_of::<u64>();
//! assert_eq!(driver.class_of::<i64>(), id);
//!
//! // Pre-size the pool, then allocate without further slab creation.
//! driver.reserve(id, 100);
//! let cell = driver.allocate(id);
//!
//! // SAFETY: The cell came from allocate() with this id; u64 needs no drop.
//! unsafe { driver.deallocate(cell, id) };
//! ```
//!
//! # Thread Safety
//!
//! Everything here is single-threaded by design: the raw driver is
//! thread-mobile, the local handle is neither [`Send`] nor [`Sync`], and no
//! operation synchronizes. Callers that need cross-thread allocation must
//! wrap the driver themselves.

mod allocator;
mod builder;
mod driver;
mod local;
mod shape;

pub use allocator::ShapeAllocator;
pub use builder::*;
pub use driver::RawShapeDriver;
pub use local::*;
pub use shape::*;
