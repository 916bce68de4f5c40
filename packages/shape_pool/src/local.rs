use std::cell::RefCell;
use std::num::NonZero;
use std::ptr::NonNull;
use std::rc::Rc;

use crate::{CellShape, ClassId, RawShapeDriver, ShapeDriverBuilder};

/// A single-threaded, cloneable handle to a shared [`RawShapeDriver`].
///
/// Multiple handles can exist simultaneously; the underlying driver stays
/// alive as long as at least one handle does. This is the flavor that
/// allocator wrappers and reference-counted handles embed, because they need
/// to reach the driver long after the scope that created it has ended.
///
/// # Single-threaded Design
///
/// This type is designed for single-threaded use and is neither [`Send`] nor
/// [`Sync`]; the driver underneath performs no synchronization.
///
/// # Example
///
/// ```rust
/// use shape_pool::LocalShapeDriver;
///
/// let driver = LocalShapeDriver::new();
/// let same_driver = driver.clone();
///
/// let id = driver.class_of::<u64>();
/// let cell = same_driver.allocate(id);
///
/// // SAFETY: The cell came from allocate() with this id; u64 needs no drop.
/// unsafe { driver.deallocate(cell, id) };
/// ```
#[derive(Clone, Debug)]
pub struct LocalShapeDriver {
    /// The shared driver, behind a `RefCell` for single-threaded interior
    /// mutability.
    inner: Rc<RefCell<RawShapeDriver>>,
}

impl From<RawShapeDriver> for LocalShapeDriver {
    /// Wraps an existing raw driver in single-threaded shared ownership.
    fn from(driver: RawShapeDriver) -> Self {
        Self {
            inner: Rc::new(RefCell::new(driver)),
        }
    }
}

impl LocalShapeDriver {
    /// Creates a driver with the default configuration and wraps it.
    #[must_use]
    pub fn new() -> Self {
        Self::from(RawShapeDriver::new())
    }

    /// Returns a builder; finish with
    /// [`build_local()`](ShapeDriverBuilder::build_local).
    #[must_use]
    pub fn builder() -> ShapeDriverBuilder {
        RawShapeDriver::builder()
    }

    /// Creates a driver with the given slab capacity and wraps it.
    #[must_use]
    pub fn with_slab_capacity(capacity: NonZero<usize>) -> Self {
        Self::builder().slab_capacity(capacity).build_local()
    }

    /// Returns the class ID that allocations for `T` should use.
    ///
    /// See [`RawShapeDriver::class_of`].
    pub fn class_of<T>(&self) -> ClassId {
        self.inner.borrow_mut().class_of::<T>()
    }

    /// Allocates one uninitialized cell of the class's shape.
    ///
    /// See [`RawShapeDriver::allocate`].
    pub fn allocate(&self, id: ClassId) -> NonNull<u8> {
        self.inner.borrow_mut().allocate(id)
    }

    /// Returns a cell to its class's free list.
    ///
    /// # Safety
    ///
    /// Same contract as [`RawShapeDriver::deallocate`]: the cell must have
    /// come from `allocate` on this driver with the same `id`, its value must
    /// already be destroyed, and it must not be accessed afterwards.
    pub unsafe fn deallocate(&self, ptr: NonNull<u8>, id: ClassId) {
        // SAFETY: Forwarding the caller's guarantees to the raw driver.
        unsafe { self.inner.borrow_mut().deallocate(ptr, id) };
    }

    /// Guarantees that the next `count` allocations for `id` will not create
    /// a slab.
    ///
    /// See [`RawShapeDriver::reserve`].
    pub fn reserve(&self, id: ClassId, count: usize) {
        self.inner.borrow_mut().reserve(id, count);
    }

    /// Returns the number of classes issued so far.
    #[must_use]
    pub fn num_classes(&self) -> usize {
        self.inner.borrow().num_classes()
    }

    /// Returns the footprint recorded for a class.
    #[must_use]
    pub fn shape_of(&self, id: ClassId) -> CellShape {
        self.inner.borrow().shape_of(id)
    }

    /// Returns the number of slabs a class has created.
    #[must_use]
    pub fn slab_count(&self, id: ClassId) -> usize {
        self.inner.borrow().slab_count(id)
    }

    /// Returns the number of cells currently on a class's free list.
    #[must_use]
    pub fn free_cells(&self, id: ClassId) -> usize {
        self.inner.borrow().free_cells(id)
    }

    /// Whether two handles refer to the same underlying driver.
    ///
    /// Class IDs are only exchangeable between handles for which this
    /// returns `true`.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for LocalShapeDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use static_assertions::assert_not_impl_any;

    use super::*;

    #[test]
    fn single_threaded_assertions() {
        assert_not_impl_any!(LocalShapeDriver: Send);
        assert_not_impl_any!(LocalShapeDriver: Sync);
    }

    #[test]
    fn clones_share_the_driver() {
        let driver = LocalShapeDriver::new();
        let clone = driver.clone();

        let id = driver.class_of::<u64>();

        // The clone sees the class registered through the original.
        assert_eq!(clone.num_classes(), 1);
        assert_eq!(clone.class_of::<i64>(), id);
        assert!(driver.ptr_eq(&clone));
    }

    #[test]
    fn distinct_drivers_are_not_equal() {
        let driver_a = LocalShapeDriver::new();
        let driver_b = LocalShapeDriver::new();

        assert!(!driver_a.ptr_eq(&driver_b));
    }

    #[test]
    fn allocation_through_any_clone_reaches_the_same_pools() {
        let driver = LocalShapeDriver::new();
        let clone = driver.clone();

        let id = driver.class_of::<u64>();
        let cell = clone.allocate(id);
        assert_eq!(driver.slab_count(id), 1);

        unsafe { driver.deallocate(cell, id) };
        assert_eq!(clone.free_cells(id), 1);
    }
}
