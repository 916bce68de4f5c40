use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

use cell_pool::Allocator;

use crate::{CellShape, ClassId, LocalShapeDriver};

/// A typed allocator façade over a [`LocalShapeDriver`], giving the driver
/// the allocator-trait shape that node-based containers expect.
///
/// The wrapper resolves its class ID lazily on first use and caches it, so
/// repeated allocations skip the driver's classifier. Rebinding to another
/// payload type with the identical footprint carries the cached ID along,
/// which is what lets containers with different node types of the same shape
/// share slabs.
///
/// Arrays (`count != 1`) bypass the driver entirely and use the system
/// allocator, since slabs are not contiguous.
///
/// # Example
///
/// ```rust
/// use shape_pool::{LocalShapeDriver, ShapeAllocator};
///
/// let driver = LocalShapeDriver::new();
/// let alloc = ShapeAllocator::<u64>::new(driver.clone());
///
/// let cell = alloc.allocate(1);
///
/// // SAFETY: The cell is valid for writes of u64.
/// unsafe { cell.write(42) };
///
/// // SAFETY: The cell came from this allocator; u64 needs no drop.
/// unsafe { alloc.deallocate(cell, 1) };
///
/// // The wrapper resolved and cached its class ID on first use.
/// assert_eq!(driver.num_classes(), 1);
/// ```
pub struct ShapeAllocator<T> {
    driver: LocalShapeDriver,

    /// The cached class ID, `None` until the first allocation (or until a
    /// footprint-changing rebind resets it).
    id: Cell<Option<ClassId>>,

    _items: PhantomData<T>,
}

impl<T> ShapeAllocator<T> {
    /// Creates a wrapper over the given driver with an unresolved class ID.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized.
    #[must_use]
    pub fn new(driver: LocalShapeDriver) -> Self {
        assert!(
            size_of::<T>() > 0,
            "ShapeAllocator cannot allocate zero-sized items"
        );

        Self {
            driver,
            id: Cell::new(None),
            _items: PhantomData,
        }
    }

    /// Returns the driver this wrapper allocates from.
    #[must_use]
    pub fn driver(&self) -> &LocalShapeDriver {
        &self.driver
    }

    /// Returns the cached class ID, if it has been resolved yet.
    #[must_use]
    pub fn class_id(&self) -> Option<ClassId> {
        self.id.get()
    }

    /// Rebinds this wrapper to another payload type.
    ///
    /// The cached class ID survives the rebind exactly when `U` has the same
    /// footprint as `T` (equal normalized size and alignment); otherwise the
    /// new wrapper starts unresolved and will be classified on first use.
    #[must_use]
    pub fn rebind<U>(&self) -> ShapeAllocator<U> {
        let id = if CellShape::of::<U>() == CellShape::of::<T>() {
            self.id.get()
        } else {
            None
        };

        let rebound = ShapeAllocator::<U>::new(self.driver.clone());
        rebound.id.set(id);
        rebound
    }

    fn resolve(&self) -> ClassId {
        match self.id.get() {
            Some(id) => id,
            None => {
                let id = self.driver.class_of::<T>();
                self.id.set(Some(id));
                id
            }
        }
    }

    /// Allocates uninitialized storage for `count` instances of `T`.
    ///
    /// A single instance comes from the driver's pool for `T`'s class;
    /// arrays come from the system allocator.
    ///
    /// # Panics
    ///
    /// Panics if `count` is zero. Allocation failure raises the standard
    /// out of memory signal.
    pub fn allocate(&self, count: usize) -> NonNull<T> {
        assert!(count > 0, "cannot allocate zero items");

        if count != 1 {
            return allocate_array(count);
        }

        self.driver.allocate(self.resolve()).cast()
    }

    /// Returns storage previously obtained from
    /// [`allocate`](Self::allocate).
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate(count)` with the same
    /// `count` on a wrapper over the same driver, any value in the storage
    /// must already be destroyed, and the storage must not be accessed
    /// afterwards.
    pub unsafe fn deallocate(&self, ptr: NonNull<T>, count: usize) {
        assert!(count > 0, "cannot deallocate zero items");

        if count != 1 {
            // SAFETY: Forwarding the caller's guarantee that ptr came from
            // the array path of allocate() with the same count.
            unsafe { deallocate_array(ptr, count) };
            return;
        }

        // SAFETY: The caller guarantees the cell came from this driver under
        // the same class (wrappers over one driver resolve equal IDs for T).
        unsafe { self.driver.deallocate(ptr.cast(), self.resolve()) };
    }
}

impl<T> Clone for ShapeAllocator<T> {
    /// Clones the wrapper, sharing the driver and the resolved class ID.
    fn clone(&self) -> Self {
        let cloned = Self::new(self.driver.clone());
        cloned.id.set(self.id.get());
        cloned
    }
}

impl<T> PartialEq for ShapeAllocator<T> {
    /// Two wrappers are interchangeable exactly when they allocate from the
    /// same driver under the same class ID. Containers consult this to
    /// decide whether storage can be handed over on move assignment.
    fn eq(&self, other: &Self) -> bool {
        self.driver.ptr_eq(&other.driver) && self.id.get() == other.id.get()
    }
}

impl<T> fmt::Debug for ShapeAllocator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapeAllocator")
            .field("id", &self.id.get())
            .finish_non_exhaustive()
    }
}

// SAFETY: Single-instance cells come from the driver's slabs, aligned per
// the class footprint (which satisfies T's alignment by classification);
// arrays come from the system allocator. Both stay valid until deallocated.
unsafe impl<T> Allocator<T> for ShapeAllocator<T> {
    fn allocate(&mut self, count: usize) -> NonNull<T> {
        ShapeAllocator::allocate(self, count)
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<T>, count: usize) {
        // SAFETY: Forwarding the trait contract to the inherent method.
        unsafe { ShapeAllocator::deallocate(self, ptr, count) };
    }
}

fn allocate_array<T>(count: usize) -> NonNull<T> {
    use std::alloc::{Layout, alloc, handle_alloc_error};

    let layout = Layout::array::<T>(count).expect("array size exceeds address space");

    // SAFETY: T is non-zero-sized (checked at wrapper creation) and count is
    // non-zero, so the layout has non-zero size.
    let ptr = unsafe { alloc(layout) };

    let Some(ptr) = NonNull::new(ptr) else {
        handle_alloc_error(layout);
    };

    ptr.cast()
}

/// # Safety
///
/// `ptr` must have been returned by [`allocate_array`] with the same `count`.
unsafe fn deallocate_array<T>(ptr: NonNull<T>, count: usize) {
    use std::alloc::{Layout, dealloc};

    let layout = Layout::array::<T>(count).expect("array size exceeds address space");

    // SAFETY: The caller guarantees ptr was allocated with this exact layout.
    unsafe { dealloc(ptr.cast().as_ptr(), layout) };
}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use super::*;

    #[test]
    fn id_is_resolved_lazily_and_cached() {
        let driver = LocalShapeDriver::new();
        let alloc = ShapeAllocator::<u64>::new(driver.clone());

        assert_eq!(alloc.class_id(), None);
        assert_eq!(driver.num_classes(), 0);

        let cell = alloc.allocate(1);

        let id = alloc.class_id().expect("first use must resolve the id");
        assert_eq!(driver.num_classes(), 1);
        assert_eq!(driver.shape_of(id), CellShape::of::<u64>());

        unsafe { alloc.deallocate(cell, 1) };
    }

    #[test]
    fn rebind_carries_the_id_for_equal_footprints() {
        let driver = LocalShapeDriver::new();
        let alloc = ShapeAllocator::<u64>::new(driver);

        _ = alloc.allocate(1);
        let id = alloc.class_id();
        assert!(id.is_some());

        // Same footprint: the cached ID survives.
        let rebound = alloc.rebind::<i64>();
        assert_eq!(rebound.class_id(), id);

        // Different footprint: classification starts over.
        let rebound = alloc.rebind::<[u64; 2]>();
        assert_eq!(rebound.class_id(), None);

        // Same size but weaker alignment is still a different footprint.
        let rebound = alloc.rebind::<[u32; 2]>();
        assert_eq!(rebound.class_id(), None);
    }

    #[test]
    fn equality_requires_same_driver_and_id() {
        let driver = LocalShapeDriver::new();

        let alloc_a = ShapeAllocator::<u64>::new(driver.clone());
        let alloc_b = ShapeAllocator::<u64>::new(driver);
        let alloc_c = ShapeAllocator::<u64>::new(LocalShapeDriver::new());

        // Both unresolved over the same driver.
        assert_eq!(alloc_a, alloc_b);

        // Resolving one side breaks equality until the other resolves too.
        _ = alloc_a.allocate(1);
        assert_ne!(alloc_a, alloc_b);

        _ = alloc_b.allocate(1);
        assert_eq!(alloc_a, alloc_b);

        // A different driver is never equal.
        _ = alloc_c.allocate(1);
        assert_ne!(alloc_a, alloc_c);
    }

    #[test]
    fn same_footprint_wrappers_share_slabs() {
        let driver = LocalShapeDriver::new();

        let alloc_u64 = ShapeAllocator::<u64>::new(driver.clone());
        let alloc_i64 = ShapeAllocator::<i64>::new(driver.clone());

        let cell_a = alloc_u64.allocate(1);
        let cell_b = alloc_i64.allocate(1);

        // One class, one slab: the footprint is shared.
        assert_eq!(driver.num_classes(), 1);
        let id = alloc_u64.class_id().unwrap();
        assert_eq!(driver.slab_count(id), 1);

        unsafe {
            alloc_u64.deallocate(cell_a, 1);
            alloc_i64.deallocate(cell_b, 1);
        }
    }

    #[test]
    fn arrays_bypass_the_driver() {
        let driver = LocalShapeDriver::new();
        let alloc = ShapeAllocator::<u64>::new(driver.clone());

        let array = alloc.allocate(32);

        // No class was ever resolved; the driver was not involved.
        assert_eq!(alloc.class_id(), None);
        assert_eq!(driver.num_classes(), 0);

        unsafe { alloc.deallocate(array, 32) };
    }

    #[test]
    fn clone_shares_driver_and_id() {
        let driver = LocalShapeDriver::new();
        let alloc = ShapeAllocator::<u64>::new(driver);

        _ = alloc.allocate(1);

        let cloned = alloc.clone();
        assert_eq!(cloned.class_id(), alloc.class_id());
        assert_eq!(cloned, alloc);
    }
}
