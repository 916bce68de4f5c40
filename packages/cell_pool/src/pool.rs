use std::alloc::{Layout, alloc, dealloc, handle_alloc_error};
use std::marker::PhantomData;
use std::num::NonZero;
use std::ptr::NonNull;

use new_zealand::nz;

use crate::{CellPoolBuilder, Slab};

/// Cells must be able to hold a free-list link while they are not issued to
/// a caller, so the effective cell layout is the union of `T` and a pointer.
pub(crate) fn cell_layout<T>() -> Layout {
    let link = Layout::new::<*mut u8>();
    let item = Layout::new::<T>();

    let size = item.size().max(link.size());
    let align = item.align().max(link.align());

    Layout::from_size_align(size, align)
        .expect("cell layout calculation cannot fail for valid item types")
        .pad_to_align()
}

/// Number of cells in a steady-state slab unless configured otherwise.
pub(crate) const DEFAULT_SLAB_CAPACITY: NonZero<usize> = nz!(1024);

/// A pool allocator for objects of a single type `T`.
///
/// The pool allocates large slabs from the system allocator and carves them
/// into `T`-sized cells, bump-allocating from the newest slab. Freed cells
/// are recycled through a LIFO free list threaded through the cells' own
/// storage (this can be disabled, in which case freed cells are only
/// reclaimed when the pool is dropped). Slabs are never returned to the
/// system allocator before the pool is dropped.
///
/// The typical use is to speed up node-based containers: many small
/// allocations of the same shape, with high locality and near-zero
/// per-allocation cost.
///
/// Array requests (`count != 1`) are always served by the system allocator,
/// because slabs are not contiguous with each other.
///
/// # Contract
///
/// The pool hands out raw, uninitialized cells. Callers construct values in
/// place and must destroy them before returning a cell or dropping the pool;
/// the pool itself only reclaims raw slab memory.
///
/// # Example
///
/// ```rust
/// use cell_pool::CellPool;
///
/// let mut pool = CellPool::<u64>::new();
///
/// let cell = pool.allocate(1);
///
/// // SAFETY: The cell is valid for writes of u64.
/// unsafe { cell.write(42) };
/// // SAFETY: The cell was just initialized.
/// assert_eq!(unsafe { cell.read() }, 42);
///
/// // SAFETY: The cell came from this pool and the value needs no drop.
/// unsafe { pool.deallocate(cell, 1) };
/// ```
///
/// # Thread Safety
///
/// The pool is thread-mobile ([`Send`] when `T` is) but not thread-safe; it
/// cannot be shared between threads without external synchronization.
#[derive(Debug)]
pub struct CellPool<T> {
    /// Slabs in creation order. Bump allocation only ever touches the newest
    /// slab; older slabs are retained for the addresses they already issued.
    slabs: Vec<Slab>,

    /// Next unused cell index in the newest slab. Always at most the newest
    /// slab's capacity; equality means the slab is exhausted.
    bump_index: usize,

    /// Capacity of the first slab this pool creates. Matches
    /// `slab_capacity` unless overridden at build time to pre-size the pool.
    first_slab_capacity: NonZero<usize>,

    /// Capacity of every slab after the first.
    slab_capacity: NonZero<usize>,

    /// Head of the free list, threaded through the first word of each freed
    /// cell. `None` when empty or when recycling is disabled.
    free_head: Option<NonNull<u8>>,

    /// Whether deallocated cells are pushed onto the free list. When false,
    /// deallocation is a no-op and storage is reclaimed only at pool drop.
    recycle: bool,

    _items: PhantomData<T>,
}

impl<T> CellPool<T> {
    /// Creates a pool with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder for configuring and constructing a [`CellPool`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use cell_pool::CellPool;
    /// use new_zealand::nz;
    ///
    /// let pool = CellPool::<u32>::builder()
    ///     .slab_capacity(nz!(256))
    ///     .build();
    ///
    /// assert_eq!(pool.slab_count(), 0);
    /// ```
    #[must_use]
    pub fn builder() -> CellPoolBuilder<T> {
        CellPoolBuilder::new()
    }

    /// Creates a new [`CellPool`] with the specified configuration.
    ///
    /// This method is used internally by the builder to construct the pool.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized; the pool has no meaningful unit to carve
    /// slabs into for such types.
    #[must_use]
    pub(crate) fn new_inner(
        first_slab_capacity: NonZero<usize>,
        slab_capacity: NonZero<usize>,
        recycle: bool,
    ) -> Self {
        assert!(
            size_of::<T>() > 0,
            "CellPool cannot allocate zero-sized items"
        );

        Self {
            slabs: Vec::new(),
            bump_index: 0,
            first_slab_capacity,
            slab_capacity,
            free_head: None,
            recycle,
            _items: PhantomData,
        }
    }

    /// Allocates storage for `count` instances of `T`.
    ///
    /// A single instance comes from the pool: the free list if it has an
    /// entry, otherwise the next unused cell of the newest slab, otherwise a
    /// freshly created slab. Arrays (`count != 1`) always come from the
    /// system allocator because slabs are not contiguous.
    ///
    /// The returned storage is uninitialized and aligned for `T`.
    ///
    /// # Panics
    ///
    /// Panics if `count` is zero. Allocation failure raises the standard
    /// out of memory signal.
    pub fn allocate(&mut self, count: usize) -> NonNull<T> {
        assert!(count > 0, "cannot allocate zero items");

        if count != 1 {
            return allocate_array(count);
        }

        if let Some(head) = self.free_head {
            // SAFETY: Cells on the free list store the next link in their
            // first word; the cell is valid storage owned by this pool.
            let next = unsafe { head.cast::<*mut u8>().read() };
            self.free_head = NonNull::new(next);
            return head.cast();
        }

        if self
            .slabs
            .last()
            .is_none_or(|slab| self.bump_index == slab.capacity().get())
        {
            let capacity = if self.slabs.is_empty() {
                self.first_slab_capacity
            } else {
                self.slab_capacity
            };

            self.slabs.push(Slab::new(cell_layout::<T>(), capacity));
            self.bump_index = 0;
        }

        let slab = self
            .slabs
            .last()
            .expect("a slab was pushed above if none had room");

        let cell = slab.cell(self.bump_index);

        // Cannot overflow because bump_index is bounded by the slab capacity.
        self.bump_index = self.bump_index.wrapping_add(1);

        cell.cast()
    }

    /// Returns storage previously obtained from [`allocate`](Self::allocate).
    ///
    /// A single cell is pushed onto the free list for reuse (or, with
    /// recycling disabled, simply abandoned until the pool is dropped).
    /// Arrays are returned to the system allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate(count)` on this pool with
    /// the same `count`, the `T` it held must already be destroyed, and the
    /// storage must not be accessed again until it is re-issued.
    pub unsafe fn deallocate(&mut self, ptr: NonNull<T>, count: usize) {
        assert!(count > 0, "cannot deallocate zero items");

        if count != 1 {
            // SAFETY: Forwarding the caller's guarantee that ptr came from
            // the array path of allocate() with the same count.
            unsafe { deallocate_array(ptr, count) };
            return;
        }

        if !self.recycle {
            // Storage is reclaimed when the pool drops its slabs.
            return;
        }

        let cell = ptr.cast::<u8>();

        debug_assert!(
            self.slabs.iter().any(|slab| slab.contains(cell)),
            "deallocated cell does not belong to any slab of this pool"
        );

        let next = self.free_head.map_or(std::ptr::null_mut(), NonNull::as_ptr);

        // SAFETY: The cell layout guarantees room and alignment for one
        // pointer, and the caller guarantees the cell is no longer in use.
        unsafe { cell.cast::<*mut u8>().write(next) };

        self.free_head = Some(cell);
    }

    /// Returns the number of slabs this pool has created.
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Can be mutated to infinitely growing memory use.
    pub fn slab_count(&self) -> usize {
        self.slabs.len()
    }

    /// Returns the total number of cells across all slabs, issued or not.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slabs.iter().map(|slab| slab.capacity().get()).sum()
    }

    /// Returns the number of cells currently on the free list.
    ///
    /// Walks the list; intended for tests and diagnostics, not hot paths.
    #[must_use]
    pub fn free_list_len(&self) -> usize {
        let mut length = 0;
        let mut cursor = self.free_head;

        while let Some(cell) = cursor {
            length += 1;

            // SAFETY: Free-list cells store the next link in their first
            // word; the list is only ever threaded through owned cells.
            cursor = NonNull::new(unsafe { cell.cast::<*mut u8>().read() });
        }

        length
    }
}

impl<T> Default for CellPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CellPool<T> {
    /// Creates a new empty pool with the same configuration.
    ///
    /// The clone owns no slabs and shares no state with the original; cells
    /// stay bound to the pool that issued them. This is the "logical copy"
    /// that container copy semantics expect from an allocator.
    fn clone(&self) -> Self {
        Self::new_inner(self.first_slab_capacity, self.slab_capacity, self.recycle)
    }
}

impl<T> PartialEq for CellPool<T> {
    /// All pools of the same item type compare equal, even when they own
    /// different memory. Containers use allocator equality to decide whether
    /// storage can be handed over on move assignment, and cells of the same
    /// shape are interchangeable at that level.
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl<T> Eq for CellPool<T> {}

// SAFETY: The pool owns its slabs and free-list pointers exclusively; moving
// it to another thread moves any T values still resident in its cells, so the
// same bound as for owning T values directly applies.
unsafe impl<T: Send> Send for CellPool<T> {}

pub(crate) fn allocate_array<T>(count: usize) -> NonNull<T> {
    let layout = Layout::array::<T>(count).expect("array size exceeds address space");

    // SAFETY: T is non-zero-sized (checked at pool creation) and count is
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
pub(crate) unsafe fn deallocate_array<T>(ptr: NonNull<T>, count: usize) {
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
    use new_zealand::nz;

    use super::*;

    #[test]
    fn four_allocations_with_capacity_three_span_two_slabs() {
        #[repr(align(8))]
        #[allow(dead_code, reason = "only the layout matters to the pool")]
        struct Wide([u8; 16]);

        let mut pool = CellPool::<Wide>::builder().slab_capacity(nz!(3)).build();

        let a = pool.allocate(1);
        let b = pool.allocate(1);
        let c = pool.allocate(1);
        assert_eq!(pool.slab_count(), 1);

        let d = pool.allocate(1);
        assert_eq!(pool.slab_count(), 2);

        let cells = [a, b, c, d];
        for (index, cell) in cells.iter().enumerate() {
            assert_eq!(cell.addr().get() % 8, 0);
            assert!(
                cells[index + 1..].iter().all(|other| other != cell),
                "allocated cells must be distinct"
            );
        }

        for cell in cells {
            unsafe { pool.deallocate(cell, 1) };
        }
    }

    #[test]
    fn free_list_is_lifo() {
        let mut pool = CellPool::<u64>::new();

        let a = pool.allocate(1);
        let b = pool.allocate(1);
        let c = pool.allocate(1);

        unsafe {
            pool.deallocate(a, 1);
            pool.deallocate(b, 1);
            pool.deallocate(c, 1);
        }

        assert_eq!(pool.free_list_len(), 3);

        // Last freed is first re-issued.
        assert_eq!(pool.allocate(1), c);
        assert_eq!(pool.allocate(1), b);
        assert_eq!(pool.allocate(1), a);
        assert_eq!(pool.free_list_len(), 0);

        unsafe {
            pool.deallocate(a, 1);
            pool.deallocate(b, 1);
            pool.deallocate(c, 1);
        }
    }

    #[test]
    fn round_trip_reuses_cells_without_new_slabs() {
        let mut pool = CellPool::<u64>::builder().slab_capacity(nz!(8)).build();

        let cells: Vec<_> = (0..8).map(|_| pool.allocate(1)).collect();
        assert_eq!(pool.slab_count(), 1);

        // Deallocate in a scrambled order.
        for &index in &[3_usize, 0, 7, 1, 6, 2, 5, 4] {
            unsafe { pool.deallocate(cells[index], 1) };
        }

        // The next 8 allocations must reuse exactly those cells, without
        // touching the system allocator.
        let reused: Vec<_> = (0..8).map(|_| pool.allocate(1)).collect();
        assert_eq!(pool.slab_count(), 1);

        let mut expected = cells.clone();
        let mut observed = reused.clone();
        expected.sort();
        observed.sort();
        assert_eq!(expected, observed);

        for cell in reused {
            unsafe { pool.deallocate(cell, 1) };
        }
    }

    #[test]
    fn first_slab_capacity_override() {
        let mut pool = CellPool::<u64>::builder()
            .first_slab_capacity(nz!(2))
            .slab_capacity(nz!(4))
            .build();

        _ = pool.allocate(1);
        _ = pool.allocate(1);
        assert_eq!(pool.slab_count(), 1);

        // Third allocation exhausts the small first slab.
        _ = pool.allocate(1);
        assert_eq!(pool.slab_count(), 2);

        // The second slab has the steady-state capacity.
        _ = pool.allocate(1);
        _ = pool.allocate(1);
        _ = pool.allocate(1);
        assert_eq!(pool.slab_count(), 2);
    }

    #[test]
    fn disabled_free_list_drops_cells_on_the_floor() {
        let mut pool = CellPool::<u64>::builder()
            .slab_capacity(nz!(2))
            .free_list(false)
            .build();

        let a = pool.allocate(1);
        unsafe { pool.deallocate(a, 1) };

        assert_eq!(pool.free_list_len(), 0);

        // The freed cell is not reused; the pool bump-allocates onward.
        let b = pool.allocate(1);
        assert_ne!(a, b);
    }

    #[test]
    fn array_allocations_bypass_the_pool() {
        let mut pool = CellPool::<u64>::builder().slab_capacity(nz!(4)).build();

        let array = pool.allocate(16);
        assert_eq!(pool.slab_count(), 0, "arrays must not come from slabs");

        unsafe { pool.deallocate(array, 16) };
        assert_eq!(pool.free_list_len(), 0);
    }

    #[test]
    fn clone_is_a_fresh_pool_with_the_same_configuration() {
        let mut pool = CellPool::<u64>::builder().slab_capacity(nz!(2)).build();
        _ = pool.allocate(1);

        let mut cloned = pool.clone();
        assert_eq!(cloned.slab_count(), 0);

        // The clone grows slabs of the configured capacity.
        _ = cloned.allocate(1);
        _ = cloned.allocate(1);
        assert_eq!(cloned.slab_count(), 1);
        _ = cloned.allocate(1);
        assert_eq!(cloned.slab_count(), 2);
    }

    #[test]
    fn pools_compare_equal() {
        let pool_a = CellPool::<u64>::new();
        let pool_b = CellPool::<u64>::builder().slab_capacity(nz!(2)).build();

        assert_eq!(pool_a, pool_b);
    }

    #[test]
    fn values_survive_in_cells() {
        let mut pool = CellPool::<String>::builder().slab_capacity(nz!(2)).build();

        let cell = pool.allocate(1);
        unsafe { cell.write(String::from("pooled")) };

        unsafe {
            assert_eq!(cell.as_ref(), "pooled");
            cell.drop_in_place();
            pool.deallocate(cell, 1);
        }
    }

    #[test]
    #[should_panic]
    fn zero_count_allocate_panics() {
        let mut pool = CellPool::<u64>::new();
        _ = pool.allocate(0);
    }

    #[test]
    fn thread_mobility() {
        use static_assertions::{assert_impl_all, assert_not_impl_any};

        assert_impl_all!(CellPool<u64>: Send);
        assert_not_impl_any!(CellPool<u64>: Sync);
        assert_not_impl_any!(CellPool<std::rc::Rc<u8>>: Send);
    }
}
