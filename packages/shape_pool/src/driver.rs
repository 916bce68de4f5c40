use std::num::NonZero;
use std::ptr::NonNull;

use cell_pool::Slab;
use new_zealand::nz;

use crate::{CellShape, ClassId, ShapeDriverBuilder};

/// Number of cells per slab unless configured otherwise.
pub(crate) const DEFAULT_SLAB_CAPACITY: NonZero<usize> = nz!(1024);

/// Per-class allocation state: the slabs carved for this shape, the bump
/// position within the newest slab, and the free list of recycled cells.
#[derive(Debug, Default)]
struct ClassPool {
    /// Slabs in creation order; bump allocation only touches the newest one.
    slabs: Vec<Slab>,

    /// Next unissued cell index in the newest slab. Equal to the newest
    /// slab's capacity when it is exhausted.
    bump_index: usize,

    /// Head of the free list, threaded through the first word of each freed
    /// cell.
    free_head: Option<NonNull<u8>>,
}

impl ClassPool {
    /// Cells still unissued in the newest slab.
    fn headroom(&self) -> usize {
        self.slabs
            .last()
            .map_or(0, |slab| slab.capacity().get() - self.bump_index)
    }

    fn push_free(&mut self, cell: NonNull<u8>) {
        let next = self.free_head.map_or(std::ptr::null_mut(), NonNull::as_ptr);

        // SAFETY: Every cell of a normalized shape holds at least one
        // pointer, and a cell being pushed here is not in use by any caller.
        unsafe { cell.cast::<*mut u8>().write(next) };

        self.free_head = Some(cell);
    }

    fn pop_free(&mut self) -> Option<NonNull<u8>> {
        let head = self.free_head?;

        // SAFETY: Cells on the free list store the next link in their first
        // word; the list is only ever threaded through cells this pool owns.
        let next = unsafe { head.cast::<*mut u8>().read() };
        self.free_head = NonNull::new(next);

        Some(head)
    }
}

/// A slab allocator that serves several object shapes at once, each behind an
/// opaque numeric class ID.
///
/// Types are classified by footprint ([`CellShape`]): two types with the same
/// normalized size share a pool when their alignments are compatible, so a
/// handful of IDs typically covers a whole family of node types. Each class
/// bump-allocates from its own slabs and recycles freed cells through a LIFO
/// free list.
///
/// This is the raw, single-owner flavor with `&mut self` operations; see
/// [`LocalShapeDriver`][crate::LocalShapeDriver] for the cloneable handle
/// used by shared callers.
///
/// # Contract
///
/// The driver deals in raw cells. It runs no destructors: every value placed
/// in a cell must be destroyed by its owner before the driver is dropped.
/// Dropping the driver releases all slab memory using the layout recorded at
/// classification time.
///
/// # Example
///
/// ```rust
/// use shape_pool::RawShapeDriver;
///
/// let mut driver = RawShapeDriver::new();
///
/// let id = driver.class_of::<u64>();
/// let cell = driver.allocate(id);
///
/// // SAFETY: The cell is valid for writes of u64.
/// unsafe { cell.cast::<u64>().write(42) };
///
/// // SAFETY: The cell came from allocate() with this id; u64 needs no drop.
/// unsafe { driver.deallocate(cell, id) };
/// ```
///
/// # Thread Safety
///
/// Thread-mobile but not thread-safe; all operations mutate shared slab and
/// free-list state without synchronization.
#[derive(Debug)]
pub struct RawShapeDriver {
    /// Classification table: one footprint per issued class ID. Scanned
    /// linearly; the expected class count is tiny (single digits), so a
    /// lookup structure would cost more than it saves.
    shapes: Vec<CellShape>,

    /// One pool per class ID, index-aligned with `shapes`.
    pools: Vec<ClassPool>,

    /// Cells per freshly created slab.
    slab_capacity: NonZero<usize>,
}

impl RawShapeDriver {
    /// Creates a driver with the default configuration.
    ///
    /// The driver starts empty; classes and slabs are created on demand.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a builder for configuring and constructing a
    /// [`RawShapeDriver`].
    ///
    /// # Example
    ///
    /// ```rust
    /// use new_zealand::nz;
    /// use shape_pool::RawShapeDriver;
    ///
    /// let driver = RawShapeDriver::builder().slab_capacity(nz!(256)).build();
    /// assert_eq!(driver.num_classes(), 0);
    /// ```
    #[must_use]
    pub fn builder() -> ShapeDriverBuilder {
        ShapeDriverBuilder::new()
    }

    /// Creates a new [`RawShapeDriver`] with the specified configuration.
    ///
    /// This method is used internally by the builder.
    #[must_use]
    pub(crate) fn new_inner(slab_capacity: NonZero<usize>) -> Self {
        Self {
            shapes: Vec::new(),
            pools: Vec::new(),
            slab_capacity,
        }
    }

    /// Returns the class ID that allocations for `T` should use.
    ///
    /// Classification is by footprint: among existing classes whose
    /// normalized size equals `T`'s and whose alignment satisfies `T`'s, the
    /// one with the smallest alignment wins, so a type never lands in a pool
    /// that is over-aligned further than necessary. If no class fits, a new
    /// one is created with empty pool state.
    ///
    /// Takes time linear in the number of classes issued so far.
    ///
    /// # Example
    ///
    /// ```rust
    /// use shape_pool::RawShapeDriver;
    ///
    /// let mut driver = RawShapeDriver::new();
    ///
    /// // Same footprint, same class.
    /// assert_eq!(driver.class_of::<u64>(), driver.class_of::<i64>());
    /// assert_eq!(driver.num_classes(), 1);
    /// ```
    pub fn class_of<T>(&mut self) -> ClassId {
        self.class_of_shape(CellShape::of::<T>())
    }

    /// Returns the class ID for an explicit footprint.
    ///
    /// This is the non-generic core of [`class_of`](Self::class_of).
    pub fn class_of_shape(&mut self, shape: CellShape) -> ClassId {
        let mut best: Option<(usize, usize)> = None;

        for (index, existing) in self.shapes.iter().enumerate() {
            if existing.size() != shape.size() || existing.align() < shape.align() {
                continue;
            }

            if best.is_none_or(|(align, _)| existing.align() < align) {
                best = Some((existing.align(), index));
            }
        }

        if let Some((_, index)) = best {
            return ClassId(index);
        }

        self.shapes.push(shape);
        self.pools.push(ClassPool::default());

        ClassId(self.shapes.len() - 1)
    }

    /// Allocates one uninitialized cell of the class's shape.
    ///
    /// The cell comes from the free list if one is available, otherwise from
    /// the newest slab, otherwise from a freshly created slab of the
    /// configured capacity. The returned pointer satisfies the class's
    /// alignment.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this driver. Allocation failure
    /// raises the standard out of memory signal.
    pub fn allocate(&mut self, id: ClassId) -> NonNull<u8> {
        let shape = self.shapes[id.index()];
        let slab_capacity = self.slab_capacity;
        let pool = &mut self.pools[id.index()];

        if let Some(cell) = pool.pop_free() {
            return cell;
        }

        if pool.headroom() == 0 {
            pool.slabs.push(Slab::new(shape.layout(), slab_capacity));
            pool.bump_index = 0;
        }

        let slab = pool
            .slabs
            .last()
            .expect("a slab was pushed above if none had room");

        let cell = slab.cell(pool.bump_index);

        // Cannot overflow because bump_index is bounded by the slab capacity.
        pool.bump_index = pool.bump_index.wrapping_add(1);

        cell
    }

    /// Returns a cell to its class's free list.
    ///
    /// The first word of the cell is overwritten with the free-list link;
    /// the caller must not touch the cell again until it is re-issued. This
    /// operation never fails and never contacts the system allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by [`allocate`](Self::allocate) on this
    /// driver with the same `id`, any value in the cell must already be
    /// destroyed, and the cell must not be accessed after this call.
    pub unsafe fn deallocate(&mut self, ptr: NonNull<u8>, id: ClassId) {
        let pool = &mut self.pools[id.index()];

        debug_assert!(
            pool.slabs.iter().any(|slab| slab.contains(ptr)),
            "deallocated cell does not belong to any slab of class {id:?}"
        );

        pool.push_free(ptr);
    }

    /// Guarantees that the next `count` allocations for `id` will not create
    /// a slab.
    ///
    /// If the newest slab already has more than `count` unissued cells, this
    /// does nothing. Otherwise the remaining tail of the newest slab is
    /// pushed onto the free list - in reverse, so the lowest address ends up
    /// at the front and later allocations keep ascending address order - and
    /// a single slab sized for the shortfall is created.
    ///
    /// Best performance comes from reserving before the first allocation of
    /// a class, where the whole request is one exactly-sized slab.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this driver.
    pub fn reserve(&mut self, id: ClassId, count: usize) {
        if count == 0 {
            return;
        }

        let shape = self.shapes[id.index()];
        let pool = &mut self.pools[id.index()];

        let headroom = pool.headroom();
        if headroom > count {
            return;
        }

        let shortfall = count - headroom;

        if headroom != 0 {
            let slab = pool
                .slabs
                .pop()
                .expect("headroom is non-zero, so a newest slab exists");

            for index in (pool.bump_index..slab.capacity().get()).rev() {
                pool.push_free(slab.cell(index));
            }

            pool.bump_index = slab.capacity().get();
            pool.slabs.push(slab);
        }

        if shortfall != 0 {
            let capacity =
                NonZero::new(shortfall).expect("shortfall was checked to be non-zero above");

            pool.slabs.push(Slab::new(shape.layout(), capacity));
            pool.bump_index = 0;
        }
    }

    /// Returns the number of classes issued so far.
    #[must_use]
    #[cfg_attr(test, mutants::skip)] // Trivial accessor; mutation only breaks diagnostics.
    pub fn num_classes(&self) -> usize {
        self.shapes.len()
    }

    /// Returns the footprint recorded for a class.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this driver.
    #[must_use]
    pub fn shape_of(&self, id: ClassId) -> CellShape {
        self.shapes[id.index()]
    }

    /// Returns the number of slabs a class has created.
    ///
    /// Slabs are the only point where the driver contacts the system
    /// allocator, so a stable slab count across a sequence of operations
    /// proves no system allocation happened.
    #[must_use]
    pub fn slab_count(&self, id: ClassId) -> usize {
        self.pools[id.index()].slabs.len()
    }

    /// Returns the number of cells currently on a class's free list.
    ///
    /// Walks the list; intended for tests and diagnostics.
    #[must_use]
    pub fn free_cells(&self, id: ClassId) -> usize {
        let mut length = 0;
        let mut cursor = self.pools[id.index()].free_head;

        while let Some(cell) = cursor {
            length += 1;

            // SAFETY: Free-list cells store the next link in their first
            // word; the list is only ever threaded through owned cells.
            cursor = NonNull::new(unsafe { cell.cast::<*mut u8>().read() });
        }

        length
    }
}

impl Default for RawShapeDriver {
    fn default() -> Self {
        Self::new()
    }
}

// SAFETY: The driver owns its slabs and free-list pointers exclusively and
// stores no values of its own - cells are raw storage whose contents are
// owned and destroyed by callers.
unsafe impl Send for RawShapeDriver {}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use new_zealand::nz;

    use super::*;

    #[test]
    fn same_footprint_shares_a_class() {
        let mut driver = RawShapeDriver::new();

        let id_u64 = driver.class_of::<u64>();
        let id_i64 = driver.class_of::<i64>();
        let id_f64 = driver.class_of::<f64>();

        assert_eq!(id_u64, id_i64);
        assert_eq!(id_u64, id_f64);
        assert_eq!(driver.num_classes(), 1);
    }

    #[test]
    fn lower_alignment_reuses_a_compatible_class() {
        let mut driver = RawShapeDriver::new();

        // 8 bytes, 8-aligned.
        let id_strict = driver.class_of::<u64>();
        // 8 bytes, 4-aligned: the existing 8-aligned class satisfies it.
        let id_loose = driver.class_of::<[u32; 2]>();

        assert_eq!(id_strict, id_loose);
        assert_eq!(driver.num_classes(), 1);
    }

    #[test]
    fn higher_alignment_gets_its_own_class() {
        let mut driver = RawShapeDriver::new();

        // 8 bytes, 4-aligned first.
        let id_loose = driver.class_of::<[u32; 2]>();
        // 8 bytes, 8-aligned cannot live in a 4-aligned pool.
        let id_strict = driver.class_of::<u64>();

        assert_ne!(id_loose, id_strict);
        assert_eq!(driver.num_classes(), 2);

        // A 2-aligned request now has two candidates and must pick the
        // tightest fit, the 4-aligned class.
        let id_tight = driver.class_of::<[u16; 4]>();
        assert_eq!(id_tight, id_loose);
    }

    #[test]
    fn allocations_satisfy_class_alignment() {
        #[repr(align(16))]
        #[allow(dead_code, reason = "only the layout matters")]
        struct Aligned([u8; 16]);

        let mut driver = RawShapeDriver::new();
        let id = driver.class_of::<Aligned>();

        for _ in 0..100 {
            let cell = driver.allocate(id);
            assert_eq!(cell.addr().get() % 16, 0);
        }
    }

    #[test]
    fn free_list_round_trip_is_lifo_and_allocation_free() {
        let mut driver = RawShapeDriver::builder().slab_capacity(nz!(16)).build();
        let id = driver.class_of::<u64>();

        let cells: Vec<_> = (0..16).map(|_| driver.allocate(id)).collect();
        assert_eq!(driver.slab_count(id), 1);

        for &cell in cells.iter().rev() {
            unsafe { driver.deallocate(cell, id) };
        }
        assert_eq!(driver.free_cells(id), 16);

        // Deallocated in reverse, so re-allocation returns original order.
        for &expected in &cells {
            assert_eq!(driver.allocate(id), expected);
        }
        assert_eq!(driver.slab_count(id), 1);
    }

    #[test]
    fn scrambled_deallocation_order_still_reuses_every_cell() {
        let mut driver = RawShapeDriver::builder().slab_capacity(nz!(8)).build();
        let id = driver.class_of::<u64>();

        let cells: Vec<_> = (0..8).map(|_| driver.allocate(id)).collect();

        for &index in &[5_usize, 2, 7, 0, 3, 6, 1, 4] {
            unsafe { driver.deallocate(cells[index], id) };
        }

        let mut reused: Vec<_> = (0..8).map(|_| driver.allocate(id)).collect();
        assert_eq!(driver.slab_count(id), 1);

        let mut expected = cells;
        expected.sort();
        reused.sort();
        assert_eq!(expected, reused);
    }

    #[test]
    fn exhausting_a_slab_grows_a_new_one() {
        let mut driver = RawShapeDriver::builder().slab_capacity(nz!(3)).build();
        let id = driver.class_of::<u64>();

        for _ in 0..3 {
            _ = driver.allocate(id);
        }
        assert_eq!(driver.slab_count(id), 1);

        _ = driver.allocate(id);
        assert_eq!(driver.slab_count(id), 2);
    }

    #[test]
    fn reserve_on_a_fresh_class_creates_one_exact_slab() {
        let mut driver = RawShapeDriver::builder().slab_capacity(nz!(1024)).build();
        let id = driver.class_of::<u64>();

        driver.reserve(id, 2000);
        assert_eq!(driver.slab_count(id), 1);

        for _ in 0..2000 {
            _ = driver.allocate(id);
        }
        assert_eq!(driver.slab_count(id), 1, "reserve must cover 2000 cells");

        // The next allocation is past the reservation and may grow.
        _ = driver.allocate(id);
        assert_eq!(driver.slab_count(id), 2);
    }

    #[test]
    fn reserve_with_sufficient_headroom_is_a_no_op() {
        let mut driver = RawShapeDriver::builder().slab_capacity(nz!(64)).build();
        let id = driver.class_of::<u64>();

        _ = driver.allocate(id);
        assert_eq!(driver.slab_count(id), 1);

        driver.reserve(id, 10);
        assert_eq!(driver.slab_count(id), 1);
        assert_eq!(driver.free_cells(id), 0);
    }

    #[test]
    fn reserve_pushes_the_slab_tail_in_ascending_address_order() {
        let mut driver = RawShapeDriver::builder().slab_capacity(nz!(4)).build();
        let id = driver.class_of::<u64>();

        let first = driver.allocate(id);

        // Headroom is 3, so this spills the tail onto the free list and
        // creates a slab for the shortfall.
        driver.reserve(id, 10);
        assert_eq!(driver.slab_count(id), 2);
        assert_eq!(driver.free_cells(id), 3);

        // The tail cells come back lowest-address-first, continuing the
        // original allocation order.
        let shape = driver.shape_of(id);
        let mut previous = first;
        for _ in 0..3 {
            let cell = driver.allocate(id);
            assert_eq!(cell.addr().get() - previous.addr().get(), shape.size());
            previous = cell;
        }

        // Ten reserved cells total: 3 recycled + 7 in the new slab.
        for _ in 0..7 {
            _ = driver.allocate(id);
        }
        assert_eq!(driver.slab_count(id), 2);
    }

    #[test]
    fn classes_allocate_independently() {
        let mut driver = RawShapeDriver::builder().slab_capacity(nz!(4)).build();

        let id_small = driver.class_of::<u64>();
        let id_large = driver.class_of::<[u64; 4]>();
        assert_ne!(id_small, id_large);

        let small = driver.allocate(id_small);
        let large = driver.allocate(id_large);

        assert_eq!(driver.slab_count(id_small), 1);
        assert_eq!(driver.slab_count(id_large), 1);

        unsafe {
            driver.deallocate(small, id_small);
            driver.deallocate(large, id_large);
        }

        assert_eq!(driver.free_cells(id_small), 1);
        assert_eq!(driver.free_cells(id_large), 1);
    }

    #[test]
    fn thread_mobility() {
        use static_assertions::{assert_impl_all, assert_not_impl_any};

        assert_impl_all!(RawShapeDriver: Send);
        assert_not_impl_any!(RawShapeDriver: Sync);
    }
}
