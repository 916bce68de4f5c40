use std::marker::PhantomData;
use std::num::NonZero;

use crate::CellPool;
use crate::pool::DEFAULT_SLAB_CAPACITY;

/// Builder for creating an instance of [`CellPool`].
///
/// All settings are optional; `build()` can be called immediately for a pool
/// with the default slab capacity and free-list recycling enabled.
///
/// # Example
///
/// ```rust
/// use cell_pool::CellPool;
/// use new_zealand::nz;
///
/// let pool = CellPool::<u64>::builder()
///     .slab_capacity(nz!(256))
///     .first_slab_capacity(nz!(32))
///     .free_list(true)
///     .build();
/// ```
#[derive(Debug)]
#[must_use]
pub struct CellPoolBuilder<T> {
    first_slab_capacity: Option<NonZero<usize>>,
    slab_capacity: NonZero<usize>,
    recycle: bool,
    _items: PhantomData<T>,
}

impl<T> CellPoolBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            first_slab_capacity: None,
            slab_capacity: DEFAULT_SLAB_CAPACITY,
            recycle: true,
            _items: PhantomData,
        }
    }

    /// Sets the number of cells in every slab after the first.
    pub fn slab_capacity(mut self, capacity: NonZero<usize>) -> Self {
        self.slab_capacity = capacity;
        self
    }

    /// Sets the number of cells in the first slab the pool creates.
    ///
    /// Useful to right-size the pool when the caller knows roughly how many
    /// cells will be needed. Defaults to the steady-state slab capacity.
    pub fn first_slab_capacity(mut self, capacity: NonZero<usize>) -> Self {
        self.first_slab_capacity = Some(capacity);
        self
    }

    /// Enables or disables free-list recycling of deallocated cells.
    ///
    /// With recycling disabled, deallocating a cell abandons it until the
    /// pool itself is dropped. This suits workloads that never deallocate
    /// individual cells and want the cheapest possible deallocation path.
    pub fn free_list(mut self, enabled: bool) -> Self {
        self.recycle = enabled;
        self
    }

    /// Builds the pool with the specified configuration.
    ///
    /// # Panics
    ///
    /// Panics if `T` is zero-sized.
    #[must_use]
    pub fn build(self) -> CellPool<T> {
        CellPool::new_inner(
            self.first_slab_capacity.unwrap_or(self.slab_capacity),
            self.slab_capacity,
            self.recycle,
        )
    }
}
