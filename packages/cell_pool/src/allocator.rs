use std::ptr::NonNull;

use crate::CellPool;

/// The allocation contract node-based containers in this workspace are
/// parameterized over.
///
/// An allocator hands out uninitialized, properly aligned storage for `count`
/// instances of `T` and takes the same storage back. Construction and
/// destruction of values is the caller's business; the allocator only deals
/// in raw cells.
///
/// Implementations may serve single instances and arrays from entirely
/// different underlying sources (the pool types in this workspace serve
/// arrays from the system allocator), so a `(pointer, count)` pair must
/// always be returned with the count it was allocated with.
///
/// # Safety
///
/// Implementations must return pointers that are non-null, aligned for `T`,
/// valid for reads and writes of `count` instances, and live until passed to
/// [`deallocate`](Allocator::deallocate) on the same allocator (or, where the
/// implementation documents it, until the allocator itself is dropped).
pub unsafe trait Allocator<T> {
    /// Allocates uninitialized storage for `count` instances of `T`.
    ///
    /// # Panics
    ///
    /// Panics if `count` is zero. Allocation failure raises the standard
    /// out of memory signal.
    fn allocate(&mut self, count: usize) -> NonNull<T>;

    /// Returns storage previously obtained from this allocator.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by `allocate(count)` on this allocator
    /// with the same `count`, any values in the storage must already be
    /// destroyed, and the storage must not be accessed afterwards.
    unsafe fn deallocate(&mut self, ptr: NonNull<T>, count: usize);
}

// SAFETY: CellPool returns properly aligned cells from slabs it owns (or the
// system allocator for arrays) and keeps them alive until deallocated or the
// pool is dropped.
unsafe impl<T> Allocator<T> for CellPool<T> {
    fn allocate(&mut self, count: usize) -> NonNull<T> {
        CellPool::allocate(self, count)
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<T>, count: usize) {
        // SAFETY: Forwarding the trait contract to the inherent method.
        unsafe { CellPool::deallocate(self, ptr, count) };
    }
}
