use std::fmt;
use std::hash::{Hash, Hasher};
use std::mem::{ManuallyDrop, MaybeUninit};
use std::ops::Deref;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicU64, Ordering};

use shape_pool::{CellShape, ClassId, LocalShapeDriver};

use crate::cell::{CellHeader, RefcCell};

/// A reference-counted handle to a value whose control block and payload
/// live together in one driver-allocated cell.
///
/// `Refc<T>` plays the role `std::rc::Rc` plays elsewhere, but its cells come
/// from a [`shape_pool`] driver: creation is a free-list pop in the steady
/// state, and the last drop returns the cell to the free list instead of the
/// system allocator. Handles are normally created through a factory generated
/// by [`refc_factory!`][crate::refc_factory], or bound to a
/// [`Singleton`][crate::Singleton] living in static storage.
///
/// Besides live handles, a `Refc` can hold three inert states: **null**, and
/// the two reserved map keys (**empty** and **tombstone**) used by hash-table
/// adapters. Inert handles compare and hash consistently but cannot be
/// dereferenced; [`is_live()`](Self::is_live) reports `false` for all three.
///
/// # Example
///
/// ```rust
/// use refc::{Refc, refc_factory};
///
/// refc_factory! {
///     /// Creates the cells used in this example.
///     struct Factory(u64);
/// }
///
/// let factory = Factory::new();
///
/// let first: Refc<u64> = factory.create(42_u64);
/// let second = first.clone();
///
/// assert_eq!(*first, 42);
/// assert!(first == second);
/// assert_eq!(first.use_count(), Some(2));
///
/// drop(first);
/// assert_eq!(*second, 42);
/// ```
///
/// # Thread Safety
///
/// Handles are neither [`Send`] nor [`Sync`]. The counter is atomic only to
/// keep the drop path lock-free; the driver underneath performs no
/// synchronization, so moving handles across threads is not supported.
pub struct Refc<T: ?Sized> {
    repr: Repr<T>,
}

/// The four states a handle can be in. Reserved pointer values from the
/// original design become explicit variants here, so no forged addresses
/// ever exist.
enum Repr<T: ?Sized> {
    /// No target.
    Null,

    /// Reserved "empty slot" key for hash-table adapters. Never a real cell.
    EmptyKey,

    /// Reserved "deleted slot" key for hash-table adapters. Never a real
    /// cell.
    Tombstone,

    /// A handle participating in the reference count of a live cell.
    Live {
        /// The control block at the start of the cell.
        header: NonNull<CellHeader>,

        /// The payload within the cell. Possibly a fat pointer: trait-object
        /// views of a cell keep the same address with different metadata.
        payload: NonNull<T>,
    },
}

impl<T: ?Sized> Clone for Repr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for Repr<T> {}

impl<T> Refc<T> {
    /// Creates a `T` in a cell allocated from `driver` under `id` and
    /// returns the handle owning it.
    ///
    /// This is the primitive that factory `create` methods are built on;
    /// calling it directly requires an `id` obtained by classifying
    /// [`RefcCell<T>`] with the same driver.
    ///
    /// # Panics
    ///
    /// Panics if the class's footprint does not fit `RefcCell<T>`.
    #[must_use]
    pub fn new_in(driver: &LocalShapeDriver, id: ClassId, value: T) -> Self {
        // SAFETY: The closure fully initializes the payload.
        unsafe {
            Self::new_in_with(driver, id, |payload| {
                payload.write(value);
            })
        }
    }

    /// In-place flavor of [`new_in`](Self::new_in): the payload is
    /// initialized by the closure directly inside the cell.
    ///
    /// If the closure panics, the cell is pushed back onto the free list
    /// before the panic continues; no half-created handle ever exists and
    /// the counter is never observed by anyone.
    ///
    /// # Panics
    ///
    /// Panics if the class's footprint does not fit `RefcCell<T>`.
    ///
    /// # Safety
    ///
    /// `init` must fully initialize the payload before returning.
    #[must_use]
    pub unsafe fn new_in_with(
        driver: &LocalShapeDriver,
        id: ClassId,
        init: impl FnOnce(&mut MaybeUninit<T>),
    ) -> Self {
        let shape = driver.shape_of(id);
        let cell_shape = CellShape::of::<RefcCell<T>>();

        assert!(
            shape.size() == cell_shape.size() && shape.align() >= cell_shape.align(),
            "class {id:?} with footprint {shape:?} cannot hold cells of footprint {cell_shape:?}"
        );

        let raw = driver.allocate(id);
        let cell = raw.cast::<RefcCell<T>>();

        let guard = ReturnCellOnDrop { driver, id, raw };

        // SAFETY: In-bounds field projection of the cell just allocated; no
        // reference is created and nothing is read.
        let payload_ptr = unsafe { &raw mut (*cell.as_ptr()).payload };

        // SAFETY: `&mut MaybeUninit<T>` places no validity requirement on
        // the uninitialized bytes, and the cell is exclusively ours until
        // the handle is returned.
        init(unsafe { &mut *payload_ptr });

        let payload = NonNull::new(payload_ptr)
            .expect("field projection of a non-null cell cannot be null")
            .cast::<T>();

        std::mem::forget(guard);

        // SAFETY: The cell starts with its control block (offset zero) and
        // the storage is uninitialized, so a plain write is correct.
        unsafe {
            cell.cast::<CellHeader>().write(CellHeader {
                count: AtomicU64::new(1),
                class_id: Some(id),
                driver: Some(driver.clone()),
            });
        }

        Self {
            repr: Repr::Live {
                header: cell.cast(),
                payload,
            },
        }
    }

    /// Recovers a handle from a raw pointer to a payload, by stepping back
    /// over the control block and incrementing the counter.
    ///
    /// # Safety
    ///
    /// `payload` must point at a live payload that was created through a
    /// factory (or [`new_in`](Self::new_in)) as a `RefcCell<T>` - never at a
    /// plain `T` constructed elsewhere - and at least one handle to the cell
    /// must still exist.
    #[must_use]
    pub unsafe fn from_payload(payload: NonNull<T>) -> Self {
        // SAFETY: The caller guarantees the payload sits inside a cell, so
        // the control block lives exactly PAYLOAD_OFFSET bytes below it.
        let header = unsafe {
            payload
                .cast::<u8>()
                .byte_sub(RefcCell::<T>::PAYLOAD_OFFSET)
                .cast::<CellHeader>()
        };

        // SAFETY: The caller guarantees the cell is live.
        unsafe { header.as_ref() }
            .count
            .fetch_add(1, Ordering::Relaxed);

        Self {
            repr: Repr::Live { header, payload },
        }
    }
}

impl<T: ?Sized> Refc<T> {
    /// The handle with no target.
    #[must_use]
    pub const fn null() -> Self {
        Self { repr: Repr::Null }
    }

    /// The reserved "empty slot" key for hash-table adapters.
    ///
    /// Compares equal only to itself, hashes to a reserved value, reports
    /// [`is_live()`](Self::is_live) `false` and must never be dereferenced.
    #[must_use]
    pub const fn empty_key() -> Self {
        Self {
            repr: Repr::EmptyKey,
        }
    }

    /// The reserved "deleted slot" key for hash-table adapters.
    ///
    /// Same rules as [`empty_key()`](Self::empty_key).
    #[must_use]
    pub const fn tombstone_key() -> Self {
        Self {
            repr: Repr::Tombstone,
        }
    }

    /// Whether this handle is in the null state.
    ///
    /// The sentinel keys are *not* null; the three inert states are
    /// distinct.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self.repr, Repr::Null)
    }

    /// Whether this handle refers to a live cell - neither null nor one of
    /// the reserved sentinel keys.
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self.repr, Repr::Live { .. })
    }

    /// Returns a reference to the payload.
    ///
    /// # Panics
    ///
    /// Panics if the handle is null or a sentinel key.
    #[must_use]
    pub fn get(&self) -> &T {
        match &self.repr {
            // SAFETY: Live handles hold a positive count on the cell, so the
            // payload is initialized and outlives this borrow.
            Repr::Live { payload, .. } => unsafe { payload.as_ref() },
            _ => panic!("cannot dereference a refc with no live target"),
        }
    }

    /// Returns a pointer to the payload.
    ///
    /// # Panics
    ///
    /// Panics if the handle is null or a sentinel key.
    #[must_use]
    pub fn ptr(&self) -> NonNull<T> {
        match self.repr {
            Repr::Live { payload, .. } => payload,
            _ => panic!("cannot take the payload pointer of a refc with no live target"),
        }
    }

    /// Returns the number of handles currently sharing the cell, or `None`
    /// for null and sentinel handles.
    ///
    /// For cells bound to a singleton, the static storage itself counts as
    /// one handle.
    #[must_use]
    pub fn use_count(&self) -> Option<u64> {
        match self.repr {
            // SAFETY: Live handles keep the cell alive.
            Repr::Live { header, .. } => {
                Some(unsafe { header.as_ref() }.count.load(Ordering::Relaxed))
            }
            _ => None,
        }
    }

    /// Builds a live handle from its parts without touching the counter.
    pub(crate) fn from_parts(header: NonNull<CellHeader>, payload: NonNull<T>) -> Self {
        Self {
            repr: Repr::Live { header, payload },
        }
    }

    /// Re-views the payload through a casting callback, typically as a trait
    /// object. Consumes the handle; the counter is not touched because the
    /// returned handle replaces this one.
    ///
    /// This method is only intended for use by the
    /// [`define_refc_cast!`][crate::define_refc_cast] macro.
    ///
    /// # Safety
    ///
    /// The callback must return a reference to the very object it receives;
    /// only identity-preserving conversions (such as unsizing coercions) are
    /// valid. A conversion that shifts the address would desynchronize the
    /// payload from its control block.
    #[must_use]
    #[doc(hidden)]
    pub unsafe fn __private_cast_with_fn<U: ?Sized, F>(self, cast_fn: F) -> Refc<U>
    where
        F: FnOnce(&T) -> &U,
    {
        let this = ManuallyDrop::new(self);

        let repr = match this.repr {
            Repr::Null => Repr::Null,
            Repr::EmptyKey => Repr::EmptyKey,
            Repr::Tombstone => Repr::Tombstone,
            Repr::Live { header, payload } => {
                // SAFETY: Live payloads are valid for shared reads.
                let cast: &U = cast_fn(unsafe { payload.as_ref() });
                let cast = NonNull::from(cast);

                debug_assert!(
                    ptr::addr_eq(cast.as_ptr(), payload.as_ptr()),
                    "cast must preserve the payload address"
                );

                Repr::Live {
                    header,
                    payload: cast,
                }
            }
        };

        Refc { repr }
    }

    /// The identity value equality and hashing are based on: the cell
    /// address for live handles, reserved values for the inert states.
    fn identity(&self) -> usize {
        match self.repr {
            Repr::Null => 0,
            Repr::EmptyKey => usize::MAX,
            Repr::Tombstone => usize::MAX - 1,
            Repr::Live { header, .. } => header.as_ptr().addr(),
        }
    }
}

impl<T: ?Sized> Clone for Refc<T> {
    /// Creates another handle to the same cell.
    ///
    /// Live handles increment the reference count. Null and sentinel handles
    /// clone to themselves without touching any memory.
    fn clone(&self) -> Self {
        if let Repr::Live { header, .. } = self.repr {
            // SAFETY: Live handles keep the cell alive.
            unsafe { header.as_ref() }
                .count
                .fetch_add(1, Ordering::Relaxed);
        }

        Self { repr: self.repr }
    }
}

impl<T: ?Sized> Drop for Refc<T> {
    /// Decrements the reference count; the handle observing the count reach
    /// zero destroys the payload in place and returns the cell to the
    /// driver's free list.
    ///
    /// Cells with no attached driver belong to a [`Singleton`][crate::Singleton]
    /// whose storage (and payload destruction) is the singleton's own
    /// business, so the last view of one does nothing further.
    fn drop(&mut self) {
        let Repr::Live { header, payload } = self.repr else {
            return;
        };

        // SAFETY: Live handles keep the cell alive until this decrement.
        let previous = unsafe { header.as_ref() }
            .count
            .fetch_sub(1, Ordering::Relaxed);

        if previous != 1 {
            return;
        }

        // This was the last handle; nobody else can observe the cell now.

        // SAFETY: Exclusive access per the count reaching zero. The driver
        // handle is moved out so it survives the cell's recycling below.
        let driver = unsafe { (*header.as_ptr()).driver.take() };

        let Some(driver) = driver else {
            // Singleton cell: storage and payload belong to the caller.
            return;
        };

        // SAFETY: Exclusive access, as above.
        let class_id = unsafe { (*header.as_ptr()).class_id }
            .expect("driver-allocated cells always record their class");

        // The guard returns the cell even if the payload destructor panics.
        let _return_cell = ReturnCellOnDrop {
            driver: &driver,
            id: class_id,
            raw: header.cast(),
        };

        // SAFETY: The payload was initialized at creation and this handle
        // holds the only remaining access to it.
        unsafe { ptr::drop_in_place(payload.as_ptr()) };
    }
}

impl<T: ?Sized> Default for Refc<T> {
    /// The null handle.
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized> Deref for Refc<T> {
    type Target = T;

    /// # Panics
    ///
    /// Panics if the handle is null or a sentinel key.
    fn deref(&self) -> &T {
        self.get()
    }
}

impl<T: ?Sized, U: ?Sized> PartialEq<Refc<U>> for Refc<T> {
    /// Cell identity: two handles are equal when they refer to the same
    /// cell, regardless of the payload type they view it through. Null
    /// equals only null; each sentinel equals only itself.
    fn eq(&self, other: &Refc<U>) -> bool {
        match (&self.repr, &other.repr) {
            (Repr::Live { header: a, .. }, Repr::Live { header: b, .. }) => a == b,
            (Repr::Null, Repr::Null) => true,
            (Repr::EmptyKey, Repr::EmptyKey) => true,
            (Repr::Tombstone, Repr::Tombstone) => true,
            _ => false,
        }
    }
}

impl<T: ?Sized> Eq for Refc<T> {}

impl<T> PartialEq<*const T> for Refc<T> {
    /// Compares the payload address with a raw pointer. Null and sentinel
    /// handles equal no pointer.
    fn eq(&self, other: &*const T) -> bool {
        match self.repr {
            Repr::Live { payload, .. } => ptr::eq(payload.as_ptr(), *other),
            _ => false,
        }
    }
}

impl<T: ?Sized> Hash for Refc<T> {
    /// Hashes the cell identity; the fingerprint mix is the hasher's job.
    /// The inert states hash as distinct reserved values.
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.identity());
    }
}

impl<T: ?Sized> fmt::Debug for Refc<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repr {
            Repr::Null => f.write_str("Refc(null)"),
            Repr::EmptyKey => f.write_str("Refc(empty key)"),
            Repr::Tombstone => f.write_str("Refc(tombstone key)"),
            Repr::Live { header, .. } => f.debug_tuple("Refc").field(&header).finish(),
        }
    }
}

/// Returns a cell to the free list when dropped.
///
/// Two duties: rolling back a freshly allocated cell whose payload
/// initializer panics, and recycling a fully dropped cell even if its
/// payload destructor panics. In both cases the cell holds no initialized
/// value by the time this runs.
struct ReturnCellOnDrop<'a> {
    driver: &'a LocalShapeDriver,
    id: ClassId,
    raw: NonNull<u8>,
}

impl Drop for ReturnCellOnDrop<'_> {
    fn drop(&mut self) {
        // SAFETY: The cell was allocated under this id and no longer holds
        // an initialized value.
        unsafe { self.driver.deallocate(self.raw, self.id) };
    }
}

/// Opt-in mixin for payload types that want to recover their own handle,
/// in the manner of `enable_shared_from_this`.
///
/// ```rust
/// use refc::{RefcFromSelf, refc_factory};
///
/// struct Node {
///     value: u32,
/// }
///
/// impl RefcFromSelf for Node {}
///
/// refc_factory! {
///     /// Creates the nodes used in this example.
///     struct Nodes(Node);
/// }
///
/// let factory = Nodes::new();
/// let node = factory.create(Node { value: 7 });
///
/// // SAFETY: The node was created through the factory above.
/// let recovered = unsafe { node.refc_from_self() };
///
/// assert!(recovered == node);
/// assert_eq!(node.use_count(), Some(2));
/// ```
pub trait RefcFromSelf: Sized {
    /// Rebuilds the owning handle from `&self` and increments the counter.
    ///
    /// # Safety
    ///
    /// `self` must live inside a factory-created cell; calling this on a
    /// value constructed any other way is undefined behavior. Creation paths
    /// cannot be restricted statically in this design, so the factory-origin
    /// requirement is the caller's contract.
    #[must_use]
    unsafe fn refc_from_self(&self) -> Refc<Self> {
        // SAFETY: Forwarding the factory-origin guarantee to from_payload;
        // &self itself proves at least one handle is live.
        unsafe { Refc::from_payload(NonNull::from(self)) }
    }
}

/// Defines an extension trait that upcasts `Refc<T>` handles to a
/// trait-object view of the same cell.
///
/// The conversion is an unsizing coercion: the payload address is unchanged,
/// the returned handle shares the reference count with the original's other
/// copies, and the two compare equal. This is the only polymorphic
/// conversion offered; anything that would shift the payload address has no
/// place in a design where the control block is found by fixed offset.
///
/// ```rust
/// use refc::{Refc, define_refc_cast, refc_factory};
///
/// trait Greeter {
///     fn greet(&self) -> String;
/// }
///
/// struct English;
///
/// impl Greeter for English {
///     fn greet(&self) -> String {
///         "hello".to_string()
///     }
/// }
///
/// define_refc_cast! {
///     /// Upcasts to the greeter view.
///     pub trait CastGreeter: fn cast_greeter -> Greeter;
/// }
///
/// refc_factory! {
///     /// Creates the greeters used in this example.
///     struct Greeters(English);
/// }
///
/// let factory = Greeters::new();
/// let english = factory.create(English);
///
/// let greeter: Refc<dyn Greeter> = english.clone().cast_greeter();
///
/// assert_eq!(greeter.greet(), "hello");
/// assert!(greeter == english);
/// ```
#[macro_export]
macro_rules! define_refc_cast {
    (
        $(#[$attr:meta])*
        $vis:vis trait $ext:ident : fn $method:ident -> $target:path;
    ) => {
        $(#[$attr])*
        $vis trait $ext {
            /// Upcasts this handle to the trait-object view of the same
            /// cell.
            fn $method(self) -> $crate::Refc<dyn $target>;
        }

        impl<T: $target + 'static> $ext for $crate::Refc<T> {
            fn $method(self) -> $crate::Refc<dyn $target> {
                // SAFETY: An unsizing coercion returns the object it was
                // given; the payload address is preserved.
                unsafe { self.__private_cast_with_fn(|payload| payload as &dyn $target) }
            }
        }
    };
}

#[cfg(test)]
#[allow(
    clippy::undocumented_unsafe_blocks,
    reason = "test code doesn't need the same safety rigor as production code"
)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    crate::refc_factory! {
        /// Factory over the unit-test payload types.
        struct TestFactory(u64, DropTracker);
    }

    /// Test helper that records when it is dropped.
    struct DropTracker {
        dropped: Rc<Cell<u32>>,
    }

    impl Drop for DropTracker {
        fn drop(&mut self) {
            self.dropped.set(self.dropped.get() + 1);
        }
    }

    #[test]
    fn create_and_deref() {
        let factory = TestFactory::new();

        let value = factory.create(42_u64);

        assert!(value.is_live());
        assert!(!value.is_null());
        assert_eq!(*value, 42);
        assert_eq!(value.use_count(), Some(1));
    }

    #[test]
    fn clone_counts_and_drop_counts() {
        let factory = TestFactory::new();

        let first = factory.create(7_u64);
        let second = first.clone();
        let third = second.clone();

        assert_eq!(first.use_count(), Some(3));
        assert!(first == second && second == third);

        drop(second);
        assert_eq!(first.use_count(), Some(2));

        drop(third);
        assert_eq!(first.use_count(), Some(1));
    }

    #[test]
    fn payload_destructor_runs_exactly_once_and_cell_is_recycled() {
        let factory = TestFactory::new();
        let dropped = Rc::new(Cell::new(0));

        let id = factory.driver().class_of::<RefcCell<DropTracker>>();

        let handle = factory.create(DropTracker {
            dropped: Rc::clone(&dropped),
        });
        let copy = handle.clone();

        drop(handle);
        assert_eq!(dropped.get(), 0, "a live copy still exists");

        drop(copy);
        assert_eq!(dropped.get(), 1, "last drop destroys the payload");
        assert_eq!(
            factory.driver().free_cells(id),
            1,
            "the cell went back to the free list exactly once"
        );
    }

    #[test]
    fn dropped_cells_are_reused() {
        let factory = TestFactory::new();

        let first = factory.create(1_u64);
        let first_ptr = first.ptr();
        drop(first);

        // The freed cell is the next one issued for this shape.
        let second = factory.create(2_u64);
        assert_eq!(second.ptr(), first_ptr);
        assert_eq!(*second, 2);
    }

    #[test]
    fn null_and_sentinels_are_inert_and_distinct() {
        let null = Refc::<u64>::null();
        let empty = Refc::<u64>::empty_key();
        let tombstone = Refc::<u64>::tombstone_key();

        assert!(!null.is_live());
        assert!(!empty.is_live());
        assert!(!tombstone.is_live());

        assert!(null.is_null());
        assert!(!empty.is_null());
        assert!(!tombstone.is_null());

        assert!(null == Refc::<u64>::null());
        assert!(empty == Refc::<u64>::empty_key());
        assert!(tombstone == Refc::<u64>::tombstone_key());

        assert!(null != empty);
        assert!(null != tombstone);
        assert!(empty != tombstone);

        // Cloning inert handles touches no memory and yields the same state.
        assert!(empty.clone() == empty);
        assert!(null.clone() == null);

        assert_eq!(null.use_count(), None);
    }

    #[test]
    fn sentinels_never_equal_live_handles() {
        let factory = TestFactory::new();
        let live = factory.create(3_u64);

        assert!(live != Refc::<u64>::null());
        assert!(live != Refc::<u64>::empty_key());
        assert!(live != Refc::<u64>::tombstone_key());
    }

    #[test]
    fn equality_with_raw_payload_pointer() {
        let factory = TestFactory::new();
        let handle = factory.create(9_u64);

        let payload: *const u64 = handle.ptr().as_ptr();
        assert!(handle == payload);

        let elsewhere = 9_u64;
        assert!(handle != std::ptr::from_ref(&elsewhere));
        assert!(Refc::<u64>::null() != payload);
    }

    #[test]
    fn create_with_initializes_in_place() {
        let factory = TestFactory::new();

        // SAFETY: The closure fully initializes the payload.
        let handle = unsafe {
            factory.create_with::<u64>(|payload| {
                payload.write(1234);
            })
        };

        assert_eq!(*handle, 1234);
    }

    #[test]
    fn panicking_initializer_rolls_the_cell_back() {
        let factory = TestFactory::new();

        // Resolve the class and learn the cell address the pool will issue.
        let probe = factory.create(0_u64);
        let probe_ptr = probe.ptr();
        drop(probe);

        let id = factory.driver().class_of::<RefcCell<u64>>();
        assert_eq!(factory.driver().free_cells(id), 1);

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            // SAFETY: The closure never returns, so there is nothing to
            // initialize.
            _ = unsafe {
                factory.create_with::<u64>(|_| panic!("payload construction failed"))
            };
        }));
        assert!(outcome.is_err());

        // The cell went straight back to the free list and is issued again.
        assert_eq!(factory.driver().free_cells(id), 1);
        let reused = factory.create(5_u64);
        assert_eq!(reused.ptr(), probe_ptr);
    }

    #[test]
    #[should_panic]
    fn dereferencing_null_panics() {
        let null = Refc::<u64>::null();
        _ = *null;
    }

    #[test]
    #[should_panic]
    fn dereferencing_a_sentinel_panics() {
        let empty = Refc::<u64>::empty_key();
        _ = *empty;
    }

    #[test]
    fn handles_are_single_threaded() {
        use static_assertions::assert_not_impl_any;

        assert_not_impl_any!(Refc<u64>: Send, Sync);
    }
}
