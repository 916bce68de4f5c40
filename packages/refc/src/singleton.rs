use std::fmt;
use std::mem::MaybeUninit;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::Refc;
use crate::cell::{CellHeader, RefcCell};

/// A reference-countable cell living in caller-owned storage - typically a
/// `static` - instead of a driver's slab.
///
/// A singleton is a full cell (control block plus payload) with no driver
/// attached. [`Refc`] views bind to it and count references normally, but the
/// last view being dropped never destroys or deallocates anything: the
/// storage, and with it the payload's lifetime, belongs to the caller. The
/// singleton's own existence counts as one reference, which is what keeps
/// views from ever observing the count reach zero.
///
/// Singletons are neither clonable nor movable once viewed; their identity
/// is their address. The construction is `const`, so the intended home is a
/// `static`:
///
/// ```rust
/// use refc::Singleton;
///
/// static ANSWER: Singleton<i32> = Singleton::new(435_761);
///
/// let view = ANSWER.refc();
/// assert_eq!(*view, 435_761);
///
/// drop(view);
///
/// // The static storage remains valid; views can bind again at any time.
/// assert_eq!(*ANSWER.refc(), 435_761);
/// ```
pub struct Singleton<T> {
    cell: RefcCell<T>,
}

impl<T> Singleton<T> {
    /// Creates the cell with its payload in place and a reference count of
    /// one (the storage itself).
    #[must_use]
    pub const fn new(value: T) -> Self {
        Self {
            cell: RefcCell {
                header: CellHeader {
                    count: AtomicU64::new(1),
                    class_id: None,
                    driver: None,
                },
                payload: MaybeUninit::new(value),
            },
        }
    }

    /// Binds a counted view to this singleton.
    ///
    /// The `'static` requirement is what makes the view safe: storage with
    /// the program's lifetime can never be reclaimed while views exist.
    #[must_use]
    pub fn refc(&'static self) -> Refc<T> {
        self.cell.header.count.fetch_add(1, Ordering::Relaxed);

        let header = NonNull::from(&self.cell.header);
        let payload = NonNull::from(&self.cell.payload).cast::<T>();

        Refc::from_parts(header, payload)
    }
}

impl<T> Drop for Singleton<T> {
    /// Destroys the payload exactly once, when the storage itself goes away.
    ///
    /// Statics are never dropped in Rust, so for the intended usage this
    /// runs only in tests and other non-static arrangements - where it
    /// verifies that no views were left outstanding.
    fn drop(&mut self) {
        debug_assert_eq!(
            self.cell.header.count.load(Ordering::Relaxed),
            1,
            "singleton storage reclaimed while views still exist"
        );

        // SAFETY: new() initialized the payload and nothing else destroys
        // it: views never touch a cell that has no driver attached.
        unsafe { self.cell.payload.assume_init_drop() };
    }
}

impl<T: fmt::Debug> fmt::Debug for Singleton<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // SAFETY: The payload is initialized from construction to drop.
        let payload = unsafe { self.cell.payload.assume_init_ref() };

        f.debug_struct("Singleton").field("value", &payload).finish()
    }
}

// SAFETY: The counter is atomic, the driver slot is permanently empty (so
// views never mutate anything but the counter), and the payload is only ever
// exposed through shared references - the same access a `&T` grants.
unsafe impl<T: Sync> Sync for Singleton<T> {}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    static STATIC_VALUE: Singleton<i32> = Singleton::new(435_761);

    #[test]
    fn static_singleton_round_trip() {
        let view = STATIC_VALUE.refc();

        assert!(view.is_live());
        assert_eq!(*view, 435_761);

        drop(view);

        // The storage is untouched by the view going away.
        let again = STATIC_VALUE.refc();
        assert_eq!(*again, 435_761);
    }

    #[test]
    fn views_count_against_the_storage_reference() {
        static COUNTED: Singleton<u64> = Singleton::new(7);

        let first = COUNTED.refc();

        // The storage holds one reference, the view another.
        assert_eq!(first.use_count(), Some(2));

        let second = first.clone();
        assert_eq!(second.use_count(), Some(3));

        drop(first);
        drop(second);

        assert_eq!(COUNTED.refc().use_count(), Some(2));
    }

    #[test]
    fn views_of_one_singleton_compare_equal() {
        static LEFT: Singleton<u8> = Singleton::new(1);
        static RIGHT: Singleton<u8> = Singleton::new(1);

        let left_a = LEFT.refc();
        let left_b = LEFT.refc();
        let right = RIGHT.refc();

        assert!(left_a == left_b);
        assert!(left_a != right, "identity is the address, not the value");
    }

    #[test]
    fn payload_drops_once_with_the_storage() {
        struct Flagging;

        static DROPS: AtomicU32 = AtomicU32::new(0);

        impl Drop for Flagging {
            fn drop(&mut self) {
                DROPS.fetch_add(1, Ordering::Relaxed);
            }
        }

        let singleton = Singleton::new(Flagging);
        assert_eq!(DROPS.load(Ordering::Relaxed), 0);

        drop(singleton);
        assert_eq!(DROPS.load(Ordering::Relaxed), 1);
    }
}
