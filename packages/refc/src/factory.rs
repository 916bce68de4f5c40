use shape_pool::{ClassId, LocalShapeDriver};

/// Marks a payload type as a member of a factory's declared type list and
/// records its position in the factory's class ID table.
///
/// Implementations are generated by [`refc_factory!`][crate::refc_factory];
/// there is no reason to write one by hand. A hand-written implementation
/// with a wrong index cannot break memory safety - handle creation verifies
/// the class footprint - but it will panic at the first `create` call.
pub trait FactoryMember<F> {
    /// The type's position in the factory's declared type list.
    const INDEX: usize;
}

/// Issues one `reserve` call per distinct class for a factory's capacity
/// hints.
///
/// Several payload types may resolve to the same class when their cell
/// footprints match, so per-type hints are summed per class first; a single
/// reservation then covers every type sharing the pool.
///
/// This is a building block for [`refc_factory!`][crate::refc_factory]
/// generated factories; `ids` and `capacities` are the factory's ID table
/// and the caller's per-type hints, index-aligned with the declared type
/// list.
pub fn reserve_aggregated(driver: &LocalShapeDriver, ids: &[ClassId], capacities: &[usize]) {
    debug_assert_eq!(
        ids.len(),
        capacities.len(),
        "one capacity hint per declared type"
    );

    let mut totals: Vec<(ClassId, usize)> = Vec::with_capacity(ids.len());

    for (&id, &capacity) in ids.iter().zip(capacities) {
        match totals.iter_mut().find(|(existing, _)| *existing == id) {
            Some((_, total)) => *total += capacity,
            None => totals.push((id, capacity)),
        }
    }

    for (id, total) in totals {
        if total != 0 {
            driver.reserve(id, total);
        }
    }
}

/// Defines a factory over a closed list of payload types.
///
/// The generated struct owns a [`LocalShapeDriver`][crate::LocalShapeDriver]
/// and a fixed table with one class ID per declared type, resolved once at
/// construction; `create` then reaches the right pool by compile-time index,
/// with no classification on the hot path. Types whose cells share a
/// footprint resolve to the same class and transparently share slabs.
///
/// Generated API:
///
/// - `new()` - factory over a fresh driver
/// - `with_driver(driver)` - factory over an existing (possibly shared)
///   driver
/// - `with_capacities([usize; N])` - like `new()`, plus one pre-sizing
///   reservation per distinct class, with hints aggregated across types
///   that share a class
/// - `create::<T>(value)` - allocates a cell and returns the owning
///   [`Refc<T>`][crate::Refc]
/// - `create_with::<T>(closure)` - in-place initialization flavor (unsafe:
///   the closure must fully initialize the payload)
/// - `driver()` - the underlying driver handle
///
/// # Example
///
/// ```rust
/// use refc::refc_factory;
///
/// refc_factory! {
///     /// Allocates the node types of the expression tree.
///     pub struct ExprFactory(i32, i64, f64);
/// }
///
/// // Pre-size: the three types share one cell footprint, so one pool
/// // receives the summed reservation.
/// let factory = ExprFactory::with_capacities([100, 100, 50]);
///
/// let int = factory.create(42_i32);
/// let long = factory.create(44_567_i64);
///
/// assert_eq!(*int, 42);
/// assert_eq!(*long, 44_567);
/// ```
#[macro_export]
macro_rules! refc_factory {
    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident($($member:ty),+ $(,)?);
    ) => {
        $(#[$attr])*
        $vis struct $name {
            driver: $crate::LocalShapeDriver,
            ids: [$crate::ClassId; { [$(stringify!($member)),+].len() }],
        }

        impl $name {
            /// Creates the factory over a fresh driver, resolving one class
            /// ID per declared type.
            $vis fn new() -> Self {
                Self::with_driver($crate::LocalShapeDriver::new())
            }

            /// Creates the factory over the given driver.
            ///
            /// Factories sharing one driver also share its pools.
            $vis fn with_driver(driver: $crate::LocalShapeDriver) -> Self {
                let ids = [$(driver.class_of::<$crate::RefcCell<$member>>()),+];
                Self { driver, ids }
            }

            /// Creates the factory over a fresh driver and pre-sizes its
            /// pools, one capacity hint per declared type.
            ///
            /// Hints for types that share a class are aggregated, so the
            /// single reservation per class honors all of them.
            $vis fn with_capacities(
                capacities: [usize; { [$(stringify!($member)),+].len() }],
            ) -> Self {
                let factory = Self::new();
                $crate::reserve_aggregated(&factory.driver, &factory.ids, &capacities);
                factory
            }

            /// Creates a `T` in a driver-allocated cell and returns the
            /// reference-counted handle owning it.
            $vis fn create<T: $crate::FactoryMember<Self>>(
                &self,
                value: T,
            ) -> $crate::Refc<T> {
                $crate::Refc::new_in(
                    &self.driver,
                    self.ids[<T as $crate::FactoryMember<Self>>::INDEX],
                    value,
                )
            }

            /// In-place initialization flavor of `create`.
            ///
            /// If `init` panics, the cell returns to the free list before
            /// the panic continues.
            ///
            /// # Safety
            ///
            /// `init` must fully initialize the payload before returning.
            $vis unsafe fn create_with<T: $crate::FactoryMember<Self>>(
                &self,
                init: impl FnOnce(&mut ::core::mem::MaybeUninit<T>),
            ) -> $crate::Refc<T> {
                // SAFETY: Forwarding the initialization contract to the
                // caller.
                unsafe {
                    $crate::Refc::new_in_with(
                        &self.driver,
                        self.ids[<T as $crate::FactoryMember<Self>>::INDEX],
                        init,
                    )
                }
            }

            /// Returns the driver this factory allocates from.
            $vis fn driver(&self) -> &$crate::LocalShapeDriver {
                &self.driver
            }
        }

        $crate::refc_factory!(@members $name; 0; $($member),+);
    };

    (@members $name:ident; $index:expr; $head:ty) => {
        impl $crate::FactoryMember<$name> for $head {
            const INDEX: usize = $index;
        }
    };

    (@members $name:ident; $index:expr; $head:ty, $($tail:ty),+) => {
        impl $crate::FactoryMember<$name> for $head {
            const INDEX: usize = $index;
        }

        $crate::refc_factory!(@members $name; $index + 1; $($tail),+);
    };
}

#[cfg(test)]
mod tests {
    use crate::RefcCell;

    crate::refc_factory! {
        /// Factory whose member types all share one cell footprint.
        struct SharedShapes(u8, u16, u32, u64);
    }

    crate::refc_factory! {
        /// Factory whose member types span two cell footprints.
        struct MixedShapes(u64, [u64; 4]);
    }

    #[test]
    fn members_know_their_positions() {
        use crate::FactoryMember;

        assert_eq!(<u8 as FactoryMember<SharedShapes>>::INDEX, 0);
        assert_eq!(<u16 as FactoryMember<SharedShapes>>::INDEX, 1);
        assert_eq!(<u32 as FactoryMember<SharedShapes>>::INDEX, 2);
        assert_eq!(<u64 as FactoryMember<SharedShapes>>::INDEX, 3);
    }

    #[test]
    fn same_footprint_members_share_one_class() {
        let factory = SharedShapes::new();

        // All four cell shapes normalize identically.
        assert_eq!(factory.driver().num_classes(), 1);
    }

    #[test]
    fn distinct_footprints_get_distinct_classes() {
        let factory = MixedShapes::new();

        assert_eq!(factory.driver().num_classes(), 2);
    }

    #[test]
    fn capacity_hints_aggregate_per_class() {
        // 600 + 600 cells of one shared shape: a single reservation must
        // cover 1200 cells, observable as one exactly-sized slab.
        let factory = MixedShapesWithHints::with_capacities([600, 600, 10]);

        let id = factory.driver().class_of::<RefcCell<u64>>();
        assert_eq!(factory.driver().slab_count(id), 1);

        let handles: Vec<_> = (0..600)
            .map(|value| factory.create(value as u64))
            .collect();
        let more: Vec<_> = (0..600).map(|value| factory.create(value as i64)).collect();

        // 1200 creations, still the one reserved slab.
        assert_eq!(factory.driver().slab_count(id), 1);

        drop(handles);
        drop(more);
    }

    crate::refc_factory! {
        /// Two types sharing a footprint plus one with its own.
        struct MixedShapesWithHints(u64, i64, [u64; 4]);
    }

    #[test]
    fn factories_can_share_a_driver() {
        let first = SharedShapes::new();
        let second = MixedShapes::with_driver(first.driver().clone());

        // The u64 cell class is shared across both factories.
        assert_eq!(second.driver().num_classes(), 2);

        let a = first.create(1_u64);
        let b = second.create(2_u64);
        assert_eq!(*a + *b, 3);
    }
}
