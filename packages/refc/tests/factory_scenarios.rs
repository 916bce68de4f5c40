//! End-to-end scenarios driving factories, handle recovery, upcasts and
//! singletons together.

use refc::{Refc, RefcFromSelf, Singleton, define_refc_cast, refc_factory};

/// A payload that can hand out its own handle.
struct DoubleWrapper {
    value: f64,
}

impl RefcFromSelf for DoubleWrapper {}

refc_factory! {
    /// Allocates the mixed payload types of the main scenario.
    struct ScenarioFactory(i32, i64, DoubleWrapper);
}

#[test]
fn mixed_payloads_share_cells_and_recover_handles() {
    let factory = ScenarioFactory::new();

    // All three payloads pad to the same cell footprint, so one class
    // serves the whole factory.
    assert_eq!(factory.driver().num_classes(), 1);

    {
        let int = factory.create(42_i32);
        let long = factory.create(44_567_i64);

        assert_eq!(*int, 42);
        assert_eq!(*long, 44_567);
    }

    // Both cells were recycled; the wrapper reuses one of them.
    let wrapper = factory.create(DoubleWrapper { value: 24.42 });

    // SAFETY: The wrapper payload was created through the factory above.
    let recovered = unsafe { wrapper.refc_from_self() };

    assert!(recovered == wrapper);
    assert_eq!(recovered.value, 24.42);
    assert_eq!(wrapper.use_count(), Some(2));

    drop(recovered);
    assert_eq!(wrapper.use_count(), Some(1));
}

#[test]
fn recycled_cells_come_back_before_fresh_ones() {
    let factory = ScenarioFactory::new();

    let first = factory.create(1_i32);
    let first_cell = first.ptr().as_ptr().addr();
    drop(first);

    // A different payload type of the same footprint lands on the freed
    // cell.
    let second = factory.create(2_i64);
    assert_eq!(second.ptr().as_ptr().addr(), first_cell);
}

trait Area {
    fn area(&self) -> f64;
}

struct Square {
    side: f64,
}

impl Area for Square {
    fn area(&self) -> f64 {
        self.side * self.side
    }
}

define_refc_cast! {
    /// Upcasts to the area-measurable view.
    trait CastArea: fn cast_area -> Area;
}

refc_factory! {
    /// Allocates the geometry payloads.
    struct Shapes(Square);
}

#[test]
fn upcast_views_dispatch_identically_and_share_the_count() {
    let factory = Shapes::new();

    let square = factory.create(Square { side: 3.0 });
    let area: Refc<dyn Area> = square.clone().cast_area();

    // Same cell, same count, same virtual dispatch result.
    assert!(area == square);
    assert_eq!(square.use_count(), Some(2));
    assert_eq!(area.area(), 9.0);
    assert_eq!(square.area(), 9.0);
    assert_eq!(area.ptr().as_ptr().addr(), square.ptr().as_ptr().addr());

    // Dropping through the trait-object view runs the ordinary counting
    // path.
    drop(area);
    assert_eq!(square.use_count(), Some(1));
}

#[test]
fn last_drop_through_the_upcast_view_destroys_the_payload() {
    use std::cell::Cell;
    use std::rc::Rc;

    struct Tracked {
        side: f64,
        dropped: Rc<Cell<bool>>,
    }

    impl Area for Tracked {
        fn area(&self) -> f64 {
            self.side
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.dropped.set(true);
        }
    }

    refc_factory! {
        /// Allocates drop-tracked geometry payloads.
        struct TrackedShapes(Tracked);
    }

    let factory = TrackedShapes::new();
    let dropped = Rc::new(Cell::new(false));

    let concrete = factory.create(Tracked {
        side: 2.0,
        dropped: Rc::clone(&dropped),
    });

    // The upcast consumes the concrete handle; the view is now the only one.
    let view: Refc<dyn Area> = concrete.cast_area();
    drop(view);

    assert!(dropped.get(), "the trait-object drop must destroy the payload");
}

static SHARED_ANSWER: Singleton<i32> = Singleton::new(435_761);

#[test]
fn singleton_views_interoperate_with_factory_handles() {
    let view = SHARED_ANSWER.refc();
    assert_eq!(*view, 435_761);

    let factory = ScenarioFactory::new();
    let pooled = factory.create(435_761_i32);

    // Same value, different cells: identity equality keeps them apart.
    assert!(view != pooled);
    assert_eq!(*view, *pooled);

    drop(view);

    // The static cell is untouched and can be viewed again.
    assert_eq!(*SHARED_ANSWER.refc(), 435_761);
}
