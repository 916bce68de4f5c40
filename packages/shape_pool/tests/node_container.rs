//! Drives the driver and wrapper through a node-based container, the way
//! list- and tree-shaped collections would use them.

use std::ptr::NonNull;

use cell_pool::Allocator;
use new_zealand::nz;
use shape_pool::{LocalShapeDriver, ShapeAllocator};

/// A 24-byte node, the shape a typical map or list node of a small payload
/// lands on.
struct Node {
    value: u64,
    tag: u64,
    next: Option<NonNull<Node>>,
}

/// A minimal singly-linked stack parameterized over the workspace allocator
/// trait, standing in for a node-based container.
struct NodeStack<A: Allocator<Node>> {
    alloc: A,
    head: Option<NonNull<Node>>,
    len: usize,
}

impl<A: Allocator<Node>> NodeStack<A> {
    fn new(alloc: A) -> Self {
        Self {
            alloc,
            head: None,
            len: 0,
        }
    }

    fn push(&mut self, value: u64) {
        let node = self.alloc.allocate(1);

        // SAFETY: The allocator hands out storage valid for one Node.
        unsafe {
            node.write(Node {
                value,
                tag: value.wrapping_mul(3),
                next: self.head,
            });
        }

        self.head = Some(node);
        self.len += 1;
    }

    fn pop(&mut self) -> Option<u64> {
        let node = self.head?;

        // SAFETY: head always points at a live node owned by this stack.
        let Node { value, tag, next } = unsafe { node.read() };
        assert_eq!(tag, value.wrapping_mul(3), "node payload was corrupted");

        // SAFETY: The node came from our allocator and its value was moved
        // out above.
        unsafe { self.alloc.deallocate(node, 1) };

        self.head = next;
        self.len -= 1;

        Some(value)
    }
}

impl<A: Allocator<Node>> Drop for NodeStack<A> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}

#[test]
fn ten_thousand_nodes_use_the_expected_slab_count() {
    const NODE_COUNT: u64 = 10_000;
    const SLAB_CAPACITY: usize = 1024;

    let driver = LocalShapeDriver::with_slab_capacity(nz!(1024));
    let mut stack = NodeStack::new(ShapeAllocator::<Node>::new(driver.clone()));

    for value in 0..NODE_COUNT {
        stack.push(value);
    }

    let id = stack
        .alloc
        .class_id()
        .expect("pushing resolved the class id");

    // Slab creation is the only path to the system allocator.
    let expected_slabs = usize::try_from(NODE_COUNT).unwrap().div_ceil(SLAB_CAPACITY);
    assert_eq!(driver.slab_count(id), expected_slabs);

    // Pop everything back in LIFO order.
    for value in (0..NODE_COUNT).rev() {
        assert_eq!(stack.pop(), Some(value));
    }
    assert_eq!(stack.len, 0);

    // All cells went back to the free list; nothing further was created.
    assert_eq!(driver.free_cells(id), usize::try_from(NODE_COUNT).unwrap());
    assert_eq!(driver.slab_count(id), expected_slabs);

    drop(stack);
}

#[test]
fn refilling_after_drain_reuses_the_same_cells() {
    let driver = LocalShapeDriver::with_slab_capacity(nz!(64));
    let mut stack = NodeStack::new(ShapeAllocator::<Node>::new(driver.clone()));

    for value in 0..64 {
        stack.push(value);
    }
    while stack.pop().is_some() {}

    let id = stack.alloc.class_id().unwrap();
    assert_eq!(driver.slab_count(id), 1);

    // The second wave is served entirely from recycled cells.
    for value in 0..64 {
        stack.push(value);
    }
    assert_eq!(driver.slab_count(id), 1);
    assert_eq!(driver.free_cells(id), 0);
}

#[test]
fn moving_a_container_preserves_contents_and_allocator_identity() {
    let driver = LocalShapeDriver::new();

    let mut stack = NodeStack::new(ShapeAllocator::<Node>::new(driver.clone()));
    stack.push(1);
    stack.push(2);
    stack.push(3);

    let comparison = ShapeAllocator::<Node>::new(driver);
    _ = comparison.allocate(1);

    // Moving the container moves the allocator with it; the nodes it issued
    // stay valid because they are bound to the shared driver, not the stack
    // binding.
    let mut moved = stack;

    assert_eq!(
        moved.alloc, comparison,
        "wrappers over one driver with one resolved id are interchangeable"
    );

    assert_eq!(moved.pop(), Some(3));
    assert_eq!(moved.pop(), Some(2));
    assert_eq!(moved.pop(), Some(1));
}

#[test]
fn containers_of_same_footprint_nodes_share_one_class() {
    // A second node type with the same footprint as Node.
    #[allow(dead_code, reason = "only the layout matters")]
    struct OtherNode([u64; 3]);

    let driver = LocalShapeDriver::new();

    let node_alloc = ShapeAllocator::<Node>::new(driver.clone());
    let other_alloc = ShapeAllocator::<OtherNode>::new(driver.clone());

    let a = node_alloc.allocate(1);
    let b = other_alloc.allocate(1);

    assert_eq!(driver.num_classes(), 1);
    assert_eq!(node_alloc.class_id(), other_alloc.class_id());

    // SAFETY: Cells are uninitialized; nothing needs dropping.
    unsafe {
        node_alloc.deallocate(a, 1);
        other_alloc.deallocate(b, 1);
    }
}
