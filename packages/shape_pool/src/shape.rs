use std::alloc::Layout;

/// The footprint a type is classified by: its normalized cell size and its
/// alignment requirement.
///
/// The **normalized size** is `size_of::<T>()` rounded up to an 8-byte
/// multiple, but never smaller than a pointer. Rounding keeps consecutive
/// cells mutually aligned; the pointer floor guarantees every cell can hold a
/// free-list link while it is not issued to a caller.
///
/// Two types with the same footprint are interchangeable at the allocation
/// level and can share a pool.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct CellShape {
    size: usize,
    align: usize,
}

impl CellShape {
    /// Computes the footprint of `T`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use shape_pool::CellShape;
    ///
    /// // Small types are padded up to a pointer-sized, 8-byte cell.
    /// assert_eq!(CellShape::of::<u8>().size(), 8);
    ///
    /// // Same footprint, same shape.
    /// assert_eq!(CellShape::of::<u64>(), CellShape::of::<i64>());
    /// ```
    #[must_use]
    pub const fn of<T>() -> Self {
        let rounded = size_of::<T>().next_multiple_of(8);

        let size = if rounded < size_of::<*const ()>() {
            size_of::<*const ()>()
        } else {
            rounded
        };

        Self {
            size,
            align: align_of::<T>(),
        }
    }

    /// Returns the normalized cell size in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Returns the alignment requirement in bytes.
    #[must_use]
    pub const fn align(&self) -> usize {
        self.align
    }

    /// Returns the memory layout of one cell of this shape.
    #[must_use]
    pub fn layout(&self) -> Layout {
        Layout::from_size_align(self.size, self.align)
            .expect("a normalized shape always forms a valid layout")
    }
}

/// Identifies one allocation class (one pool) inside a driver.
///
/// IDs are opaque and only meaningful to the driver that issued them; they
/// stay stable for the driver's lifetime. Mixing IDs across drivers is a
/// contract violation.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct ClassId(pub(crate) usize);

impl ClassId {
    /// Returns the position of this class in the driver's classification
    /// table.
    #[must_use]
    pub(crate) fn index(self) -> usize {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_types_normalize_to_pointer_size() {
        assert_eq!(CellShape::of::<u8>().size(), 8);
        assert_eq!(CellShape::of::<u16>().size(), 8);
        assert_eq!(CellShape::of::<u32>().size(), 8);
        assert_eq!(CellShape::of::<u64>().size(), 8);
    }

    #[test]
    fn larger_types_round_up_to_eight_bytes() {
        assert_eq!(CellShape::of::<[u8; 9]>().size(), 16);
        assert_eq!(CellShape::of::<[u8; 16]>().size(), 16);
        assert_eq!(CellShape::of::<[u8; 17]>().size(), 24);
    }

    #[test]
    fn alignment_is_preserved() {
        #[repr(align(16))]
        #[allow(dead_code, reason = "only the layout matters")]
        struct Aligned([u8; 16]);

        let shape = CellShape::of::<Aligned>();
        assert_eq!(shape.align(), 16);
        assert_eq!(shape.size(), 16);
    }

    #[test]
    fn footprint_equality_ignores_the_source_type() {
        assert_eq!(CellShape::of::<u64>(), CellShape::of::<i64>());
        assert_eq!(CellShape::of::<u64>(), CellShape::of::<f64>());
        assert_ne!(CellShape::of::<u64>(), CellShape::of::<[u32; 2]>());
    }

    #[test]
    fn layout_matches_shape() {
        let shape = CellShape::of::<[u64; 3]>();
        let layout = shape.layout();

        assert_eq!(layout.size(), 24);
        assert_eq!(layout.align(), 8);
    }
}
