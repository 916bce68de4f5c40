use std::num::NonZero;

use crate::driver::DEFAULT_SLAB_CAPACITY;
use crate::{LocalShapeDriver, RawShapeDriver};

/// Builder for creating a [`RawShapeDriver`] or [`LocalShapeDriver`].
///
/// All settings are optional.
///
/// # Example
///
/// ```rust
/// use new_zealand::nz;
/// use shape_pool::RawShapeDriver;
///
/// let driver = RawShapeDriver::builder().slab_capacity(nz!(512)).build();
/// ```
#[derive(Debug)]
#[must_use]
pub struct ShapeDriverBuilder {
    slab_capacity: NonZero<usize>,
}

impl ShapeDriverBuilder {
    pub(crate) fn new() -> Self {
        Self {
            slab_capacity: DEFAULT_SLAB_CAPACITY,
        }
    }

    /// Sets the number of cells in every slab the driver creates.
    ///
    /// `reserve` requests may create one differently-sized slab to match the
    /// requested count exactly.
    pub fn slab_capacity(mut self, capacity: NonZero<usize>) -> Self {
        self.slab_capacity = capacity;
        self
    }

    /// Builds the raw, single-owner driver.
    #[must_use]
    pub fn build(self) -> RawShapeDriver {
        RawShapeDriver::new_inner(self.slab_capacity)
    }

    /// Builds the driver and wraps it in a cloneable [`LocalShapeDriver`]
    /// handle.
    #[must_use]
    pub fn build_local(self) -> LocalShapeDriver {
        LocalShapeDriver::from(self.build())
    }
}
