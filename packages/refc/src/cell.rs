use std::mem::MaybeUninit;
use std::sync::atomic::AtomicU64;

use shape_pool::{ClassId, LocalShapeDriver};

/// The control block at the start of every reference-counted cell.
///
/// The counter is atomic purely so the handle drop path stays lock-free;
/// it is only ever used with relaxed ordering because the driver underneath
/// is single-threaded and handles must not cross threads.
#[derive(Debug)]
pub(crate) struct CellHeader {
    /// Number of handles currently referring to the cell. A singleton's own
    /// storage counts as one, which is why its payload is never destroyed by
    /// a view being dropped.
    pub(crate) count: AtomicU64,

    /// The allocation class the cell came from. `None` for singleton cells,
    /// which were never driver-allocated.
    pub(crate) class_id: Option<ClassId>,

    /// The driver that owns the cell's storage. `None` marks a singleton,
    /// whose storage belongs to the caller.
    pub(crate) driver: Option<LocalShapeDriver>,
}

/// The full memory image of a reference-counted cell: control block first,
/// payload after it at a fixed, compile-time offset.
///
/// This type exists so factories can classify it with the driver - one
/// allocation class per cell shape, shared by payloads with equal footprints.
/// It is public for use by [`refc_factory!`][crate::refc_factory]-generated
/// code and is not intended to be constructed directly.
#[repr(C)]
pub struct RefcCell<T> {
    pub(crate) header: CellHeader,
    pub(crate) payload: MaybeUninit<T>,
}

impl<T> RefcCell<T> {
    /// Byte distance from the start of the cell to the payload. Fixed at
    /// compile time, which is what makes handle recovery from a raw payload
    /// pointer a constant-offset subtraction.
    pub(crate) const PAYLOAD_OFFSET: usize = std::mem::offset_of!(RefcCell<T>, payload);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_leads_the_cell() {
        // The control block sits at offset zero; the payload follows it.
        assert_eq!(std::mem::offset_of!(RefcCell<u64>, header), 0);
        assert!(RefcCell::<u64>::PAYLOAD_OFFSET >= size_of::<CellHeader>());
    }

    #[test]
    fn payload_offset_respects_payload_alignment() {
        #[repr(align(64))]
        #[allow(dead_code, reason = "only the layout matters")]
        struct Aligned([u8; 64]);

        assert_eq!(RefcCell::<Aligned>::PAYLOAD_OFFSET % 64, 0);
        assert_eq!(RefcCell::<u8>::PAYLOAD_OFFSET % align_of::<CellHeader>(), 0);
    }

    #[test]
    fn equal_footprint_payloads_make_equal_footprint_cells() {
        use shape_pool::CellShape;

        assert_eq!(
            CellShape::of::<RefcCell<i32>>(),
            CellShape::of::<RefcCell<i64>>()
        );
    }
}
