use std::io;
use std::ptr;

use log::trace;
use memmap2::{MmapMut, MmapOptions};

/// The only way the generator can fail: the OS refused to reserve the block.
#[derive(Debug, thiserror::Error)]
#[error("failed to reserve {size} bytes for the working set: {source}")]
pub struct AllocationFailure {
    pub size: usize,
    #[source]
    pub source: io::Error,
}

impl AllocationFailure {
    fn invalid(size: usize, msg: &'static str) -> Self {
        Self {
            size,
            source: io::Error::new(io::ErrorKind::InvalidInput, msg),
        }
    }
}

/// Anonymous private mapping that backs the working set.
///
/// The mapping is reserved once and never moves. Pages stay unbacked until
/// written, so every access is volatile and no page write can be elided.
pub struct MemoryBlock {
    map: MmapMut,
    page_stride: usize,
}

impl MemoryBlock {
    pub fn allocate(size: usize, page_stride: usize) -> Result<Self, AllocationFailure> {
        if size == 0 {
            return Err(AllocationFailure::invalid(size, "block size must be positive"));
        }
        if page_stride == 0 {
            return Err(AllocationFailure::invalid(size, "page stride must be positive"));
        }

        let map = MmapOptions::new()
            .len(size)
            .map_anon()
            .map_err(|source| AllocationFailure { size, source })?;
        trace!("Reserved {} bytes at {:p}", size, map.as_ptr());

        Ok(Self { map, page_stride })
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn page_stride(&self) -> usize {
        self.page_stride
    }

    /// Number of page offsets that fall inside the block (last page may be partial).
    pub fn page_count(&self) -> usize {
        self.len().div_ceil(self.page_stride)
    }

    pub fn byte_at(&self, offset: usize) -> Option<u8> {
        let slot = self.map.get(offset)?;
        Some(unsafe { ptr::read_volatile(slot) })
    }

    pub fn touch(&mut self, offset: usize, value: u8) {
        let slot = &mut self.map[offset];
        unsafe { ptr::write_volatile(slot, value) };
    }

    pub fn toggle(&mut self, offset: usize, mask: u8) {
        let slot = &mut self.map[offset];
        unsafe {
            let old = ptr::read_volatile(slot);
            ptr::write_volatile(slot, old ^ mask);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_exact_size() {
        let block = MemoryBlock::allocate(3 * 4096, 4096).expect("allocation should succeed");

        assert_eq!(block.len(), 3 * 4096, "Block should be exactly the requested size");
        assert_eq!(block.page_stride(), 4096);
        assert_eq!(block.page_count(), 3, "Three full pages");
    }

    #[test]
    fn test_partial_last_page_is_counted() {
        let block = MemoryBlock::allocate(4096 + 1, 4096).expect("allocation should succeed");
        assert_eq!(block.page_count(), 2, "The trailing byte lives on its own page");
    }

    #[test]
    fn test_zero_size_is_rejected() {
        let err = MemoryBlock::allocate(0, 4096).err().expect("zero size must fail");
        assert_eq!(err.size, 0);
        assert_eq!(err.source.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_zero_stride_is_rejected() {
        assert!(MemoryBlock::allocate(4096, 0).is_err());
    }

    #[test]
    fn test_oversized_reservation_fails() {
        // No address space can hold this, so the OS has to refuse it.
        let err = MemoryBlock::allocate(usize::MAX, 4096).err().expect("reservation must fail");
        assert_eq!(err.size, usize::MAX);
        assert!(err.to_string().contains("failed to reserve"));
    }

    #[test]
    fn test_touch_and_toggle() {
        let mut block = MemoryBlock::allocate(4096, 4096).expect("allocation should succeed");
        assert_eq!(block.byte_at(0), Some(0), "Fresh anonymous memory reads as zero");

        block.touch(0, 1);
        assert_eq!(block.byte_at(0), Some(1));

        block.toggle(0, 1);
        assert_eq!(block.byte_at(0), Some(0));
        block.toggle(0, 1);
        assert_eq!(block.byte_at(0), Some(1));
    }

    #[test]
    fn test_byte_at_out_of_range() {
        let block = MemoryBlock::allocate(4096, 4096).expect("allocation should succeed");
        assert_eq!(block.byte_at(4096), None);
    }
}
