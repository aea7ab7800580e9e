//! Memory reservation for loaded segments.
use core::ptr::NonNull;

/// Information about a mapped memory region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedRegion {
    /// Local address of the first byte
    pub base: NonNull<u8>,
    /// Size of the region in bytes
    pub size: usize,
}

#[expect(clippy::result_unit_err)]
/// Abstract interface for reserving segment memory.
///
/// # Safety
///
/// A region returned by `map_region` must be valid for reads, writes and
/// instruction fetches of `size` bytes, must read as zero, and must stay at
/// the same address until it is passed to `unmap_region`.
pub unsafe trait MemoryMapper {
    /// Reserve a zero-filled region of `size` bytes.
    ///
    /// Regions are readable, writable and executable: segment permission bits
    /// are not applied.
    ///
    /// # Errors
    ///
    /// Returns `Err(())` if the region cannot be reserved.
    fn map_region(&mut self, size: usize) -> core::result::Result<MappedRegion, ()>;

    /// Release a region previously returned by `map_region`.
    ///
    /// # Errors
    ///
    /// Returns `Err(())` if the region is unknown to this mapper.
    fn unmap_region(&mut self, region: MappedRegion) -> core::result::Result<(), ()>;
}

/// Maps segments into anonymous private memory of the current process.
#[derive(Default)]
pub struct AnonymousMapper {
    allocations: Vec<region::Allocation>,
}

impl AnonymousMapper {
    #[must_use]
    #[inline]
    pub const fn new() -> Self {
        Self {
            allocations: Vec::new(),
        }
    }

    /// Number of regions currently mapped.
    #[must_use]
    #[inline]
    pub fn live_regions(&self) -> usize {
        self.allocations.len()
    }
}

// Safety: anonymous mappings are zero-filled by the kernel, are requested with
// read/write/execute protection and are only released when unmapped.
unsafe impl MemoryMapper for AnonymousMapper {
    fn map_region(&mut self, size: usize) -> core::result::Result<MappedRegion, ()> {
        let mut allocation =
            region::alloc(size, region::Protection::READ_WRITE_EXECUTE).map_err(|e| {
                crate::warn!("Anonymous mapping of {size:#x} bytes failed: {e}");
            })?;

        let base = NonNull::new(allocation.as_mut_ptr::<u8>()).ok_or(())?;
        self.allocations.push(allocation);

        Ok(MappedRegion { base, size })
    }

    fn unmap_region(&mut self, region: MappedRegion) -> core::result::Result<(), ()> {
        let position = self
            .allocations
            .iter()
            .position(|a| a.as_ptr::<u8>() == region.base.as_ptr().cast_const())
            .ok_or(())?;

        // Dropping the allocation unmaps it.
        drop(self.allocations.swap_remove(position));
        Ok(())
    }
}
