//! Loaded segment records.
use crate::{mapper::MappedRegion, program::SegmentFlags};
use core::ptr::NonNull;

/// A `PT_LOAD` segment copied into a local memory region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadedSegment {
    /// Index of the program header that described the segment
    pub index: u16,
    /// Virtual address the segment expects to run at
    pub virtual_addr: u32,
    /// Size of the segment in memory
    pub mem_size: u32,
    /// Number of bytes copied from the file
    pub file_size: u32,
    /// Permission bits requested by the file (not applied)
    pub flags: SegmentFlags,
    /// Region holding the segment
    pub region: MappedRegion,
}

impl LoadedSegment {
    /// Whether `addr` falls inside `[virtual_addr, virtual_addr + mem_size)`.
    #[must_use]
    pub fn contains(&self, addr: u32) -> bool {
        let start = u64::from(self.virtual_addr);
        let end = start + u64::from(self.mem_size);
        (start..end).contains(&u64::from(addr))
    }

    /// Translate a virtual address of the segment to its local address.
    #[must_use]
    pub fn local_address(&self, addr: u32) -> Option<NonNull<u8>> {
        if !self.contains(addr) {
            return None;
        }
        let delta = usize::try_from(addr - self.virtual_addr).ok()?;
        // Safety: `delta < mem_size == region.size`, so the result stays inside
        // the region and cannot be null.
        Some(unsafe { self.region.base.add(delta) })
    }
}

/// The resolved local address of the program's entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryPoint {
    /// Entry point as recorded in the file header
    pub virtual_addr: u32,
    /// Position of the owning segment in the session registry
    pub segment: usize,
    /// Address of the entry point inside the owning region
    pub local_addr: NonNull<u8>,
}
