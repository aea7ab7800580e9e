//! Load session: segment mapping, entry resolution and launch.
use crate::{
    LoadResult,
    error::LoadError,
    header::ElfHeader,
    mapper::{MappedRegion, MemoryMapper},
    program::{ProgramHeaderEntry, ProgramHeaderTable},
    segments::{EntryPoint, LoadedSegment},
};
use std::io::{Read, Seek, SeekFrom};

/// Resources of a single load-and-run attempt.
///
/// Every region mapped by the session is recorded in its registry and released
/// when the session is dropped, whichever way the attempt ends.
pub struct LoadSession<'m, R: Read + Seek, M: MemoryMapper> {
    file: R,
    mapper: &'m mut M,
    header: Option<ElfHeader>,
    segments: Vec<LoadedSegment>,
    entry: Option<EntryPoint>,
}

impl<'m, R: Read + Seek, M: MemoryMapper> LoadSession<'m, R, M> {
    #[must_use]
    pub const fn new(file: R, mapper: &'m mut M) -> Self {
        Self {
            file,
            mapper,
            header: None,
            segments: Vec::new(),
            entry: None,
        }
    }

    #[must_use]
    #[inline]
    pub const fn header(&self) -> Option<&ElfHeader> {
        self.header.as_ref()
    }

    /// Segments currently mapped, in program-header order.
    #[must_use]
    #[inline]
    pub fn segments(&self) -> &[LoadedSegment] {
        &self.segments
    }

    #[must_use]
    #[inline]
    pub const fn entry(&self) -> Option<&EntryPoint> {
        self.entry.as_ref()
    }

    /// The bytes of the `i`-th registered segment, `mem_size` long.
    #[must_use]
    pub fn segment_memory(&self, i: usize) -> Option<&[u8]> {
        let segment = self.segments.get(i)?;
        // Safety: registered regions stay mapped until the session drops them,
        // which cannot happen while `self` is borrowed.
        Some(unsafe {
            core::slice::from_raw_parts(segment.region.base.as_ptr(), segment.region.size)
        })
    }

    /// Validate the file and map every `PT_LOAD` segment.
    ///
    /// # Errors
    ///
    /// Returns the first validation, I/O or allocation error encountered.
    /// Segments mapped before the error stay registered until the session drops.
    pub fn load(&mut self) -> LoadResult<()> {
        self.file
            .seek(SeekFrom::Start(0))
            .map_err(LoadError::HeaderRead)?;
        let header = ElfHeader::read_from(&mut self.file)?;
        crate::debug!(
            "ELF header: type {}, machine {:#x}, entry {:#x}, {} program headers at {:#x}",
            header.kind,
            header.machine,
            header.entry_point,
            header.ph_count,
            header.ph_offset
        );
        self.header = Some(header);

        let table = ProgramHeaderTable::new(&header);
        for index in table.indices() {
            let entry = table.read_entry(&mut self.file, index)?;
            crate::debug!(
                "Program header {index}: type {:#x}, offset {:#x}, vaddr {:#x}, filesz {:#x}, memsz {:#x}, flags {}",
                entry.kind,
                entry.offset,
                entry.virtual_addr,
                entry.file_size,
                entry.mem_size,
                entry.flags
            );
            self.load_segment(index, &entry)?;
        }

        Ok(())
    }

    /// Map one program header, skipping anything but non-empty `PT_LOAD` entries.
    fn load_segment(&mut self, index: u16, entry: &ProgramHeaderEntry) -> LoadResult<()> {
        if !entry.is_load() {
            return Ok(());
        }
        if entry.mem_size == 0 {
            crate::warn!("Skipping empty loadable segment {index}");
            return Ok(());
        }
        if entry.file_size > entry.mem_size {
            return Err(LoadError::InvalidSegment {
                index,
                file_size: entry.file_size,
                mem_size: entry.mem_size,
            });
        }

        let size = usize::try_from(entry.mem_size).map_err(|_| LoadError::AllocationFailed {
            index,
            size: entry.mem_size,
        })?;
        let region = self
            .mapper
            .map_region(size)
            .map_err(|()| LoadError::AllocationFailed {
                index,
                size: entry.mem_size,
            })?;

        self.segments.push(LoadedSegment {
            index,
            virtual_addr: entry.virtual_addr,
            mem_size: entry.mem_size,
            file_size: entry.file_size,
            flags: entry.flags,
            region,
        });

        if let Err(e) = self.fill_region(index, entry, region) {
            self.release_last();
            return Err(e);
        }

        crate::info!(
            "Mapped segment {index} ({:#x}..{:#x}, {}) at {:p}",
            entry.virtual_addr,
            u64::from(entry.virtual_addr) + u64::from(entry.mem_size),
            entry.flags,
            region.base
        );
        Ok(())
    }

    /// Copy the file-backed part of a segment to the start of its region.
    ///
    /// The rest of the region is left as mapped, i.e. zeroed.
    fn fill_region(
        &mut self,
        index: u16,
        entry: &ProgramHeaderEntry,
        region: MappedRegion,
    ) -> LoadResult<()> {
        let offset = u64::from(entry.offset);
        self.file
            .seek(SeekFrom::Start(offset))
            .map_err(|source| LoadError::SeekFailed {
                index,
                offset,
                source,
            })?;

        let file_size = usize::try_from(entry.file_size).map_err(|_| LoadError::InvalidSegment {
            index,
            file_size: entry.file_size,
            mem_size: entry.mem_size,
        })?;
        debug_assert!(file_size <= region.size);
        // Safety: the region is mapped, at least `file_size` bytes long and not
        // aliased by any live reference.
        let dest = unsafe { core::slice::from_raw_parts_mut(region.base.as_ptr(), file_size) };

        self.file
            .read_exact(dest)
            .map_err(|source| LoadError::ShortRead {
                index,
                expected: entry.file_size,
                source,
            })
    }

    /// Find the local address of the header's entry point.
    ///
    /// If several segments contain the entry point, the last one in
    /// program-header order is used.
    ///
    /// # Errors
    ///
    /// Returns `EntryPointNotFound` if no mapped segment contains it.
    pub fn resolve_entry(&mut self) -> LoadResult<EntryPoint> {
        let entry_vaddr = self.header.map_or(0, |h| h.entry_point);

        let (segment, local_addr) = self
            .segments
            .iter()
            .enumerate()
            .filter_map(|(i, seg)| seg.local_address(entry_vaddr).map(|addr| (i, addr)))
            .last()
            .ok_or(LoadError::EntryPointNotFound(entry_vaddr))?;

        let entry = EntryPoint {
            virtual_addr: entry_vaddr,
            segment,
            local_addr,
        };
        crate::info!(
            "Entry point {entry_vaddr:#x} resolved to {local_addr:p} in segment {}",
            self.segments[segment].index
        );
        self.entry = Some(entry);
        Ok(entry)
    }

    /// Resolve the entry point and call it.
    ///
    /// # Safety
    ///
    /// The loaded program is executed in the current process. Its entry point
    /// must be machine code for the host architecture behaving as an
    /// `extern "C" fn() -> i32`; anything it does is outside the loader's control.
    ///
    /// # Errors
    ///
    /// Returns `EntryPointNotFound` without running anything if the entry point
    /// is not mapped.
    pub unsafe fn launch(&mut self) -> LoadResult<i32> {
        let entry = self.resolve_entry()?;
        // Safety: forwarded to the caller.
        Ok(unsafe { transfer_control(entry) })
    }

    /// Unmap and forget the most recently registered segment.
    fn release_last(&mut self) {
        if let Some(segment) = self.segments.pop() {
            self.release(&segment);
        }
    }

    fn release(&mut self, segment: &LoadedSegment) {
        if self.mapper.unmap_region(segment.region).is_err() {
            crate::warn!(
                "Failed to unmap segment {} at {:p}",
                segment.index,
                segment.region.base
            );
        } else {
            crate::debug!(
                "Released segment {} ({:#x} bytes at {:p})",
                segment.index,
                segment.region.size,
                segment.region.base
            );
        }
    }
}

impl<R: Read + Seek, M: MemoryMapper> Drop for LoadSession<'_, R, M> {
    fn drop(&mut self) {
        self.entry = None;
        while let Some(segment) = self.segments.pop() {
            self.release(&segment);
        }
    }
}

/// Jump to `entry` as if it were an `extern "C" fn() -> i32` and return its result.
///
/// # Safety
///
/// `entry.local_addr` must point to executable code following the C calling
/// convention of the host, taking no arguments and returning an `i32`.
pub unsafe fn transfer_control(entry: EntryPoint) -> i32 {
    // Safety: data and function pointers have the same size on supported hosts;
    // the caller vouches for the code behind the address.
    let addr = entry.local_addr.as_ptr().cast_const();
    let routine = unsafe { core::mem::transmute::<*const u8, extern "C" fn() -> i32>(addr) };
    routine()
}
