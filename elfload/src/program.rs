//! ELF32 program-header table.
use crate::{
    LoadResult,
    error::LoadError,
    header::{ElfHeader, le_u32},
};
use num_enum::TryFromPrimitive;
use std::io::{ErrorKind, Read, Seek, SeekFrom};

/// Size of one ELF32 program header in bytes.
pub const PROGRAM_HEADER_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u32)]
pub enum SegmentType {
    Null = 0,
    Load = 1,
    Dynamic = 2,
    Interp = 3,
    Note = 4,
    ShLib = 5,
    Phdr = 6,
    Tls = 7,
}

/// Segment permission bits (`p_flags`).
///
/// These are decoded for diagnostics only: every loaded segment is mapped
/// readable, writable and executable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentFlags(u32);

impl SegmentFlags {
    const EXECUTABLE: u32 = 0b001;
    const WRITABLE: u32 = 0b010;
    const READABLE: u32 = 0b100;

    #[must_use]
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[must_use]
    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    #[inline]
    pub const fn is_readable(self) -> bool {
        (self.0 & Self::READABLE) != 0
    }
    #[must_use]
    #[inline]
    pub const fn is_writable(self) -> bool {
        (self.0 & Self::WRITABLE) != 0
    }
    #[must_use]
    #[inline]
    pub const fn is_executable(self) -> bool {
        (self.0 & Self::EXECUTABLE) != 0
    }
}

impl core::fmt::Display for SegmentFlags {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let r = if self.is_readable() { 'r' } else { '-' };
        let w = if self.is_writable() { 'w' } else { '-' };
        let x = if self.is_executable() { 'x' } else { '-' };
        write!(f, "{r}{w}{x}")
    }
}

/// One entry of the program-header table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramHeaderEntry {
    /// Raw segment type (`p_type`)
    pub kind: u32,
    pub offset: u32,
    pub virtual_addr: u32,
    pub file_size: u32,
    pub mem_size: u32,
    pub flags: SegmentFlags,
}

impl ProgramHeaderEntry {
    #[must_use]
    pub fn parse(raw: &[u8; PROGRAM_HEADER_SIZE]) -> Self {
        Self {
            kind: le_u32(raw, 0),
            offset: le_u32(raw, 4),
            virtual_addr: le_u32(raw, 8),
            file_size: le_u32(raw, 16),
            mem_size: le_u32(raw, 20),
            flags: SegmentFlags::from_bits(le_u32(raw, 24)),
        }
    }

    /// The decoded segment type, or `None` for OS and processor specific types.
    #[must_use]
    pub fn segment_type(&self) -> Option<SegmentType> {
        SegmentType::try_from(self.kind).ok()
    }

    #[must_use]
    #[inline]
    pub fn is_load(&self) -> bool {
        self.segment_type() == Some(SegmentType::Load)
    }
}

/// Location of the program-header table inside the file.
///
/// Entries are read on demand, one at a time, by seeking to their offset.
/// Reading an index again simply seeks back to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramHeaderTable {
    offset: u64,
    entry_size: u64,
    count: u16,
}

impl ProgramHeaderTable {
    #[must_use]
    pub fn new(header: &ElfHeader) -> Self {
        Self {
            offset: u64::from(header.ph_offset),
            entry_size: u64::from(header.ph_entry_size),
            count: header.ph_count,
        }
    }

    /// Indices of the table, in ascending order.
    #[must_use]
    #[inline]
    pub fn indices(&self) -> core::ops::Range<u16> {
        0..self.count
    }

    #[must_use]
    #[inline]
    pub const fn entry_offset(&self, index: u16) -> u64 {
        // Fits: a u32 offset plus at most u16::MAX * u16::MAX.
        self.offset + index as u64 * self.entry_size
    }

    /// Seek to entry `index` and read it.
    ///
    /// # Errors
    ///
    /// Returns `SeekFailed` if the seek fails and `TruncatedProgramHeader` if the
    /// file ends inside the entry.
    pub fn read_entry<R: Read + Seek>(
        &self,
        reader: &mut R,
        index: u16,
    ) -> LoadResult<ProgramHeaderEntry> {
        debug_assert!(index < self.count);

        let offset = self.entry_offset(index);
        reader
            .seek(SeekFrom::Start(offset))
            .map_err(|source| LoadError::SeekFailed {
                index,
                offset,
                source,
            })?;

        let mut raw = [0u8; PROGRAM_HEADER_SIZE];
        reader.read_exact(&mut raw).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => LoadError::TruncatedProgramHeader(index),
            _ => LoadError::ProgramHeaderRead { index, source: e },
        })?;

        Ok(ProgramHeaderEntry::parse(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn raw_entry(kind: u32, vaddr: u32, file_size: u32, mem_size: u32) -> Vec<u8> {
        let mut raw = Vec::with_capacity(PROGRAM_HEADER_SIZE);
        for word in [kind, 0x100, vaddr, vaddr, file_size, mem_size, 0b101, 0x1000] {
            raw.extend_from_slice(&word.to_le_bytes());
        }
        raw
    }

    fn table(offset: u32, entry_size: u16, count: u16) -> ProgramHeaderTable {
        ProgramHeaderTable::new(&ElfHeader {
            kind: 2,
            machine: 3,
            entry_point: 0,
            ph_offset: offset,
            ph_entry_size: entry_size,
            ph_count: count,
        })
    }

    #[test]
    fn test_parse_entry() {
        let raw: [u8; PROGRAM_HEADER_SIZE] = raw_entry(1, 0x8000, 0x10, 0x30)
            .try_into()
            .unwrap();
        let entry = ProgramHeaderEntry::parse(&raw);

        assert!(entry.is_load());
        assert_eq!(entry.offset, 0x100);
        assert_eq!(entry.virtual_addr, 0x8000);
        assert_eq!(entry.file_size, 0x10);
        assert_eq!(entry.mem_size, 0x30);
        assert_eq!(entry.flags.to_string(), "r-x");
    }

    #[test]
    fn test_unknown_segment_type() {
        let raw: [u8; PROGRAM_HEADER_SIZE] =
            raw_entry(0x6474_e551, 0, 0, 0).try_into().unwrap(); // PT_GNU_STACK
        let entry = ProgramHeaderEntry::parse(&raw);
        assert_eq!(entry.segment_type(), None);
        assert!(!entry.is_load());
    }

    #[test]
    fn test_entries_honor_entry_size() {
        // Entries padded to 40 bytes, table starting at 8.
        let mut bytes = vec![0u8; 8];
        for (i, kind) in [4u32, 1, 2].into_iter().enumerate() {
            bytes.extend(raw_entry(kind, 0x1000 * i as u32, 0, 0));
            bytes.extend([0xEE; 8]);
        }
        let table = table(8, 40, 3);
        let mut cursor = Cursor::new(bytes);

        let kinds: Vec<_> = table
            .indices()
            .map(|i| table.read_entry(&mut cursor, i).unwrap().segment_type())
            .collect();
        assert_eq!(
            kinds,
            [
                Some(SegmentType::Note),
                Some(SegmentType::Load),
                Some(SegmentType::Dynamic)
            ]
        );

        // Re-reading an earlier entry seeks back to it.
        let again = table.read_entry(&mut cursor, 1).unwrap();
        assert_eq!(again.virtual_addr, 0x1000);
    }

    #[test]
    fn test_truncated_entry_reports_index() {
        let mut bytes = raw_entry(1, 0, 0, 0);
        bytes.extend(&raw_entry(1, 0, 0, 0)[..20]);
        let table = table(0, 32, 2);
        let mut cursor = Cursor::new(bytes);

        assert!(table.read_entry(&mut cursor, 0).is_ok());
        assert!(matches!(
            table.read_entry(&mut cursor, 1),
            Err(LoadError::TruncatedProgramHeader(1))
        ));
    }

    #[test]
    fn test_table_past_end_of_file() {
        let table = table(0x1000, 32, 1);
        let mut cursor = Cursor::new(vec![0u8; 64]);
        assert!(matches!(
            table.read_entry(&mut cursor, 0),
            Err(LoadError::TruncatedProgramHeader(0))
        ));
    }
}
