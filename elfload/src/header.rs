//! ELF32 file header.
use crate::{LoadResult, error::LoadError, program::PROGRAM_HEADER_SIZE};
use std::io::{ErrorKind, Read};

/// Size of the ELF32 file header in bytes.
pub const HEADER_SIZE: usize = 52;

pub const MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];
pub const CLASS_32: u8 = 1;
pub const DATA_LITTLE_ENDIAN: u8 = 1;

const EI_CLASS: usize = 4;
const EI_DATA: usize = 5;

/// The fields of the ELF32 header the loader relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElfHeader {
    /// Object file type (`e_type`)
    pub kind: u16,
    /// Target architecture (`e_machine`)
    pub machine: u16,
    /// Virtual address of the first instruction
    pub entry_point: u32,
    /// File offset of the program-header table
    pub ph_offset: u32,
    /// Size of one program-header table entry
    pub ph_entry_size: u16,
    /// Number of program-header table entries
    pub ph_count: u16,
}

impl ElfHeader {
    /// Read and validate the header from the current position of `reader`.
    ///
    /// The identification bytes are checked in order: magic, class, data encoding.
    ///
    /// # Errors
    ///
    /// Returns `TruncatedHeader` if fewer than [`HEADER_SIZE`] bytes are available,
    /// and `NotElf`, `UnsupportedClass` or `UnsupportedEndianness` for a bad
    /// identification.
    pub fn read_from<R: Read>(reader: &mut R) -> LoadResult<Self> {
        let mut raw = [0u8; HEADER_SIZE];
        reader.read_exact(&mut raw).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => LoadError::TruncatedHeader,
            _ => LoadError::HeaderRead(e),
        })?;

        Self::parse(&raw)
    }

    /// Validate and decode a raw header.
    ///
    /// # Errors
    ///
    /// See [`ElfHeader::read_from`].
    pub fn parse(raw: &[u8; HEADER_SIZE]) -> LoadResult<Self> {
        if raw[..MAGIC.len()] != MAGIC {
            return Err(LoadError::NotElf);
        }
        if raw[EI_CLASS] != CLASS_32 {
            return Err(LoadError::UnsupportedClass(raw[EI_CLASS]));
        }
        if raw[EI_DATA] != DATA_LITTLE_ENDIAN {
            return Err(LoadError::UnsupportedEndianness(raw[EI_DATA]));
        }

        let header = Self {
            kind: le_u16(raw, 16),
            machine: le_u16(raw, 18),
            entry_point: le_u32(raw, 24),
            ph_offset: le_u32(raw, 28),
            ph_entry_size: le_u16(raw, 42),
            ph_count: le_u16(raw, 44),
        };

        if header.ph_count > 0 && usize::from(header.ph_entry_size) < PROGRAM_HEADER_SIZE {
            return Err(LoadError::InvalidProgramHeaderSize(header.ph_entry_size));
        }

        Ok(header)
    }
}

#[must_use]
#[inline]
pub(crate) const fn le_u16(raw: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([raw[offset], raw[offset + 1]])
}

#[must_use]
#[inline]
pub(crate) const fn le_u32(raw: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        raw[offset],
        raw[offset + 1],
        raw[offset + 2],
        raw[offset + 3],
    ])
}
