//! Error types for ELF loading.
use std::{io, path::PathBuf};
use thiserror::Error;

/// Errors that can occur while loading an ELF executable.
///
/// Indices refer to the program-header table entry being processed.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot open `{}`: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("ELF header is truncated")]
    TruncatedHeader,

    #[error("cannot read ELF header: {0}")]
    HeaderRead(#[source] io::Error),

    #[error("not an ELF file (bad magic)")]
    NotElf,

    #[error("unsupported ELF class {0} (expected 32-bit)")]
    UnsupportedClass(u8),

    #[error("unsupported ELF data encoding {0} (expected little-endian)")]
    UnsupportedEndianness(u8),

    #[error("program header entry size {0} is smaller than an ELF32 program header")]
    InvalidProgramHeaderSize(u16),

    #[error("cannot seek to offset {offset:#x} for program header {index}: {source}")]
    SeekFailed {
        index: u16,
        offset: u64,
        #[source]
        source: io::Error,
    },

    #[error("program header {0} is truncated")]
    TruncatedProgramHeader(u16),

    #[error("cannot read program header {index}: {source}")]
    ProgramHeaderRead {
        index: u16,
        #[source]
        source: io::Error,
    },

    #[error("segment {index} has file size {file_size:#x} larger than memory size {mem_size:#x}")]
    InvalidSegment {
        index: u16,
        file_size: u32,
        mem_size: u32,
    },

    #[error("cannot allocate {size:#x} bytes for segment {index}")]
    AllocationFailed { index: u16, size: u32 },

    #[error("cannot read {expected:#x} bytes of segment {index}: {source}")]
    ShortRead {
        index: u16,
        expected: u32,
        #[source]
        source: io::Error,
    },

    #[error("no loadable segment contains the entry point {0:#x}")]
    EntryPointNotFound(u32),
}

pub type LoadResult<T> = Result<T, LoadError>;
