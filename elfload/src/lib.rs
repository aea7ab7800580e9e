//! Minimal user-space loader for 32-bit little-endian ELF executables.
//!
//! Loading is a straight pipeline over one [`LoadSession`]:
//!
//! 1. the file header is read and validated ([`header`]),
//! 2. program headers are read one at a time ([`program`]),
//! 3. each `PT_LOAD` segment is copied into its own zeroed region ([`mapper`]),
//! 4. the entry point is located in those regions and called.
//!
//! Every segment region is mapped readable, writable and executable regardless
//! of the segment's own permission bits. Dynamic linking, relocations and
//! ELF64 are not supported.
//!
//! # Usage
//!
//! ```rust,no_run
//! # fn main() -> elfload::LoadResult<()> {
//! // Safety: the program is trusted and built for this host.
//! let value = unsafe { elfload::load_and_run("./sum")? };
//! println!("User _start return value = {value}");
//! # Ok(())
//! # }
//! ```
//!
//! A session can also be driven step by step, for instance to inspect the
//! mapped segments without running anything:
//!
//! ```rust,no_run
//! use elfload::{AnonymousMapper, LoadSession};
//!
//! # fn main() -> elfload::LoadResult<()> {
//! let file = std::fs::File::open("./sum").unwrap();
//! let mut mapper = AnonymousMapper::new();
//! let mut session = LoadSession::new(file, &mut mapper);
//! session.load()?;
//! for segment in session.segments() {
//!     println!("{:#x} -> {:p}", segment.virtual_addr, segment.region.base);
//! }
//! let entry = session.resolve_entry()?;
//! # let _ = entry;
//! # Ok(())
//! # }
//! ```
#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(clippy::pedantic, clippy::nursery)]

mod error;
pub mod header;
mod loader;
pub mod log;
pub mod mapper;
pub mod program;
pub mod segments;

pub use error::{LoadError, LoadResult};
pub use header::ElfHeader;
pub use loader::{LoadSession, transfer_control};
pub use mapper::{AnonymousMapper, MappedRegion, MemoryMapper};
pub use program::{ProgramHeaderEntry, ProgramHeaderTable, SegmentFlags, SegmentType};
pub use segments::{EntryPoint, LoadedSegment};

use std::{fs::File, path::Path};

/// Load the executable at `path` into anonymous memory and call its entry point.
///
/// Returns the value produced by the entry routine. All mappings are released
/// before this function returns, on success and on error.
///
/// # Safety
///
/// Arbitrary code from `path` runs inside the current process. It must be
/// machine code for the host whose entry point behaves as an
/// `extern "C" fn() -> i32`.
///
/// # Errors
///
/// Returns the error of the first failing step; no code from the file runs in
/// that case.
pub unsafe fn load_and_run<P: AsRef<Path>>(path: P) -> LoadResult<i32> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    crate::debug!("Opened {}", path.display());

    let mut mapper = AnonymousMapper::new();
    let mut session = LoadSession::new(file, &mut mapper);
    session.load()?;

    // Safety: forwarded to the caller.
    unsafe { session.launch() }
}
