use std::collections::TryReserveError;
use std::io;

use thiserror::Error;

/// Failures surfaced by the extraction operations.
///
/// Extraction is all-or-nothing: when an operation fails, no partial
/// record is returned and everything built along the way has already
/// been released.
#[derive(Error, Debug)]
pub enum ElfError {
    /// The file does not start with the ELF magic, or is some other
    /// kind of object (an archive, say) that merely wraps ELF data.
    #[error("not an ELF file")]
    NotElf,

    /// The magic matched but the structured metadata behind it could
    /// not be retrieved: truncated header, malformed section header
    /// table, or a reference pointing outside the file.
    #[error("corrupt ELF: {0}")]
    CorruptHeader(String),

    /// A dynamic section is present but its string-table link does not
    /// name a usable section.
    #[error("bad elf: didn't find the dynamic duo")]
    MissingStringTable,

    /// A version-need or version-definition chain offset ran past the
    /// end of its section.
    #[error("version chain truncated: offset {offset} past end of {len}-byte section")]
    TruncatedChain { offset: usize, len: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("allocation failure: {0}")]
    Alloc(#[from] TryReserveError),
}
