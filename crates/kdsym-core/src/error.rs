//! # Error Types
//!
//! Error handling for symbol loading and resolution.
//!
//! We use `thiserror` to automatically generate `Error` trait implementations
//! and nice error messages.
//!
//! Load errors are fatal to a single load attempt only; every resource the
//! attempt acquired has been released by the time the error is returned.
//! Resolution errors are ordinary outcomes: a miss is expected and common.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::Address;

/// Why a symbol blob failed validation
///
/// Offsets are byte positions from the start of the blob (the build-identity
/// stamp is at offset 0, the first record at offset 4).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CorruptTable
{
    /// The blob is too short to hold the build-identity stamp
    #[error("blob is shorter than the build-identity stamp")]
    TooShort,

    /// A record's delta field lies (partly) outside the mapped file
    ///
    /// This is what a missing zero-delta terminator looks like: the walk
    /// reaches the end of the mapping without finding the end of the table.
    #[error("record at offset {offset:#x} is cut off by the end of the file")]
    TruncatedRecord
    {
        /// Offset of the record that could not be read
        offset: usize,
    },

    /// A non-zero delta smaller than the record header
    ///
    /// Such a record would have a negative name length, and a delta below the
    /// header size can never advance the walk past the header it just read.
    #[error("record at offset {offset:#x} has delta {delta:#x}, smaller than its header")]
    DeltaTooSmall
    {
        /// Offset of the offending record
        offset: usize,
        /// The delta stored in the record
        delta: u32,
    },

    /// A record's delta points past the end of the mapped file
    #[error("record at offset {offset:#x} with delta {delta:#x} runs past the end of the file")]
    RecordOverrun
    {
        /// Offset of the offending record
        offset: usize,
        /// The delta stored in the record
        delta: u32,
    },

    /// More records than any sane symbol table carries
    #[error("more than {limit} records without a terminator")]
    TooManyRecords
    {
        /// The record limit that was exceeded
        limit: usize,
    },
}

/// Failure to load a module's symbol table
///
/// ## Error Categories
///
/// 1. **Lookup errors**: ModuleNotFound, ConfigNotFound
/// 2. **Resource errors**: MapFailed, PinFailed
/// 3. **Content errors**: CorruptTable, StaleSymbols
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError
{
    /// The module is not loaded, or its base address could not be determined
    ///
    /// This happens when:
    /// - No base address was supplied and the host cannot locate the module
    /// - The host cannot read the build identity of the module at that base
    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    /// No symbol file is configured for the module
    #[error("No symbol file configured for {0}")]
    ConfigNotFound(String),

    /// The host could not map the symbol file
    #[error("Failed to map symbol file {}", .0.display())]
    MapFailed(PathBuf),

    /// The host refused to pin the mapped table
    #[error("Failed to pin {size:#x} bytes of symbol data")]
    PinFailed
    {
        /// Number of bytes that were to be pinned
        size: usize,
    },

    /// The symbol file is not a well-formed table
    #[error("Corrupt symbol table: {0}")]
    CorruptTable(#[from] CorruptTable),

    /// The symbol file was built for a different build of the module
    ///
    /// ## Solution
    ///
    /// Regenerate the symbol file from the module binary that is actually loaded.
    #[error("Stale symbols for {module} at {base}: symbol stamp {symbols:#010x}, module stamp {image:#010x}")]
    StaleSymbols
    {
        /// Short module name
        module: String,
        /// Module base address
        base: Address,
        /// Build identity stored in the symbol file
        symbols: u32,
        /// Build identity reported for the loaded module
        image: u32,
    },
}

/// Failure to resolve an address or name
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveError
{
    /// No loaded table knows the address or name
    #[error("Symbol not found")]
    NotFound,

    /// The caller's buffer cannot hold the formatted symbol and its terminator
    ///
    /// Nothing was written; retry with at least `required` bytes.
    #[error("Buffer too small: {required} bytes required, {capacity} available")]
    BufferTooSmall
    {
        /// Bytes needed, terminator included
        required: usize,
        /// Bytes the caller offered
        capacity: usize,
    },
}

/// Umbrella error for kdsym operations
#[derive(Error, Debug)]
pub enum KdsymError
{
    /// Loading a symbol table failed
    #[error(transparent)]
    Load(#[from] LoadError),

    /// Resolving an address or name failed
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Reading the host configuration failed
    #[error(transparent)]
    Config(#[from] kdsym_utils::ConfigError),
}

/// Convenience type alias for `Result<T, KdsymError>`
///
/// ```rust
/// use kdsym_core::error::Result;
/// fn foo() -> Result<()>
/// {
///     Ok(())
/// }
/// ```
pub type Result<T> = std::result::Result<T, KdsymError>;
