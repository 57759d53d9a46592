//! # Symbol Hosts
//!
//! The symbol loader never touches the operating system directly. Locating
//! modules, reading configuration, mapping files and pinning memory are the
//! job of a [`SymbolHost`], so that the table format and lookup algorithms
//! can be exercised without a kernel underneath them.
//!
//! ## Implementations
//!
//! - [`MemoryHost`]: everything in memory, with resource accounting and failure
//!   injection. Used by tests and by embedders that already hold the bytes.
//! - [`FileSystemHost`]: JSON configuration, `memmap2` file mappings,
//!   `mlock`-based pinning and PE-header build identities.
//!
//! ## Resource protocol
//!
//! Every successful [`SymbolHost::map_file`] is matched by exactly one
//! [`SymbolHost::unmap_file`], and every successful [`SymbolHost::pin_memory`]
//! by exactly one [`SymbolHost::unpin_memory`], issued before the unmap of the
//! mapping that holds the pinned bytes.

pub mod filesystem;
pub mod memory;

use std::fmt;
use std::path::{Path, PathBuf};

pub use filesystem::FileSystemHost;
pub use memory::MemoryHost;

use crate::types::{Address, MapHandle, PinToken};

/// Bytes of a mapped file. Must stay at a fixed address until unmapped.
pub type MappedBytes = Box<dyn AsRef<[u8]> + Send + Sync>;

/// A file mapping handed out by [`SymbolHost::map_file`].
pub struct Mapping
{
    /// Host token identifying the mapping.
    pub handle: MapHandle,
    bytes: MappedBytes,
}

impl Mapping
{
    /// Wrap mapped bytes under a host token.
    pub fn new(handle: MapHandle, bytes: MappedBytes) -> Self
    {
        Self { handle, bytes }
    }

    /// The mapped file contents.
    pub fn bytes(&self) -> &[u8]
    {
        AsRef::<[u8]>::as_ref(&*self.bytes)
    }
}

impl fmt::Debug for Mapping
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("Mapping")
            .field("handle", &self.handle)
            .field("len", &self.bytes().len())
            .finish()
    }
}

/// Services the symbol loader needs from its environment.
///
/// All methods may be called from any thread; implementations serialise
/// internally if they keep state.
pub trait SymbolHost: Send + Sync
{
    /// Base address of a loaded module, looked up by its full name.
    fn locate_module(&self, module_name: &str) -> Option<Address>;

    /// Symbol file configured for a module, keyed by the full module name.
    fn symbol_file_path(&self, module_name: &str) -> Option<PathBuf>;

    /// Map a symbol file into memory.
    fn map_file(&self, path: &Path) -> Option<Mapping>;

    /// Release a mapping obtained from [`SymbolHost::map_file`].
    fn unmap_file(&self, mapping: Mapping);

    /// Keep `bytes` resident until [`SymbolHost::unpin_memory`].
    fn pin_memory(&self, bytes: &[u8]) -> Option<PinToken>;

    /// Release a pin obtained from [`SymbolHost::pin_memory`].
    fn unpin_memory(&self, token: PinToken);

    /// Build identity recorded in the header of the module loaded at `base`.
    fn module_build_identity(&self, base: Address) -> Option<u32>;
}
