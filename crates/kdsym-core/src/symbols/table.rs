//! # Module Symbol Table
//!
//! One loaded symbol file: the mapped, pinned and validated blob plus the
//! module it describes.
//!
//! A table owns its host resources. They are released when the table is
//! dropped, unpin first and unmap second, so every early return in
//! [`ModuleSymbolTable::load`] releases exactly what was acquired before it.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::record::{Records, SymbolBlob};
use crate::error::LoadError;
use crate::host::{Mapping, SymbolHost};
use crate::types::{Address, PinToken};

/// Longest short module name kept, in bytes.
pub const MAX_MODULE_NAME_LEN: usize = 31;

/// Short module name used in `module!symbol` strings.
///
/// Strips any leading directory (either separator) and the last extension,
/// replaces non-ASCII characters with `?` and keeps at most
/// [`MAX_MODULE_NAME_LEN`] bytes.
///
/// ```rust
/// use kdsym_core::symbols::short_module_name;
///
/// assert_eq!(short_module_name("driver.sys"), "driver");
/// assert_eq!(short_module_name(r"\SystemRoot\System32\drivers\tcpip.sys"), "tcpip");
/// assert_eq!(short_module_name("hal"), "hal");
/// ```
pub fn short_module_name(module_name: &str) -> String
{
    let file = module_name.rsplit(['\\', '/']).next().unwrap_or(module_name);
    let stem = file.rfind('.').map_or(file, |dot| &file[..dot]);
    stem.chars()
        .map(|c| if c.is_ascii() { c } else { '?' })
        .take(MAX_MODULE_NAME_LEN)
        .collect()
}

struct TableResources
{
    host: Arc<dyn SymbolHost>,
    mapping: Option<Mapping>,
    pin: Option<PinToken>,
}

impl TableResources
{
    fn bytes(&self) -> &[u8]
    {
        self.mapping.as_ref().map(Mapping::bytes).unwrap_or_default()
    }
}

impl Drop for TableResources
{
    fn drop(&mut self)
    {
        if let Some(pin) = self.pin.take() {
            self.host.unpin_memory(pin);
        }
        if let Some(mapping) = self.mapping.take() {
            self.host.unmap_file(mapping);
        }
    }
}

/// A loaded, validated symbol table for one module.
pub struct ModuleSymbolTable
{
    name: String,
    base: Address,
    stamp: u32,
    extent: usize,
    record_count: usize,
    resources: TableResources,
}

impl ModuleSymbolTable
{
    /// Load the symbol table of `module_name`.
    ///
    /// ## Steps
    ///
    /// 1. Derive the short module name
    /// 2. Take `base`, or ask the host to locate the module
    /// 3. Ask the host for the symbol file path
    /// 4. Map the file
    /// 5. Validate the record walk and compute the table extent
    /// 6. Pin the extent
    /// 7. Compare the table's stamp with the module's build identity
    ///
    /// ## Errors
    ///
    /// - `ModuleNotFound`: no base address, or no build identity at that base
    /// - `ConfigNotFound`: no symbol file configured
    /// - `MapFailed`: the file could not be mapped
    /// - `CorruptTable`: the record walk failed validation
    /// - `PinFailed`: the host refused to pin the table
    /// - `StaleSymbols`: the table belongs to a different build
    pub fn load(host: &Arc<dyn SymbolHost>, module_name: &str, base: Option<Address>) -> Result<Self, LoadError>
    {
        debug!("Loading symbols for '{module_name}'");
        let result = Self::load_inner(host, module_name, base);
        match &result {
            Ok(table) => info!(
                "Loaded {} symbols for {} at {} ({} bytes)",
                table.record_count, table.name, table.base, table.extent
            ),
            Err(err) => warn!("Failed to load symbols for '{module_name}': {err}"),
        }
        result
    }

    fn load_inner(host: &Arc<dyn SymbolHost>, module_name: &str, base: Option<Address>) -> Result<Self, LoadError>
    {
        let name = short_module_name(module_name);

        let base = base
            .or_else(|| host.locate_module(module_name))
            .ok_or_else(|| LoadError::ModuleNotFound(module_name.to_string()))?;

        let path = host
            .symbol_file_path(module_name)
            .ok_or_else(|| LoadError::ConfigNotFound(module_name.to_string()))?;

        let mapping = host.map_file(&path).ok_or_else(|| LoadError::MapFailed(path.clone()))?;
        debug!("Mapped {} ({} bytes)", path.display(), mapping.bytes().len());

        let mut resources = TableResources {
            host: Arc::clone(host),
            mapping: Some(mapping),
            pin: None,
        };

        let (extent, stamp, record_count) = {
            let blob = SymbolBlob::validate(resources.bytes())?;
            (blob.len(), blob.stamp(), blob.record_count())
        };

        let pin = host
            .pin_memory(&resources.bytes()[..extent])
            .ok_or(LoadError::PinFailed { size: extent })?;
        resources.pin = Some(pin);

        let image = host
            .module_build_identity(base)
            .ok_or_else(|| LoadError::ModuleNotFound(format!("{module_name} (no build identity at {base})")))?;
        if image != stamp {
            return Err(LoadError::StaleSymbols {
                module: name,
                base,
                symbols: stamp,
                image,
            });
        }

        Ok(Self {
            name,
            base,
            stamp,
            extent,
            record_count,
            resources,
        })
    }

    /// Unpin, unmap and release the table.
    ///
    /// Same as dropping it; a table still shared by a snapshot is released
    /// the same way when the last reference goes.
    pub fn unload(self)
    {
        drop(self);
    }

    /// Short module name.
    pub fn name(&self) -> &str
    {
        &self.name
    }

    /// Module base address.
    pub fn base(&self) -> Address
    {
        self.base
    }

    /// Build identity stamp of the table.
    pub fn stamp(&self) -> u32
    {
        self.stamp
    }

    /// Number of symbols.
    pub fn record_count(&self) -> usize
    {
        self.record_count
    }

    /// Size of the pinned table in bytes.
    pub fn size(&self) -> usize
    {
        self.extent
    }

    /// The validated table.
    pub fn blob(&self) -> SymbolBlob<'_>
    {
        let bytes = self.resources.bytes().get(..self.extent).unwrap_or_default();
        SymbolBlob::from_validated(bytes, self.stamp, self.record_count)
    }

    /// Records in file order.
    pub fn records(&self) -> Records<'_>
    {
        self.blob().records()
    }
}

impl Drop for ModuleSymbolTable
{
    fn drop(&mut self)
    {
        // Resources are a field, so they are released after this runs.
        info!("Unloading symbol table for {} at {}", self.name, self.base);
    }
}

impl fmt::Debug for ModuleSymbolTable
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("ModuleSymbolTable")
            .field("name", &self.name)
            .field("base", &self.base)
            .field("stamp", &format_args!("{:#010x}", self.stamp))
            .field("records", &self.record_count)
            .field("size", &self.extent)
            .finish_non_exhaustive()
    }
}
