//! Common module for library exports

pub use crate::error::{CorruptTable, KdsymError, LoadError, ResolveError, Result};
pub use crate::host::{FileSystemHost, Mapping, MemoryHost, SymbolHost};
pub use crate::symbols::{short_module_name, ModuleSymbolTable, Snapshot, SymbolFileBuilder, SymbolStore, TableInfo};
pub use crate::types::{Address, MapHandle, PinToken, TableHandle};
