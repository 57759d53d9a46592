//! # Symbols
//!
//! Per-module symbol tables and the queries over them.
//!
//! - [`record`]: the on-disk table format, its validation and record walk
//! - [`table`]: loading one module's table through a [`SymbolHost`](crate::host::SymbolHost)
//! - [`store`]: the session's collection of loaded tables
//! - [`resolve`] and [`names`]: address-to-name and name-to-address queries
//! - [`format`]: `module!symbol` rendering into caller buffers

pub mod format;
pub mod names;
pub mod record;
pub mod resolve;
pub mod store;
pub mod table;

pub use format::{FormattedSymbol, SymbolMatch};
pub use names::{global_lookup_by_name, lookup_by_name, name_matches};
pub use record::{
    Records, SymbolBlob, SymbolFileBuilder, SymbolRecord, MAX_NAME_LEN, MAX_SYMBOL_RECORDS, RECORD_HEADER_SIZE,
    STAMP_SIZE,
};
pub use resolve::{
    exact_lookup, exact_lookup_into, formatted_nearest, formatted_nearest_lookup, global_exact_lookup,
    global_exact_lookup_into, global_nearest_lookup,
};
pub use store::{Snapshot, SymbolStore, TableInfo};
pub use table::{short_module_name, ModuleSymbolTable, MAX_MODULE_NAME_LEN};
