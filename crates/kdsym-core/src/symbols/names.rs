//! # Name Resolver
//!
//! Case-insensitive symbol name lookup.
//!
//! Stored names carry no terminator; their length comes from the record. The
//! query is compared as if it were NUL-terminated, which gives the usual
//! "bounded, case-insensitive compare" behavior:
//!
//! - a shorter query mismatches on its terminator
//! - a stored NUL byte matched by the query's terminator ends the compare
//! - a longer query whose prefix covers the whole stored name matches
//! - an empty stored name compares nothing and matches any query

use tracing::trace;

use super::table::ModuleSymbolTable;
use crate::types::Address;

/// Whether `query` names the stored symbol `stored`.
///
/// ```rust
/// use kdsym_core::symbols::name_matches;
///
/// assert!(name_matches(b"Worker", "worker"));
/// assert!(!name_matches(b"Worker", "work"));
/// assert!(name_matches(b"Init\0pad", "INIT"));
/// ```
pub fn name_matches(stored: &[u8], query: &str) -> bool
{
    let query = query.as_bytes();
    for (i, &byte) in stored.iter().enumerate() {
        let wanted = query.get(i).copied().unwrap_or(0);
        if !byte.eq_ignore_ascii_case(&wanted) {
            return false;
        }
        if byte == 0 {
            return true;
        }
    }
    true
}

/// Address of the first symbol in `table` named `name`.
pub fn lookup_by_name(table: &ModuleSymbolTable, name: &str) -> Option<Address>
{
    table
        .records()
        .find(|record| name_matches(record.name(), name))
        .map(|record| table.base() + record.offset())
}

/// First [`lookup_by_name`] hit across `tables`.
pub fn global_lookup_by_name<'a, I>(tables: I, name: &str) -> Option<Address>
where
    I: IntoIterator<Item = &'a ModuleSymbolTable>,
{
    let found = tables.into_iter().find_map(|table| lookup_by_name(table, name));
    if found.is_none() {
        trace!("No symbol named '{name}'");
    }
    found
}
