//! # Address Resolver
//!
//! Turns addresses into `module!symbol` strings.
//!
//! All functions walk tables in the order given and records in file order.
//! Address arithmetic wraps at 32 bits: an address below a module's base
//! yields a huge offset, which simply never matches.

use tracing::trace;

use super::format::{FormattedSymbol, SymbolMatch};
use super::table::ModuleSymbolTable;
use crate::error::ResolveError;
use crate::types::Address;

/// First symbol of `table` located exactly at `address`.
pub fn exact_lookup(table: &ModuleSymbolTable, address: Address) -> Option<SymbolMatch<'_>>
{
    let offset = address - table.base();
    table
        .records()
        .find(|record| record.offset() == offset)
        .map(|record| SymbolMatch { table, record })
}

/// [`exact_lookup`], formatted into `buf`.
///
/// ## Errors
///
/// `NotFound` on a miss, `BufferTooSmall` if the formatted name does not fit.
pub fn exact_lookup_into(table: &ModuleSymbolTable, address: Address, buf: &mut [u8]) -> Result<usize, ResolveError>
{
    let symbol = exact_lookup(table, address).ok_or(ResolveError::NotFound)?;
    symbol.formatted().write_into(buf)
}

/// First exact hit across `tables`.
pub fn global_exact_lookup<'a, I>(tables: I, address: Address) -> Option<SymbolMatch<'a>>
where
    I: IntoIterator<Item = &'a ModuleSymbolTable>,
{
    let found = tables.into_iter().find_map(|table| exact_lookup(table, address));
    if found.is_none() {
        trace!("No exact symbol at {address}");
    }
    found
}

/// Exact lookup across `tables`, formatted into `buf`.
///
/// Every table is tried in order and the first name that fits wins, so a
/// long name in an early table does not hide a shorter one further on.
///
/// ## Errors
///
/// `NotFound` if no table has a symbol at `address`; otherwise
/// `BufferTooSmall` from the first table whose name did not fit.
pub fn global_exact_lookup_into<'a, I>(tables: I, address: Address, buf: &mut [u8]) -> Result<usize, ResolveError>
where
    I: IntoIterator<Item = &'a ModuleSymbolTable>,
{
    let mut too_small = None;
    for table in tables {
        let Some(symbol) = exact_lookup(table, address) else {
            continue;
        };
        match symbol.formatted().write_into(buf) {
            Ok(written) => return Ok(written),
            Err(err) => {
                too_small.get_or_insert(err);
            }
        }
    }

    too_small.map_or_else(
        || {
            trace!("No exact symbol at {address}");
            Err(ResolveError::NotFound)
        },
        Err,
    )
}

/// Closest symbol at or below `address`, and the distance to it.
///
/// Symbols above `address` are ignored. Ties go to the symbol seen first.
///
/// ## Errors
///
/// `NotFound` if no symbol lies at or below `address`, including when there
/// are no tables or no records at all.
pub fn global_nearest_lookup<'a, I>(tables: I, address: Address) -> Result<(SymbolMatch<'a>, u32), ResolveError>
where
    I: IntoIterator<Item = &'a ModuleSymbolTable>,
{
    let mut best: Option<(SymbolMatch<'a>, u32)> = None;

    for table in tables {
        for record in table.records() {
            let symbol = SymbolMatch { table, record };
            let Some(distance) = address.distance_from(symbol.address()) else {
                continue;
            };
            if best.as_ref().is_none_or(|(_, closest)| distance < *closest) {
                best = Some((symbol, distance));
            }
        }
    }

    best.ok_or_else(|| {
        trace!("No symbol at or below {address}");
        ResolveError::NotFound
    })
}

/// Nearest symbol as `module!symbol+0x<distance>`.
///
/// ## Errors
///
/// See [`global_nearest_lookup`].
pub fn formatted_nearest<'a, I>(tables: I, address: Address) -> Result<FormattedSymbol, ResolveError>
where
    I: IntoIterator<Item = &'a ModuleSymbolTable>,
{
    let (symbol, distance) = global_nearest_lookup(tables, address)?;
    Ok(symbol.formatted().with_distance(distance))
}

/// [`formatted_nearest`], written into `buf`.
///
/// ## Errors
///
/// `NotFound` on a miss, `BufferTooSmall` if the formatted name does not fit.
pub fn formatted_nearest_lookup<'a, I>(tables: I, address: Address, buf: &mut [u8]) -> Result<usize, ResolveError>
where
    I: IntoIterator<Item = &'a ModuleSymbolTable>,
{
    formatted_nearest(tables, address)?.write_into(buf)
}
