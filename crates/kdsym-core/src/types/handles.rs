//! Opaque handles exchanged with hosts and callers.

use std::fmt;

/// Identifies one registered symbol table in a [`SymbolStore`](crate::SymbolStore).
///
/// Module names are not unique (the same module may be loaded twice), so
/// unloading goes through the handle returned by the load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableHandle(pub u64);

impl fmt::Display for TableHandle
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "#{}", self.0)
    }
}

/// Host-issued token for a file mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MapHandle(pub u64);

/// Host-issued token for a pinned memory range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PinToken(pub u64);
