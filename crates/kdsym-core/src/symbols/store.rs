//! # Symbol Store
//!
//! The session-wide collection of loaded symbol tables.
//!
//! ## Concurrency
//!
//! Loading and unloading run in an ordinary thread context and may block on
//! file I/O. Resolution may run in a context that must not block for long,
//! such as a debugger break-in handler. The store serves both:
//!
//! - mutators serialize on a mutex, do their I/O *outside* it and only take it
//!   to publish a new immutable [`Snapshot`]
//! - resolvers clone the current snapshot (one `Arc` clone under a read lock)
//!   and walk it without holding any lock
//!
//! A snapshot keeps every table in it alive. Unloading a table removes it from
//! the store first; its pins and mappings are released once the last snapshot
//! referencing it is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use super::format::SymbolMatch;
use super::names::global_lookup_by_name;
use super::resolve::{formatted_nearest, global_exact_lookup, global_exact_lookup_into, global_nearest_lookup};
use super::table::ModuleSymbolTable;
use crate::error::{LoadError, ResolveError};
use crate::host::SymbolHost;
use crate::types::{Address, TableHandle};

#[derive(Clone)]
struct Entry
{
    handle: TableHandle,
    table: Arc<ModuleSymbolTable>,
}

/// An immutable view of the store at one point in time.
#[derive(Clone)]
pub struct Snapshot
{
    entries: Arc<[Entry]>,
}

impl Default for Snapshot
{
    fn default() -> Self
    {
        Self {
            entries: Arc::from(Vec::new()),
        }
    }
}

impl Snapshot
{
    /// Tables in load order.
    pub fn tables(&self) -> impl Iterator<Item = &ModuleSymbolTable> + Clone
    {
        self.entries.iter().map(|entry| &*entry.table)
    }

    /// Handles and tables in load order.
    pub fn entries(&self) -> impl Iterator<Item = (TableHandle, &ModuleSymbolTable)>
    {
        self.entries.iter().map(|entry| (entry.handle, &*entry.table))
    }

    /// The table registered under `handle`.
    pub fn get(&self, handle: TableHandle) -> Option<&ModuleSymbolTable>
    {
        self.entries()
            .find(|(candidate, _)| *candidate == handle)
            .map(|(_, table)| table)
    }

    /// Number of tables in this snapshot.
    pub fn len(&self) -> usize
    {
        self.entries.len()
    }

    /// True if this snapshot holds no tables.
    pub fn is_empty(&self) -> bool
    {
        self.entries.is_empty()
    }
}

/// Summary of one loaded table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo
{
    pub handle: TableHandle,
    pub name: String,
    pub base: Address,
    pub record_count: usize,
    pub stamp: u32,
    pub size: usize,
}

/// Loaded symbol tables and the queries over them.
///
/// ## Example
///
/// ```rust
/// use std::sync::Arc;
///
/// use kdsym_core::host::MemoryHost;
/// use kdsym_core::symbols::{SymbolFileBuilder, SymbolStore};
/// use kdsym_core::types::Address;
///
/// let host = Arc::new(MemoryHost::new());
/// host.add_module("driver.sys", Address::new(0x1000), 7);
/// host.add_symbol_file(
///     "driver.sys",
///     "driver.sym",
///     SymbolFileBuilder::new(7).symbol(0x10, "Init").symbol(0x40, "Worker").build(),
/// );
///
/// let store = SymbolStore::initialize(host);
/// store.load_symbols("driver.sys", None).unwrap();
///
/// assert_eq!(store.resolve_address_exact(Address::new(0x1010)).unwrap(), "driver!Init");
/// assert_eq!(store.resolve_address_nearest(Address::new(0x1025)).unwrap(), "driver!Init+0x15");
/// assert_eq!(store.resolve_name("worker").unwrap(), Address::new(0x1040));
/// ```
pub struct SymbolStore
{
    host: Arc<dyn SymbolHost>,
    mutation: Mutex<()>,
    current: RwLock<Snapshot>,
    next_handle: AtomicU64,
}

impl SymbolStore
{
    /// Create an empty store that loads through `host`.
    pub fn initialize(host: Arc<dyn SymbolHost>) -> Self
    {
        debug!("Initializing symbol store");
        Self {
            host,
            mutation: Mutex::new(()),
            current: RwLock::new(Snapshot::default()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// The host tables are loaded through.
    pub fn host(&self) -> &Arc<dyn SymbolHost>
    {
        &self.host
    }

    /// The current set of tables.
    pub fn snapshot(&self) -> Snapshot
    {
        self.current.read().clone()
    }

    fn publish(&self, entries: Vec<Entry>)
    {
        *self.current.write() = Snapshot {
            entries: entries.into(),
        };
    }

    /// Load the symbols of `module_name` and add them to the store.
    ///
    /// `base` overrides the module base the host would report. Loading the
    /// same module twice registers two independent tables.
    ///
    /// ## Errors
    ///
    /// Any [`LoadError`]. A failed load leaves the store unchanged and holds
    /// no host resources.
    pub fn load_symbols(&self, module_name: &str, base: Option<Address>) -> Result<TableHandle, LoadError>
    {
        let table = Arc::new(ModuleSymbolTable::load(&self.host, module_name, base)?);
        let handle = TableHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));

        let _guard = self.mutation.lock();
        let mut entries = self.snapshot().entries.to_vec();
        entries.push(Entry { handle, table });
        self.publish(entries);
        debug!("Registered symbol table {handle}");

        Ok(handle)
    }

    /// Remove the table registered under `handle` and release it.
    ///
    /// Returns `false` if no such table is loaded.
    pub fn unload_symbols(&self, handle: TableHandle) -> bool
    {
        let removed = {
            let _guard = self.mutation.lock();
            let mut entries = self.snapshot().entries.to_vec();
            let Some(index) = entries.iter().position(|entry| entry.handle == handle) else {
                debug!("Unload of unknown symbol table {handle}");
                return false;
            };
            let removed = entries.remove(index);
            self.publish(entries);
            removed
        };

        release(removed);
        true
    }

    /// Remove and release every table. Returns how many were loaded.
    pub fn unload_all(&self) -> usize
    {
        let drained = {
            let _guard = self.mutation.lock();
            let drained = self.snapshot().entries.to_vec();
            self.publish(Vec::new());
            drained
        };

        let count = drained.len();
        drained.into_iter().for_each(release);
        if count > 0 {
            info!("Unloaded {count} symbol tables");
        }
        count
    }

    /// End the session: unload everything.
    pub fn shutdown(&self) -> usize
    {
        self.unload_all()
    }

    /// Loaded tables in load order.
    pub fn tables(&self) -> Vec<TableInfo>
    {
        self.snapshot()
            .entries()
            .map(|(handle, table)| TableInfo {
                handle,
                name: table.name().to_string(),
                base: table.base(),
                record_count: table.record_count(),
                stamp: table.stamp(),
                size: table.size(),
            })
            .collect()
    }

    /// Number of tables currently registered.
    pub fn len(&self) -> usize
    {
        self.current.read().len()
    }

    /// True if no table is registered.
    pub fn is_empty(&self) -> bool
    {
        self.current.read().is_empty()
    }

    /// `module!symbol` for the symbol exactly at `address`.
    ///
    /// ## Errors
    ///
    /// `NotFound` if no loaded table has a symbol at `address`.
    pub fn resolve_address_exact(&self, address: Address) -> Result<String, ResolveError>
    {
        let snapshot = self.snapshot();
        let symbol = global_exact_lookup(snapshot.tables(), address).ok_or(ResolveError::NotFound)?;
        Ok(symbol.formatted().into_string())
    }

    /// [`resolve_address_exact`](Self::resolve_address_exact) into a caller buffer.
    ///
    /// Returns the number of bytes written, NUL terminator included.
    ///
    /// ## Errors
    ///
    /// `NotFound` on a miss; `BufferTooSmall` if no matching name fits `buf`
    /// with its terminator, in which case `buf` is left untouched.
    pub fn resolve_address_exact_into(&self, address: Address, buf: &mut [u8]) -> Result<usize, ResolveError>
    {
        let snapshot = self.snapshot();
        global_exact_lookup_into(snapshot.tables(), address, buf)
    }

    /// `module!symbol+0x<distance>` for the closest symbol at or below `address`.
    ///
    /// ## Errors
    ///
    /// `NotFound` if no symbol lies at or below `address`.
    pub fn resolve_address_nearest(&self, address: Address) -> Result<String, ResolveError>
    {
        let snapshot = self.snapshot();
        Ok(formatted_nearest(snapshot.tables(), address)?.into_string())
    }

    /// [`resolve_address_nearest`](Self::resolve_address_nearest) into a caller buffer.
    ///
    /// ## Errors
    ///
    /// `NotFound` on a miss; `BufferTooSmall` if `buf` is too small.
    pub fn resolve_address_nearest_into(&self, address: Address, buf: &mut [u8]) -> Result<usize, ResolveError>
    {
        let snapshot = self.snapshot();
        formatted_nearest(snapshot.tables(), address)?.write_into(buf)
    }

    /// Run `f` on the closest symbol at or below `address`.
    ///
    /// ## Errors
    ///
    /// `NotFound` if no symbol lies at or below `address`.
    pub fn with_nearest<R>(&self, address: Address, f: impl FnOnce(&SymbolMatch<'_>, u32) -> R) -> Result<R, ResolveError>
    {
        let snapshot = self.snapshot();
        let (symbol, distance) = global_nearest_lookup(snapshot.tables(), address)?;
        Ok(f(&symbol, distance))
    }

    /// Address of the first symbol named `name`, compared case-insensitively.
    ///
    /// ## Errors
    ///
    /// `NotFound` if no loaded table has such a symbol.
    pub fn resolve_name(&self, name: &str) -> Result<Address, ResolveError>
    {
        let snapshot = self.snapshot();
        global_lookup_by_name(snapshot.tables(), name).ok_or(ResolveError::NotFound)
    }
}

fn release(entry: Entry)
{
    match Arc::try_unwrap(entry.table) {
        Ok(table) => table.unload(),
        Err(shared) => {
            debug!(
                "Symbol table {} ({}) is still in use; releasing after the last reader",
                entry.handle,
                shared.name()
            );
        }
    }
}
