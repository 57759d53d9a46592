//! In-memory symbol host.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{Mapping, SymbolHost};
use crate::types::{Address, MapHandle, PinToken};

/// A resource event recorded by [`MemoryHost`], in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent
{
    Mapped(MapHandle),
    Unmapped(MapHandle),
    Pinned(PinToken),
    Unpinned(PinToken),
}

#[derive(Debug, Clone)]
struct ModuleEntry
{
    name: String,
    base: Address,
    build_identity: u32,
}

#[derive(Default)]
struct State
{
    modules: Vec<ModuleEntry>,
    symbol_files: Vec<(String, PathBuf)>,
    files: HashMap<PathBuf, Arc<[u8]>>,
    refuse_pins: bool,
    next_token: u64,
    live_maps: HashSet<MapHandle>,
    live_pins: HashSet<PinToken>,
    events: Vec<HostEvent>,
}

impl State
{
    fn token(&mut self) -> u64
    {
        self.next_token += 1;
        self.next_token
    }
}

/// A [`SymbolHost`] that keeps modules, configuration and files in memory.
///
/// The host tracks every live mapping and pin, which makes it the reference
/// for checking that loads and unloads release what they acquire.
///
/// ```rust
/// use kdsym_core::host::MemoryHost;
/// use kdsym_core::symbols::SymbolFileBuilder;
/// use kdsym_core::types::Address;
///
/// let host = MemoryHost::new();
/// host.add_module("driver.sys", Address::new(0x1000), 0x5f3a_1c00);
/// host.add_symbol_file(
///     "driver.sys",
///     "/symbols/driver.sym",
///     SymbolFileBuilder::new(0x5f3a_1c00).symbol(0x10, "Init").build(),
/// );
/// ```
#[derive(Default)]
pub struct MemoryHost
{
    state: Mutex<State>,
}

impl MemoryHost
{
    /// Create a host that knows no modules and no files.
    #[must_use]
    pub fn new() -> Self
    {
        Self::default()
    }

    /// Register a loaded module.
    pub fn add_module(&self, name: &str, base: Address, build_identity: u32)
    {
        self.state.lock().modules.push(ModuleEntry {
            name: name.to_string(),
            base,
            build_identity,
        });
    }

    /// Configure `path` as the symbol file of `module_name` and store its contents.
    pub fn add_symbol_file(&self, module_name: &str, path: impl Into<PathBuf>, bytes: Vec<u8>)
    {
        let path = path.into();
        self.set_symbol_path(module_name, path.clone());
        self.add_file(path, bytes);
    }

    /// Configure `path` as the symbol file of `module_name`, whether or not it exists.
    pub fn set_symbol_path(&self, module_name: &str, path: impl Into<PathBuf>)
    {
        let mut state = self.state.lock();
        state.symbol_files.retain(|(name, _)| !name.eq_ignore_ascii_case(module_name));
        state.symbol_files.push((module_name.to_string(), path.into()));
    }

    /// Store file contents without configuring them for any module.
    pub fn add_file(&self, path: impl Into<PathBuf>, bytes: Vec<u8>)
    {
        self.state.lock().files.insert(path.into(), bytes.into());
    }

    /// Make subsequent [`SymbolHost::pin_memory`] calls fail.
    pub fn refuse_pins(&self, refuse: bool)
    {
        self.state.lock().refuse_pins = refuse;
    }

    /// Mappings handed out and not yet released.
    pub fn live_mappings(&self) -> usize
    {
        self.state.lock().live_maps.len()
    }

    /// Pins handed out and not yet released.
    pub fn live_pins(&self) -> usize
    {
        self.state.lock().live_pins.len()
    }

    /// Every map/pin event so far.
    pub fn events(&self) -> Vec<HostEvent>
    {
        self.state.lock().events.clone()
    }
}

impl SymbolHost for MemoryHost
{
    fn locate_module(&self, module_name: &str) -> Option<Address>
    {
        let state = self.state.lock();
        state
            .modules
            .iter()
            .find(|module| module.name.eq_ignore_ascii_case(module_name))
            .map(|module| module.base)
    }

    fn symbol_file_path(&self, module_name: &str) -> Option<PathBuf>
    {
        let state = self.state.lock();
        state
            .symbol_files
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(module_name))
            .map(|(_, path)| path.clone())
    }

    fn map_file(&self, path: &Path) -> Option<Mapping>
    {
        let mut state = self.state.lock();
        let bytes = state.files.get(path)?.clone();
        let handle = MapHandle(state.token());
        state.live_maps.insert(handle);
        state.events.push(HostEvent::Mapped(handle));
        Some(Mapping::new(handle, Box::new(bytes)))
    }

    fn unmap_file(&self, mapping: Mapping)
    {
        let mut state = self.state.lock();
        state.live_maps.remove(&mapping.handle);
        state.events.push(HostEvent::Unmapped(mapping.handle));
    }

    fn pin_memory(&self, _bytes: &[u8]) -> Option<PinToken>
    {
        let mut state = self.state.lock();
        if state.refuse_pins {
            return None;
        }
        let token = PinToken(state.token());
        state.live_pins.insert(token);
        state.events.push(HostEvent::Pinned(token));
        Some(token)
    }

    fn unpin_memory(&self, token: PinToken)
    {
        let mut state = self.state.lock();
        state.live_pins.remove(&token);
        state.events.push(HostEvent::Unpinned(token));
    }

    fn module_build_identity(&self, base: Address) -> Option<u32>
    {
        let state = self.state.lock();
        state
            .modules
            .iter()
            .find(|module| module.base == base)
            .map(|module| module.build_identity)
    }
}
