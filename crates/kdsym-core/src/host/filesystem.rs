//! # Filesystem Symbol Host
//!
//! A [`SymbolHost`] driven by a [`HostConfig`]:
//!
//! - module bases and symbol file paths come from the configuration
//! - symbol files are mapped read-only with `memmap2`
//! - pinning uses `mlock(2)` / `munlock(2)` unless `lock_memory` is off
//! - build identities come from the configuration or from the
//!   `TimeDateStamp` field of the module's PE image, read with `object`
//!
//! ## Why unsafe code is needed
//!
//! Mapping a file and locking pages are both operations the compiler cannot
//! check: another process may truncate a mapped file, and `mlock` takes a raw
//! pointer. The mapping is kept alive for as long as any pin on it exists.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use kdsym_utils::HostConfig;
use memmap2::Mmap;
use object::read::pe::{ImageNtHeaders as _, PeFile32, PeFile64};
use object::LittleEndian;
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{Mapping, SymbolHost};
use crate::types::{Address, MapHandle, PinToken};

#[derive(Debug, Clone, Copy)]
struct PinnedRange
{
    address: usize,
    len: usize,
    locked: bool,
}

/// Symbol host backed by real files.
pub struct FileSystemHost
{
    config: HostConfig,
    next_token: AtomicU64,
    pins: Mutex<HashMap<PinToken, PinnedRange>>,
}

impl FileSystemHost
{
    /// Create a host over a loaded configuration.
    pub fn new(config: HostConfig) -> Self
    {
        Self {
            config,
            next_token: AtomicU64::new(1),
            pins: Mutex::new(HashMap::new()),
        }
    }

    /// The configuration this host answers from.
    pub fn config(&self) -> &HostConfig
    {
        &self.config
    }

    fn token(&self) -> u64
    {
        self.next_token.fetch_add(1, Ordering::Relaxed)
    }

    fn image_identity(path: &Path) -> Option<u32>
    {
        match fs::read(path) {
            Ok(data) => {
                let stamp = pe_time_date_stamp(&data);
                if stamp.is_none() {
                    warn!("{} is not a PE image", path.display());
                }
                stamp
            }
            Err(err) => {
                warn!("Failed to read module image {}: {err}", path.display());
                None
            }
        }
    }
}

impl SymbolHost for FileSystemHost
{
    fn locate_module(&self, module_name: &str) -> Option<Address>
    {
        self.config.module(module_name).map(|module| Address::new(module.base))
    }

    fn symbol_file_path(&self, module_name: &str) -> Option<PathBuf>
    {
        self.config.symbol_file(module_name).map(Path::to_path_buf)
    }

    fn map_file(&self, path: &Path) -> Option<Mapping>
    {
        let mapped = File::open(path).and_then(|file| {
            // SAFETY: the mapping is read-only and symbol files are owned by the
            // system; nothing truncates them while the debugger runs.
            unsafe { Mmap::map(&file) }
        });
        match mapped {
            Ok(mmap) => {
                let handle = MapHandle(self.token());
                debug!("Mapped {} ({} bytes) as {:?}", path.display(), mmap.len(), handle);
                Some(Mapping::new(handle, Box::new(mmap)))
            }
            Err(err) => {
                warn!("Failed to map {}: {err}", path.display());
                None
            }
        }
    }

    fn unmap_file(&self, mapping: Mapping)
    {
        debug!("Unmapping {:?}", mapping.handle);
        drop(mapping);
    }

    fn pin_memory(&self, bytes: &[u8]) -> Option<PinToken>
    {
        let range = PinnedRange {
            address: bytes.as_ptr() as usize,
            len: bytes.len(),
            locked: self.config.lock_memory,
        };

        if range.locked {
            // SAFETY: `bytes` is a live borrow, so the range is mapped.
            let rc = unsafe { libc::mlock(bytes.as_ptr().cast(), bytes.len()) };
            if rc != 0 {
                warn!("mlock of {} bytes failed: {}", bytes.len(), io::Error::last_os_error());
                return None;
            }
        }

        let token = PinToken(self.token());
        self.pins.lock().insert(token, range);
        Some(token)
    }

    fn unpin_memory(&self, token: PinToken)
    {
        let Some(range) = self.pins.lock().remove(&token) else {
            warn!("Unpin of unknown token {:?}", token);
            return;
        };
        if range.locked {
            // SAFETY: the range was locked by `pin_memory` and its mapping is
            // released only after this unpin.
            let rc = unsafe { libc::munlock(range.address as *const libc::c_void, range.len) };
            if rc != 0 {
                warn!("munlock of {} bytes failed: {}", range.len, io::Error::last_os_error());
            }
        }
    }

    fn module_build_identity(&self, base: Address) -> Option<u32>
    {
        let module = self.config.modules.values().find(|module| module.base == base.value())?;
        if let Some(identity) = module.build_identity {
            return Some(identity);
        }
        module.image.as_deref().and_then(Self::image_identity)
    }
}

/// `FileHeader.TimeDateStamp` of a PE32 or PE32+ image.
pub fn pe_time_date_stamp(data: &[u8]) -> Option<u32>
{
    if let Ok(file) = PeFile32::parse(data) {
        return Some(file.nt_headers().file_header().time_date_stamp.get(LittleEndian));
    }
    PeFile64::parse(data)
        .ok()
        .map(|file| file.nt_headers().file_header().time_date_stamp.get(LittleEndian))
}
