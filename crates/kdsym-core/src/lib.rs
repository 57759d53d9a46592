//! # kdsym-core
//!
//! Symbol resolution for a kernel debugger.
//!
//! Each loaded kernel module can have a symbol table file: a build-identity
//! stamp followed by `{delta, offset, name}` records. This crate loads those
//! files through a [`SymbolHost`], validates and pins them, and answers:
//!
//! - which symbol is exactly at an address (`driver!Init`)
//! - which symbol is closest below an address (`driver!Init+0x15`)
//! - where a named symbol lives (`worker` -> `0x1040`)
//!
//! ## Hosts
//!
//! - [`host::FileSystemHost`]: real files, `mmap` and `mlock`, configured by
//!   a JSON [`HostConfig`](kdsym_utils::HostConfig)
//! - [`host::MemoryHost`]: everything in memory, with resource accounting
//!
//! ## Why unsafe code is needed
//!
//! Mapping symbol files and locking their pages are raw system calls. The
//! unsafe code is confined to [`host::filesystem`]; everything above the
//! [`SymbolHost`] trait is safe.

#![allow(unsafe_code)] // Required for mmap and mlock in the filesystem host

pub mod error;
pub mod host;
pub mod prelude;
pub mod symbols;
pub mod types;

// Re-export commonly used types
pub use error::{CorruptTable, KdsymError, LoadError, ResolveError, Result};
pub use host::SymbolHost;
pub use symbols::{ModuleSymbolTable, SymbolStore};
pub use types::{Address, TableHandle};
