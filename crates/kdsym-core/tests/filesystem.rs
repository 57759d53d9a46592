//! End-to-end loading from real files through `FileSystemHost`

use std::fs;
use std::path::Path;
use std::sync::Arc;

use kdsym_core::error::LoadError;
use kdsym_core::host::FileSystemHost;
use kdsym_core::symbols::{SymbolFileBuilder, SymbolStore};
use kdsym_core::types::Address;
use kdsym_utils::{ConfigError, HostConfig};

const STAMP: u32 = 0x6502_0a1b;

fn write_config(dir: &Path, identity: u32) -> HostConfig
{
    let table = SymbolFileBuilder::new(STAMP)
        .symbol(0x10, "Init")
        .symbol(0x40, "Worker")
        .build();
    fs::write(dir.join("driver.sym"), table).unwrap();

    let config = format!(
        r#"{{
            "symbols": {{ "driver.sys": "driver.sym" }},
            "modules": {{ "driver.sys": {{ "base": 4096, "build_identity": {identity} }} }},
            "lock_memory": false
        }}"#
    );
    let path = dir.join("kdsym.json");
    fs::write(&path, config).unwrap();
    HostConfig::load(&path).unwrap()
}

#[test]
fn test_load_and_resolve_from_files()
{
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), STAMP);
    assert_eq!(config.symbol_file("driver.sys"), Some(dir.path().join("driver.sym").as_path()));

    let store = SymbolStore::initialize(Arc::new(FileSystemHost::new(config)));
    let handle = store.load_symbols("driver.sys", None).unwrap();

    assert_eq!(store.resolve_address_exact(Address::new(0x1010)).unwrap(), "driver!Init");
    assert_eq!(store.resolve_address_nearest(Address::new(0x1025)).unwrap(), "driver!Init+0x15");
    assert_eq!(store.resolve_name("WORKER").unwrap(), Address::new(0x1040));

    let tables = store.tables();
    assert_eq!(tables[0].size, 4 + 12 + 14 + 4);

    assert!(store.unload_symbols(handle));
    assert!(store.is_empty());
}

#[test]
fn test_stale_file_is_rejected()
{
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), STAMP + 1);
    let store = SymbolStore::initialize(Arc::new(FileSystemHost::new(config)));

    assert!(matches!(
        store.load_symbols("driver.sys", None),
        Err(LoadError::StaleSymbols { symbols: STAMP, .. })
    ));
    assert!(store.is_empty());
}

#[test]
fn test_missing_symbol_file()
{
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), STAMP);
    fs::remove_file(dir.path().join("driver.sym")).unwrap();
    let store = SymbolStore::initialize(Arc::new(FileSystemHost::new(config)));

    assert!(matches!(
        store.load_symbols("driver.sys", None),
        Err(LoadError::MapFailed(_))
    ));
}

#[test]
fn test_unconfigured_module()
{
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), STAMP);
    let store = SymbolStore::initialize(Arc::new(FileSystemHost::new(config)));

    assert_eq!(
        store.load_symbols("hal.dll", Some(Address::new(0x2000))),
        Err(LoadError::ConfigNotFound("hal.dll".to_string()))
    );
}

#[test]
fn test_missing_config_file()
{
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        HostConfig::load(&dir.path().join("absent.json")),
        Err(ConfigError::Io { .. })
    ));
}
