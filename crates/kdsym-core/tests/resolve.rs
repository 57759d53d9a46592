//! Address and name resolution over a populated store

use std::sync::Arc;

use kdsym_core::error::ResolveError;
use kdsym_core::host::MemoryHost;
use kdsym_core::symbols::{SymbolFileBuilder, SymbolStore};
use kdsym_core::types::Address;

const STAMP: u32 = 0x4a5b_6c7d;

fn store_with(modules: &[(&str, u32, Vec<(u32, &str)>)]) -> SymbolStore
{
    let host = Arc::new(MemoryHost::new());
    for (name, base, symbols) in modules {
        host.add_module(name, Address::new(*base), STAMP);
        let mut builder = SymbolFileBuilder::new(STAMP);
        for (offset, symbol) in symbols {
            builder.push(*offset, symbol);
        }
        host.add_symbol_file(name, format!("/symbols/{name}.sym"), builder.build());
    }

    let store = SymbolStore::initialize(host);
    for (name, _, _) in modules {
        store.load_symbols(name, None).unwrap();
    }
    store
}

fn driver_store() -> SymbolStore
{
    store_with(&[("driver.sys", 0x1000, vec![(0x10, "Init"), (0x40, "Worker")])])
}

#[test]
fn test_driver_scenario()
{
    let store = driver_store();

    assert_eq!(store.resolve_address_exact(Address::new(0x1010)).unwrap(), "driver!Init");
    assert_eq!(store.resolve_address_exact(Address::new(0x1040)).unwrap(), "driver!Worker");
    assert_eq!(store.resolve_address_nearest(Address::new(0x1025)).unwrap(), "driver!Init+0x15");
    assert_eq!(store.resolve_name("worker").unwrap(), Address::new(0x1040));
    assert_eq!(store.resolve_address_nearest(Address::new(0x0ff0)), Err(ResolveError::NotFound));
}

#[test]
fn test_exact_miss()
{
    let store = driver_store();
    assert_eq!(store.resolve_address_exact(Address::new(0x1011)), Err(ResolveError::NotFound));
    assert_eq!(store.resolve_address_exact(Address::new(0x0010)), Err(ResolveError::NotFound));
}

#[test]
fn test_nearest_on_symbol_has_zero_distance()
{
    let store = driver_store();
    assert_eq!(store.resolve_address_nearest(Address::new(0x1010)).unwrap(), "driver!Init+0x0");
    assert_eq!(store.resolve_address_nearest(Address::new(0x1040)).unwrap(), "driver!Worker+0x0");
}

#[test]
fn test_name_round_trip()
{
    let store = driver_store();
    for name in ["Init", "Worker"] {
        let address = store.resolve_name(name).unwrap();
        assert_eq!(store.resolve_address_exact(address).unwrap(), format!("driver!{name}"));
    }
}

#[test]
fn test_nearest_monotonic_between_symbols()
{
    let store = driver_store();
    let mut last = None;
    for value in 0x1010..0x1040 {
        let (name, distance) = store
            .with_nearest(Address::new(value), |symbol, distance| (symbol.to_string(), distance))
            .unwrap();
        assert_eq!(name, "driver!Init");
        assert_eq!(distance, value - 0x1010);
        if let Some(previous) = last {
            assert!(distance > previous);
        }
        last = Some(distance);
    }
}

#[test]
fn test_nearest_ignores_symbols_above_address()
{
    let store = store_with(&[
        ("low.sys", 0x1000, vec![(0x100, "LowFunc")]),
        ("high.sys", 0x2000, vec![(0x0, "HighStart")]),
    ]);

    assert_eq!(store.resolve_address_nearest(Address::new(0x1fff)).unwrap(), "low!LowFunc+0xeff");
    assert_eq!(store.resolve_address_nearest(Address::new(0x2004)).unwrap(), "high!HighStart+0x4");
    assert_eq!(store.resolve_address_nearest(Address::new(0x10ff)), Err(ResolveError::NotFound));
}

#[test]
fn test_nearest_tie_goes_to_first_loaded()
{
    let store = store_with(&[
        ("first.sys", 0x1000, vec![(0x20, "One")]),
        ("second.sys", 0x1010, vec![(0x10, "Two")]),
    ]);

    assert_eq!(store.resolve_address_nearest(Address::new(0x1028)).unwrap(), "first!One+0x8");
    assert_eq!(store.resolve_address_exact(Address::new(0x1020)).unwrap(), "first!One");
}

#[test]
fn test_empty_store()
{
    let store = store_with(&[]);
    assert_eq!(store.resolve_address_exact(Address::new(0x1000)), Err(ResolveError::NotFound));
    assert_eq!(store.resolve_address_nearest(Address::new(u32::MAX)), Err(ResolveError::NotFound));
    assert_eq!(store.resolve_name("Init"), Err(ResolveError::NotFound));
}

#[test]
fn test_table_without_records()
{
    let store = store_with(&[("empty.sys", 0x1000, vec![])]);
    assert_eq!(store.len(), 1);
    assert_eq!(store.resolve_address_nearest(Address::new(0x1000)), Err(ResolveError::NotFound));
    assert_eq!(store.resolve_name(""), Err(ResolveError::NotFound));
}

#[test]
fn test_module_wrapping_past_top_of_address_space()
{
    let store = store_with(&[("wrap.sys", 0xffff_fff0, vec![(0x4, "Top"), (0x20, "Wrapped")])]);

    assert_eq!(store.resolve_address_exact(Address::new(0xffff_fff4)).unwrap(), "wrap!Top");
    assert_eq!(store.resolve_address_exact(Address::new(0x10)).unwrap(), "wrap!Wrapped");
    assert_eq!(store.resolve_address_nearest(Address::new(0x15)).unwrap(), "wrap!Wrapped+0x5");
    assert_eq!(store.resolve_name("wrapped").unwrap(), Address::new(0x10));
}

#[test]
fn test_name_lookup_rules()
{
    let store = store_with(&[
        ("a.sys", 0x1000, vec![(0x10, "Dispatch"), (0x20, "DispatchEx")]),
        ("b.sys", 0x2000, vec![(0x30, "Unique")]),
    ]);

    assert_eq!(store.resolve_name("DISPATCH").unwrap(), Address::new(0x1010));
    assert_eq!(store.resolve_name("unique").unwrap(), Address::new(0x2030));
    assert_eq!(store.resolve_name("Dispat"), Err(ResolveError::NotFound));
    // Stored length is authoritative: the longer query matches "Dispatch" first.
    assert_eq!(store.resolve_name("DispatchEx").unwrap(), Address::new(0x1010));
}

#[test]
fn test_names_display_up_to_nul()
{
    let store = store_with(&[("pad.sys", 0x1000, vec![(0x10, "Init\0\0\0\0")])]);
    assert_eq!(store.resolve_address_exact(Address::new(0x1010)).unwrap(), "pad!Init");
    assert_eq!(store.resolve_name("init").unwrap(), Address::new(0x1010));
}

#[test]
fn test_buffer_sizing()
{
    let store = driver_store();
    let address = Address::new(0x1010);

    let mut small = [0xaau8; 11];
    assert_eq!(
        store.resolve_address_exact_into(address, &mut small),
        Err(ResolveError::BufferTooSmall {
            required: 12,
            capacity: 11
        })
    );
    assert!(small.iter().all(|&b| b == 0xaa));

    let mut exact = [0xaau8; 12];
    assert_eq!(store.resolve_address_exact_into(address, &mut exact), Ok(12));
    assert_eq!(&exact, b"driver!Init\0");

    let mut empty = [];
    assert_eq!(
        store.resolve_address_exact_into(address, &mut empty),
        Err(ResolveError::BufferTooSmall {
            required: 12,
            capacity: 0
        })
    );
}

#[test]
fn test_nearest_buffer_sizing()
{
    let store = driver_store();
    let address = Address::new(0x1025);

    let mut small = [0u8; 16];
    assert_eq!(
        store.resolve_address_nearest_into(address, &mut small),
        Err(ResolveError::BufferTooSmall {
            required: 17,
            capacity: 16
        })
    );

    let mut buf = [0u8; 64];
    let written = store.resolve_address_nearest_into(address, &mut buf).unwrap();
    assert_eq!(written, 17);
    assert_eq!(&buf[..written], b"driver!Init+0x15\0");

    let mut buf = [0u8; 64];
    assert_eq!(
        store.resolve_address_nearest_into(Address::new(0x0ff0), &mut buf),
        Err(ResolveError::NotFound)
    );
}

#[test]
fn test_exact_lookup_skips_names_that_do_not_fit()
{
    let store = store_with(&[
        ("alpha.sys", 0x1000, vec![(0x10, "AVeryLongSymbolNameIndeed")]),
        ("b.sys", 0x1000, vec![(0x10, "X")]),
    ]);

    let mut buf = [0u8; 8];
    assert_eq!(store.resolve_address_exact_into(Address::new(0x1010), &mut buf), Ok(4));
    assert_eq!(&buf[..4], b"b!X\0");

    let mut tiny = [0xaau8; 2];
    assert_eq!(
        store.resolve_address_exact_into(Address::new(0x1010), &mut tiny),
        Err(ResolveError::BufferTooSmall {
            required: 32,
            capacity: 2,
        })
    );
    assert_eq!(tiny, [0xaa; 2]);

    assert_eq!(
        store.resolve_address_exact_into(Address::new(0x1020), &mut buf),
        Err(ResolveError::NotFound)
    );
}

#[test]
fn test_empty_stored_name_matches_any_query()
{
    let store = store_with(&[("e.sys", 0x1000, vec![(0x10, "")])]);

    assert_eq!(store.resolve_name("anything"), Ok(Address::new(0x1010)));
    assert_eq!(store.resolve_name(""), Ok(Address::new(0x1010)));
}
