use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand};
use kdsym_core::host::FileSystemHost;
use kdsym_core::types::Address;
use kdsym_core::{Result as KdsymResult, SymbolStore};
use kdsym_utils::{info, init_logging_with, verbosity_level, warn, HostConfig, LogSettings, LoggingError, LoggingGuard};

/// Resolve kernel addresses and symbol names from per-module symbol tables.
#[derive(Parser, Debug)]
#[command(name = "kdsym")]
#[command(version)]
#[command(about = "Resolve kernel addresses and symbol names from per-module symbol tables", long_about = None)]
struct Cli
{
    /// Host configuration file (defaults to $KDSYM_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Module to load, optionally at an explicit base: `driver.sys` or `driver.sys@0x1000`.
    /// Loads every configured module when omitted.
    #[arg(long = "load", value_name = "MODULE[@BASE]", value_parser = parse_load, global = true)]
    loads: Vec<LoadRequest>,

    /// More log output (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Name the symbol located exactly at an address
    Exact
    {
        /// Address (hex format: 0x1010 or decimal)
        #[arg(value_parser = parse_address)]
        address: Address,
    },
    /// Name the closest symbol at or below an address, with its distance
    Nearest
    {
        /// Address (hex format: 0x1025 or decimal)
        #[arg(value_parser = parse_address)]
        address: Address,
    },
    /// Find the address of a symbol (case-insensitive)
    Name
    {
        /// Symbol name without module prefix
        symbol: String,
    },
    /// List loaded symbol tables
    List,
}

#[derive(Debug, Clone)]
struct LoadRequest
{
    module: String,
    base: Option<Address>,
}

fn parse_address(text: &str) -> Result<Address, String>
{
    Address::parse(text).ok_or_else(|| format!("invalid address '{text}' (expected 0x-prefixed hex or decimal)"))
}

fn parse_load(text: &str) -> Result<LoadRequest, String>
{
    match text.rsplit_once('@') {
        Some((module, base)) if !module.is_empty() => Ok(LoadRequest {
            module: module.to_string(),
            base: Some(parse_address(base)?),
        }),
        Some(_) => Err(format!("missing module name in '{text}'")),
        None => Ok(LoadRequest {
            module: text.to_string(),
            base: None,
        }),
    }
}

fn main()
{
    let cli = Cli::parse();

    let _guard = match init_logging_for(&cli) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn init_logging_for(cli: &Cli) -> Result<LoggingGuard, LoggingError>
{
    let mut settings = LogSettings::from_env()?;
    if cli.verbose > 0 {
        settings = settings.with_level(verbosity_level(cli.verbose));
    }
    init_logging_with(settings)
}

fn run_command(cli: Cli) -> KdsymResult<()>
{
    let config = match &cli.config {
        Some(path) => HostConfig::load(path)?,
        None => HostConfig::from_env()?,
    };

    let configured: Vec<String> = config.symbols.keys().cloned().collect();
    let store = SymbolStore::initialize(Arc::new(FileSystemHost::new(config)));

    if cli.loads.is_empty() {
        // Best effort: one stale or missing table should not hide the others.
        for module in &configured {
            if let Err(e) = store.load_symbols(module, None) {
                warn!("Skipping {module}: {e}");
            }
        }
    } else {
        for request in &cli.loads {
            store.load_symbols(&request.module, request.base)?;
        }
    }
    info!("{} symbol tables loaded", store.len());

    let result = execute(&store, &cli.command);
    store.shutdown();
    result
}

fn execute(store: &SymbolStore, command: &Commands) -> KdsymResult<()>
{
    match command {
        Commands::Exact { address } => {
            println!("{}", store.resolve_address_exact(*address)?);
        }
        Commands::Nearest { address } => {
            println!("{}", store.resolve_address_nearest(*address)?);
        }
        Commands::Name { symbol } => {
            println!("{}", store.resolve_name(symbol)?);
        }
        Commands::List => print_tables(store),
    }
    Ok(())
}

fn print_tables(store: &SymbolStore)
{
    let tables = store.tables();
    if tables.is_empty() {
        println!("No symbol tables loaded");
        return;
    }

    println!("{:<6} {:<32} {:<12} {:>8} {:<12} {:>10}", "HANDLE", "MODULE", "BASE", "SYMBOLS", "STAMP", "BYTES");
    for table in tables {
        println!(
            "{:<6} {:<32} {:<12} {:>8} {:<12} {:>10}",
            table.handle.to_string(),
            table.name,
            table.base.to_string(),
            table.record_count,
            format!("{:#010x}", table.stamp),
            table.size
        );
    }
}
