/// Polydict - Multi-Source Dictionary Lookup Service
///
/// Core library resolving words to unified dictionary records from local
/// offline dictionaries, a remote fallback API and a result cache.

pub mod config;
pub mod core;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
