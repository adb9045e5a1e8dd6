// Adapters layer: concrete implementations of the domain ports.

pub mod csv_source;
pub mod http_provider;
pub mod memory;
pub mod storage;
