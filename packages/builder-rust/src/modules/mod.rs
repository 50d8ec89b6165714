//! Built-in transport modules.

pub mod aggregator;
pub mod file;
pub mod http;
#[cfg(feature = "mysql")]
pub mod mysql;
