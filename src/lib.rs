pub mod config;
pub mod database;
pub mod errors;
pub mod lifecycle;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod schema;
pub mod sources;
pub mod transform;
pub mod utils;

pub use errors::{EtlError, EtlResult, ErrorKind};
