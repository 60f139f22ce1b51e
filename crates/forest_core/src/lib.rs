pub mod blob;
pub mod classify;
pub mod core_api;
pub mod envelope;
pub mod error;
pub mod header;
pub mod layout;
pub mod patch;
pub mod reader;
pub mod scan;
pub mod substitute;
pub mod varint;

pub use error::{Error, Result};
