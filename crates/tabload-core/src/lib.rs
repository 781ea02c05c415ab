//! tabload core - shared abstractions for moving rows between databases
//!
//! This crate provides the traits and types every other tabload crate
//! depends on:
//!
//! - `Connection` - a live database connection able to execute statements,
//!   run buffered queries and stream rows lazily
//! - `Value` / `Row` - raw values as produced by a driver
//! - `ClientTimeouts` - client-side timeout settings a run can widen and restore
//! - `TabloadError` - the error type shared by connections and drivers

mod connection;
mod error;
mod identifier;
mod types;

pub use connection::*;
pub use error::*;
pub use identifier::*;
pub use types::*;
