//! Bulk import pipeline
//!
//! Moves the rows of one source table into a target MySQL table:
//!
//! - `model` - the job description (fields, calculated fields, indexes, callbacks)
//! - `definition` - derives the physical target table from a job
//! - `statements` - DDL/DML text generation
//! - `coercion` - per-type conversion of raw values into staging values
//! - `staging` - writes coerced rows into the delimited staging file
//! - `importer` - runs drop, create, stage, lock, load, unlock and index in order

pub mod coercion;
pub mod definition;
mod error;
pub mod importer;
pub mod model;
mod registry;
pub mod settings;
pub mod staging;
pub mod statements;

pub use coercion::{StagingValue, convert};
pub use definition::{build_table_definition, derive_table_name};
pub use error::{ConfigError, ImportError, Result};
pub use importer::{FieldOverrides, ImportResult, Importer};
pub use model::*;
pub use registry::ConnectionRegistry;
pub use settings::ImportSettings;
pub use staging::{StagingRecord, StagingWriter};
