//! Import job model

mod field;
mod index;
mod job;
mod table;

pub use field::*;
pub use index::*;
pub use job::*;
pub use table::*;
