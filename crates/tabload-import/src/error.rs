//! Error types for the import pipeline

use tabload_core::TabloadError;
use thiserror::Error;

/// An invalid job definition or settings entry.
///
/// Always raised before any connection I/O for the affected step.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{what} can not be empty")]
    EmptyName { what: &'static str },

    #[error("a field with source name \"{0}\" already exists")]
    DuplicateField(String),

    #[error("a calculated field with target name \"{0}\" already exists")]
    DuplicateCalculatedField(String),

    #[error("an index named \"{0}\" already exists")]
    DuplicateIndex(String),

    #[error("field \"{field}\" is already part of index \"{index}\"")]
    DuplicateIndexField { index: String, field: String },

    #[error("target name \"{0}\" is used by more than one field")]
    DuplicateTargetName(String),

    #[error("field order references unknown field \"{0}\"")]
    UnknownOrderedField(String),

    #[error("fields missing from the field order: {}", .0.join("; "))]
    FieldsMissingFromOrder(Vec<String>),

    #[error("index \"{index}\" references unknown field \"{field}\"")]
    UnresolvedIndexField { index: String, field: String },

    #[error("index \"{index}\" field \"{field}\" matches both a field and a calculated field")]
    AmbiguousIndexField { index: String, field: String },

    #[error("index \"{0}\" has no fields")]
    EmptyIndex(String),

    #[error("no field defined for source table \"{0}\"")]
    NoFields(String),

    #[error("table name \"{name}\" is {len} characters long, the limit is 64")]
    TableNameTooLong { name: String, len: usize },

    #[error("table prefix \"{prefix}\" is {len} characters long, the limit is 32")]
    TablePrefixTooLong { prefix: String, len: usize },

    #[error("prefix \"{0}\" must be non-empty and contain only alphanumerics and underscores")]
    InvalidPrefix(String),

    #[error("string field \"{0}\" needs a length")]
    MissingLength(String),

    #[error("field \"{field}\" has invalid length {length}")]
    InvalidLength { field: String, length: u32 },

    #[error("field \"{0}\" declares a length, which only string fields accept")]
    UnexpectedLength(String),

    #[error("field \"{0}\" must declare whether it is signed")]
    MissingSigned(String),

    #[error("field \"{0}\" declares signedness, which only integer and float fields accept")]
    UnexpectedSigned(String),

    #[error("default value for field \"{field}\" is not a valid {expected}")]
    InvalidDefault { field: String, expected: &'static str },

    #[error("formatting option {option} must be a single ASCII character, got {value:?}")]
    InvalidFormatting { option: &'static str, value: String },

    #[error("character set \"{0}\" is not supported for bulk load")]
    UnsupportedCharset(String),

    #[error("collation \"{0}\" is not recognized")]
    InvalidCollation(String),

    #[error("unknown field type \"{0}\"")]
    UnknownFieldType(String),

    #[error("unknown index type \"{0}\"")]
    UnknownIndexKind(String),

    #[error("line cleaning returned unknown columns: {}", .0.join(";"))]
    UnknownLineColumns(Vec<String>),

    #[error("no connection named \"{0}\"")]
    UnknownConnection(String),

    #[error("no table \"{table}\" configured for connection \"{connection}\"")]
    UnknownTable { connection: String, table: String },

    #[error("no field \"{field}\" inside table \"{table}\" for connection \"{connection}\"")]
    UnknownField {
        connection: String,
        table: String,
        field: String,
    },

    #[error("failed to parse settings: {0}")]
    Parse(String),
}

/// Errors raised while running an import
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("data error on field \"{field}\" with value {value}: {message}")]
    Data {
        field: String,
        value: String,
        message: String,
    },

    #[error("execution error: {0}")]
    Execution(#[from] TabloadError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("staging file error: {0}")]
    Staging(#[from] csv::Error),

    #[error("{stage} callback failed: {source}")]
    Hook {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("staging writer is {0}")]
    WriterState(&'static str),
}

impl ImportError {
    pub(crate) fn data(
        field: impl Into<String>,
        value: impl std::fmt::Display,
        message: impl Into<String>,
    ) -> Self {
        ImportError::Data {
            field: field.into(),
            value: value.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias for import operations
pub type Result<T> = std::result::Result<T, ImportError>;
