//! Physical target table, derived from a job

use super::{DefaultValue, FieldType, IndexKind};

/// Collation used when the job sets none
pub const DEFAULT_COLLATION: &str = "utf8_unicode_ci";

/// Storage engine used when the job sets none
pub const DEFAULT_ENGINE: &str = "MyISAM";

/// Longest table name the engine accepts
pub const MAX_TABLE_NAME_LEN: usize = 64;

/// A column of the target table
#[derive(Debug, Clone, PartialEq)]
pub struct TableField {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
    pub length: Option<u32>,
    pub signed: Option<bool>,
    pub default: Option<DefaultValue>,
}

/// An index of the target table, referencing target column names
#[derive(Debug, Clone, PartialEq)]
pub struct TableIndex {
    pub name: String,
    pub kind: IndexKind,
    /// Column name and prefix length, 0 for the whole column
    pub fields: Vec<(String, u32)>,
}

/// Target table definition, built fresh for every run
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    pub name: String,
    pub schema: Option<String>,
    pub collation: String,
    pub engine: String,
    pub fields: Vec<TableField>,
    pub indexes: Vec<TableIndex>,
}

impl TableDefinition {
    pub fn field(&self, name: &str) -> Option<&TableField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }
}
