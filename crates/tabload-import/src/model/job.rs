//! Import job aggregate

use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::{CalculatedField, ImportField, ImportIndex, JobField};
use crate::ConfigError;
use crate::staging::StagingRecord;

/// Invoked once per run, before or after the pipeline
pub type JobHook = Arc<dyn Fn(&ImportJob) -> anyhow::Result<()> + Send + Sync>;

/// Receives an assembled record and returns replacement values, if any
pub type LineCleaning = Arc<dyn Fn(&StagingRecord) -> Option<StagingRecord> + Send + Sync>;

/// Receives an assembled record; `false` drops the row
pub type LineValidation = Arc<dyn Fn(&StagingRecord) -> bool + Send + Sync>;

/// Behaviour of the bulk load on duplicate keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateStrategy {
    /// Abort the load on a duplicate key
    #[default]
    Fail,
    /// Keep the existing row
    Ignore,
    /// Replace the existing row
    Replace,
}

impl DuplicateStrategy {
    /// Parse a strategy name; anything other than `ignore`/`replace` means fail
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "ignore" => DuplicateStrategy::Ignore,
            "replace" => DuplicateStrategy::Replace,
            _ => DuplicateStrategy::Fail,
        }
    }

    /// Keyword placed in the bulk-load statement
    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            DuplicateStrategy::Fail => None,
            DuplicateStrategy::Ignore => Some("IGNORE"),
            DuplicateStrategy::Replace => Some("REPLACE"),
        }
    }
}

/// Staging-file formatting characters; unset ones fall back to defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Formatting {
    pub delimiter: Option<char>,
    pub enclosure: Option<char>,
    pub escape: Option<char>,
}

impl Formatting {
    pub const DEFAULT_DELIMITER: char = ',';
    pub const DEFAULT_ENCLOSURE: char = '"';
    pub const DEFAULT_ESCAPE: char = '\\';

    /// Fill unset characters from `fallback`
    pub fn or(self, fallback: Formatting) -> Formatting {
        Formatting {
            delimiter: self.delimiter.or(fallback.delimiter),
            enclosure: self.enclosure.or(fallback.enclosure),
            escape: self.escape.or(fallback.escape),
        }
    }

    pub fn delimiter(&self) -> char {
        self.delimiter.unwrap_or(Self::DEFAULT_DELIMITER)
    }

    pub fn enclosure(&self) -> char {
        self.enclosure.unwrap_or(Self::DEFAULT_ENCLOSURE)
    }

    pub fn escape(&self) -> char {
        self.escape.unwrap_or(Self::DEFAULT_ESCAPE)
    }
}

/// One source-table-to-target-table import definition
#[derive(Clone)]
pub struct ImportJob {
    source_connection: String,
    source_table: String,
    target_connection: String,
    fields: IndexMap<String, ImportField>,
    calculated_fields: IndexMap<String, CalculatedField>,
    indexes: IndexMap<String, ImportIndex>,
    field_order: Option<Vec<String>>,
    pub collation: Option<String>,
    pub engine: Option<String>,
    /// Explicit target table name; derived from the job when unset
    pub table_name: Option<String>,
    pub target_schema: Option<String>,
    pub source_schema: Option<String>,
    /// Drop and recreate the target table before loading
    pub erase_existing: bool,
    /// Raw clause appended to the source SELECT
    pub sql_condition: Option<String>,
    pub formatting: Formatting,
    pub duplicate_strategy: DuplicateStrategy,
    pub disable_keys: bool,
    pub before: Option<JobHook>,
    pub after: Option<JobHook>,
    pub line_cleaning: Option<LineCleaning>,
    pub line_validation: Option<LineValidation>,
}

impl ImportJob {
    pub fn new(
        source_connection: impl Into<String>,
        source_table: impl Into<String>,
        target_connection: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let source_connection = source_connection.into();
        let source_table = source_table.into();
        let target_connection = target_connection.into();
        if source_connection.is_empty() {
            return Err(ConfigError::EmptyName {
                what: "source connection name",
            });
        }
        if source_table.is_empty() {
            return Err(ConfigError::EmptyName {
                what: "source table name",
            });
        }
        if target_connection.is_empty() {
            return Err(ConfigError::EmptyName {
                what: "target connection name",
            });
        }
        Ok(Self {
            source_connection,
            source_table,
            target_connection,
            fields: IndexMap::new(),
            calculated_fields: IndexMap::new(),
            indexes: IndexMap::new(),
            field_order: None,
            collation: None,
            engine: None,
            table_name: None,
            target_schema: None,
            source_schema: None,
            erase_existing: true,
            sql_condition: None,
            formatting: Formatting::default(),
            duplicate_strategy: DuplicateStrategy::Fail,
            disable_keys: false,
            before: None,
            after: None,
            line_cleaning: None,
            line_validation: None,
        })
    }

    pub fn source_connection(&self) -> &str {
        &self.source_connection
    }

    pub fn source_table(&self) -> &str {
        &self.source_table
    }

    pub fn target_connection(&self) -> &str {
        &self.target_connection
    }

    // Plain fields, keyed by source name

    pub fn add_field(&mut self, field: ImportField) -> Result<(), ConfigError> {
        let source_name = field.source_name().to_string();
        if self.fields.contains_key(&source_name) {
            return Err(ConfigError::DuplicateField(source_name));
        }
        self.fields.insert(source_name, field);
        Ok(())
    }

    pub fn field(&self, source_name: &str) -> Option<&ImportField> {
        self.fields.get(source_name)
    }

    pub fn field_mut(&mut self, source_name: &str) -> Option<&mut ImportField> {
        self.fields.get_mut(source_name)
    }

    pub fn fields(&self) -> impl Iterator<Item = &ImportField> {
        self.fields.values()
    }

    pub fn has_field(&self, source_name: &str) -> bool {
        self.fields.contains_key(source_name)
    }

    pub fn remove_field(&mut self, source_name: &str) -> Option<ImportField> {
        self.fields.shift_remove(source_name)
    }

    pub fn clear_fields(&mut self) {
        self.fields.clear();
    }

    // Calculated fields, keyed by target name

    pub fn add_calculated_field(&mut self, field: CalculatedField) -> Result<(), ConfigError> {
        let target_name = field.target_name().to_string();
        if self.calculated_fields.contains_key(&target_name) {
            return Err(ConfigError::DuplicateCalculatedField(target_name));
        }
        self.calculated_fields.insert(target_name, field);
        Ok(())
    }

    pub fn calculated_field(&self, target_name: &str) -> Option<&CalculatedField> {
        self.calculated_fields.get(target_name)
    }

    pub fn calculated_fields(&self) -> impl Iterator<Item = &CalculatedField> {
        self.calculated_fields.values()
    }

    pub fn has_calculated_field(&self, target_name: &str) -> bool {
        self.calculated_fields.contains_key(target_name)
    }

    pub fn remove_calculated_field(&mut self, target_name: &str) -> Option<CalculatedField> {
        self.calculated_fields.shift_remove(target_name)
    }

    pub fn clear_calculated_fields(&mut self) {
        self.calculated_fields.clear();
    }

    // Indexes, keyed by name

    pub fn add_index(&mut self, index: ImportIndex) -> Result<(), ConfigError> {
        let name = index.name().to_string();
        if self.indexes.contains_key(&name) {
            return Err(ConfigError::DuplicateIndex(name));
        }
        self.indexes.insert(name, index);
        Ok(())
    }

    pub fn index(&self, name: &str) -> Option<&ImportIndex> {
        self.indexes.get(name)
    }

    pub fn indexes(&self) -> impl Iterator<Item = &ImportIndex> {
        self.indexes.values()
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.indexes.contains_key(name)
    }

    pub fn remove_index(&mut self, name: &str) -> Option<ImportIndex> {
        self.indexes.shift_remove(name)
    }

    pub fn clear_indexes(&mut self) {
        self.indexes.clear();
    }

    /// Target names of plain fields then calculated fields, in declaration order.
    ///
    /// Fails when two fields share a target name.
    pub fn target_names(&self) -> Result<Vec<String>, ConfigError> {
        let mut seen = HashSet::new();
        let names = self
            .fields
            .values()
            .map(|f| f.target_name())
            .chain(self.calculated_fields.values().map(|f| f.target_name()));
        let mut out = Vec::with_capacity(self.fields.len() + self.calculated_fields.len());
        for name in names {
            if !seen.insert(name) {
                return Err(ConfigError::DuplicateTargetName(name.to_string()));
            }
            out.push(name.to_string());
        }
        Ok(out)
    }

    /// Set an explicit target column order
    pub fn set_field_order<I, S>(&mut self, order: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.field_order = Some(order.into_iter().map(Into::into).collect());
    }

    /// Return to the derived column order
    pub fn reset_field_order(&mut self) {
        self.field_order = None;
    }

    pub fn has_explicit_field_order(&self) -> bool {
        self.field_order.is_some()
    }

    /// Explicit order if set, else `target_names`
    pub fn field_order(&self) -> Result<Vec<String>, ConfigError> {
        match &self.field_order {
            Some(order) => Ok(order.clone()),
            None => self.target_names(),
        }
    }

    /// Find the plain or calculated field producing `target_name`
    pub fn job_field(&self, target_name: &str) -> Option<JobField> {
        self.fields
            .values()
            .find(|f| f.target_name() == target_name)
            .cloned()
            .map(JobField::Plain)
            .or_else(|| {
                self.calculated_fields
                    .get(target_name)
                    .cloned()
                    .map(JobField::Calculated)
            })
    }

    /// Resolve the effective column order into fields
    pub fn ordered_fields(&self) -> Result<Vec<JobField>, ConfigError> {
        self.target_names()?;
        self.field_order()?
            .into_iter()
            .map(|name| {
                self.job_field(&name)
                    .ok_or(ConfigError::UnknownOrderedField(name))
            })
            .collect()
    }
}

impl fmt::Debug for ImportJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportJob")
            .field("source_connection", &self.source_connection)
            .field("source_table", &self.source_table)
            .field("target_connection", &self.target_connection)
            .field("fields", &self.fields)
            .field("calculated_fields", &self.calculated_fields)
            .field("indexes", &self.indexes)
            .field("field_order", &self.field_order)
            .field("table_name", &self.table_name)
            .field("erase_existing", &self.erase_existing)
            .field("duplicate_strategy", &self.duplicate_strategy)
            .field("disable_keys", &self.disable_keys)
            .finish_non_exhaustive()
    }
}
