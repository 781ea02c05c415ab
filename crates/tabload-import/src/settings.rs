//! Import settings
//!
//! Settings are read from TOML and validated once, before any job is built
//! from them:
//!
//! ```toml
//! table_prefix = "_tmp_import_"
//!
//! [temp_file]
//! directory = "/var/lib/mysql-files"
//! prefix = "import_"
//!
//! [alias.legacy.tables.customers.fields.id]
//! name = "customer_id"
//! type = "integer"
//! nullable = false
//! signed = false
//!
//! [alias.legacy.tables.customers.indexes.pk]
//! type = "primary"
//! fields = "id"
//! ```

use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::definition::MAX_TABLE_PREFIX_LEN;
use crate::model::{DefaultValue, FieldType, Formatting, IndexKind};
use crate::{ConfigError, ImportError};

/// Prefix used for derived target table names
pub const DEFAULT_TABLE_PREFIX: &str = "_tmp_import_";

/// Longest accepted string column length
pub const MAX_STRING_LENGTH: u32 = 255;

static PREFIX_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Za-z_]+$").expect("valid regex"));

/// Root of the import settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    pub temp_file: TempFileSettings,
    pub table_prefix: String,
    /// Target used when a job does not name one
    pub default_connection_target: Option<String>,
    /// Per source connection table settings
    pub alias: IndexMap<String, ConnectionAlias>,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            temp_file: TempFileSettings::default(),
            table_prefix: DEFAULT_TABLE_PREFIX.to_string(),
            default_connection_target: None,
            alias: IndexMap::new(),
        }
    }
}

/// Location and format of staging files
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TempFileSettings {
    pub directory: PathBuf,
    pub prefix: String,
    pub formatting: FormattingSettings,
}

impl Default for TempFileSettings {
    fn default() -> Self {
        Self {
            directory: std::env::temp_dir().join("tabload"),
            prefix: "import_".to_string(),
            formatting: FormattingSettings::default(),
        }
    }
}

/// Staging formatting as configured; an empty string means unset
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FormattingSettings {
    pub delimiter: Option<String>,
    pub enclosure: Option<String>,
    pub escape_char: Option<String>,
}

impl FormattingSettings {
    pub fn to_formatting(&self) -> Result<Formatting, ConfigError> {
        Ok(Formatting {
            delimiter: single_char("delimiter", self.delimiter.as_deref())?,
            enclosure: single_char("enclosure", self.enclosure.as_deref())?,
            escape: single_char("escape_char", self.escape_char.as_deref())?,
        })
    }
}

fn single_char(option: &'static str, value: Option<&str>) -> Result<Option<char>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (None, _) => Ok(None),
        (Some(c), None) => Ok(Some(c)),
        _ => Err(ConfigError::InvalidFormatting {
            option,
            value: value.to_string(),
        }),
    }
}

/// Tables configured for one source connection
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConnectionAlias {
    #[serde(default)]
    pub tables: IndexMap<String, TableSettings>,
}

/// One source table: its importable fields and indexes
#[derive(Debug, Clone, Deserialize)]
pub struct TableSettings {
    #[serde(default)]
    pub collation: Option<String>,
    /// Keyed by origin (source) field name
    pub fields: IndexMap<String, FieldSettings>,
    #[serde(default)]
    pub indexes: IndexMap<String, IndexSettings>,
}

/// One importable source field
#[derive(Debug, Clone, Deserialize)]
pub struct FieldSettings {
    /// Column name on the target side
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub nullable: bool,
    #[serde(default)]
    pub signed: Option<bool>,
    #[serde(default)]
    pub length: Option<u32>,
    #[serde(default)]
    pub default: Option<DefaultValue>,
    /// Raw select expression replacing the column reference
    #[serde(default)]
    pub select: Option<String>,
}

/// A configured index
#[derive(Debug, Clone, Deserialize)]
pub struct IndexSettings {
    #[serde(rename = "type")]
    pub kind: IndexKind,
    pub fields: IndexFields,
}

/// Index fields in any of the accepted notations
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IndexFields {
    /// `fields = "id"`
    One(String),
    /// `fields = ["a", { field = "b", length = 10 }]`
    Many(Vec<IndexFieldEntry>),
    /// `fields = { a = 0, b = 10 }`
    Lengths(IndexMap<String, u32>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IndexFieldEntry {
    Name(String),
    Detailed {
        field: String,
        #[serde(default)]
        length: u32,
    },
}

impl IndexFields {
    /// Ordered `(origin field, prefix length)` pairs
    pub fn normalized(&self) -> Vec<(String, u32)> {
        match self {
            IndexFields::One(field) => vec![(field.clone(), 0)],
            IndexFields::Many(entries) => entries
                .iter()
                .map(|entry| match entry {
                    IndexFieldEntry::Name(field) => (field.clone(), 0),
                    IndexFieldEntry::Detailed { field, length } => (field.clone(), *length),
                })
                .collect(),
            IndexFields::Lengths(map) => map.iter().map(|(k, v)| (k.clone(), *v)).collect(),
        }
    }
}

impl ImportSettings {
    /// Parse and validate TOML settings
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let settings: Self =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read, parse and validate a TOML settings file
    pub fn from_file(path: &Path) -> Result<Self, ImportError> {
        let content = std::fs::read_to_string(path)?;
        let settings = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), connections = settings.alias.len(), "loaded import settings");
        Ok(settings)
    }

    /// Check every rule a deserialized document can still break
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !PREFIX_PATTERN.is_match(&self.temp_file.prefix) {
            return Err(ConfigError::InvalidPrefix(self.temp_file.prefix.clone()));
        }
        if self.table_prefix.is_empty() {
            return Err(ConfigError::EmptyName {
                what: "table prefix",
            });
        }
        if self.table_prefix.len() > MAX_TABLE_PREFIX_LEN {
            return Err(ConfigError::TablePrefixTooLong {
                prefix: self.table_prefix.clone(),
                len: self.table_prefix.len(),
            });
        }
        self.temp_file.formatting.to_formatting()?;

        for alias in self.alias.values() {
            for (table_name, table) in &alias.tables {
                if table.fields.is_empty() {
                    return Err(ConfigError::NoFields(table_name.clone()));
                }
                for field in table.fields.values() {
                    field.validate()?;
                }
                for (index_name, index) in &table.indexes {
                    if index.fields.normalized().is_empty() {
                        return Err(ConfigError::EmptyIndex(index_name.clone()));
                    }
                }
            }
        }
        Ok(())
    }

    /// Settings of `table` under source connection `connection`
    pub fn table(&self, connection: &str, table: &str) -> Result<&TableSettings, ConfigError> {
        self.alias
            .get(connection)
            .ok_or_else(|| ConfigError::UnknownConnection(connection.to_string()))?
            .tables
            .get(table)
            .ok_or_else(|| ConfigError::UnknownTable {
                connection: connection.to_string(),
                table: table.to_string(),
            })
    }

    /// Staging formatting defaults
    pub fn formatting(&self) -> Result<Formatting, ConfigError> {
        self.temp_file.formatting.to_formatting()
    }

    /// Staging file of the target table `table_name`
    pub fn staging_path(&self, table_name: &str) -> PathBuf {
        self.temp_file
            .directory
            .join(format!("{}{}", self.temp_file.prefix, table_name))
    }
}

impl FieldSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::EmptyName {
                what: "field name",
            });
        }

        if self.field_type.is_numeric() {
            if self.signed.is_none() {
                return Err(ConfigError::MissingSigned(self.name.clone()));
            }
        } else if self.signed.is_some() {
            return Err(ConfigError::UnexpectedSigned(self.name.clone()));
        }

        match (self.field_type, self.length) {
            (FieldType::String, None) => Err(ConfigError::MissingLength(self.name.clone())),
            (FieldType::String, Some(length)) if length == 0 || length > MAX_STRING_LENGTH => {
                Err(ConfigError::InvalidLength {
                    field: self.name.clone(),
                    length,
                })
            }
            (FieldType::String, Some(_)) | (_, None) => Ok(()),
            (_, Some(_)) => Err(ConfigError::UnexpectedLength(self.name.clone())),
        }
    }
}
