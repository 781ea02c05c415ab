//! Field model

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tabload_core::{Row, Value};

use crate::ConfigError;

/// Logical column type of an imported field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Integer,
    String,
    Text,
    Blob,
    Float,
    Date,
    DateTime,
    Time,
    Boolean,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Integer => "integer",
            FieldType::String => "string",
            FieldType::Text => "text",
            FieldType::Blob => "blob",
            FieldType::Float => "float",
            FieldType::Date => "date",
            FieldType::DateTime => "datetime",
            FieldType::Time => "time",
            FieldType::Boolean => "boolean",
        }
    }

    /// Date, datetime and time
    pub fn is_temporal(&self) -> bool {
        matches!(self, FieldType::Date | FieldType::DateTime | FieldType::Time)
    }

    /// Types whose defaults are given as literal strings
    pub fn is_string_family(&self) -> bool {
        matches!(
            self,
            FieldType::String | FieldType::Text | FieldType::Blob | FieldType::Boolean
        )
    }

    /// Integer and float, the only types carrying signedness
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Float)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "integer" => Ok(FieldType::Integer),
            "string" => Ok(FieldType::String),
            "text" => Ok(FieldType::Text),
            "blob" => Ok(FieldType::Blob),
            "float" => Ok(FieldType::Float),
            "date" => Ok(FieldType::Date),
            "datetime" => Ok(FieldType::DateTime),
            "time" => Ok(FieldType::Time),
            "boolean" => Ok(FieldType::Boolean),
            other => Err(ConfigError::UnknownFieldType(other.to_string())),
        }
    }
}

/// Explicit column default as configured
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    Integer(i64),
    Float(f64),
    String(String),
    #[serde(skip_deserializing)]
    Timestamp(DateTime<Utc>),
}

/// Attributes shared by plain and calculated fields
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    /// Column name on the target side
    pub target_name: String,
    pub field_type: FieldType,
    pub nullable: bool,
    /// Only meaningful for integer and float
    pub signed: Option<bool>,
    /// Only meaningful for string; positive when present
    pub length: Option<u32>,
    pub default: Option<DefaultValue>,
}

impl FieldSpec {
    pub fn new(
        target_name: impl Into<String>,
        field_type: FieldType,
        nullable: bool,
    ) -> Result<Self, ConfigError> {
        let target_name = target_name.into();
        if target_name.is_empty() {
            return Err(ConfigError::EmptyName {
                what: "field target name",
            });
        }
        Ok(Self {
            target_name,
            field_type,
            nullable,
            signed: None,
            length: None,
            default: None,
        })
    }

    pub fn set_length(&mut self, length: Option<u32>) -> Result<(), ConfigError> {
        if length == Some(0) {
            return Err(ConfigError::InvalidLength {
                field: self.target_name.clone(),
                length: 0,
            });
        }
        self.length = length;
        Ok(())
    }
}

/// Cleans one raw value before coercion
pub type FieldCleaning = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Computes a raw value from the whole source row
pub type FieldCompute = Arc<dyn Fn(&Row) -> Value + Send + Sync>;

/// A target column copied from one source column
#[derive(Clone)]
pub struct ImportField {
    source_name: String,
    pub spec: FieldSpec,
    pub cleaning: Option<FieldCleaning>,
    /// Raw select expression used instead of the quoted column reference
    pub select: Option<String>,
}

impl ImportField {
    /// Create a field whose target name equals its source name
    pub fn new(
        source_name: impl Into<String>,
        field_type: FieldType,
        nullable: bool,
    ) -> Result<Self, ConfigError> {
        let source_name = source_name.into();
        if source_name.is_empty() {
            return Err(ConfigError::EmptyName {
                what: "field source name",
            });
        }
        let spec = FieldSpec::new(source_name.clone(), field_type, nullable)?;
        Ok(Self {
            source_name,
            spec,
            cleaning: None,
            select: None,
        })
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn target_name(&self) -> &str {
        &self.spec.target_name
    }

    /// Builder: rename the target column
    pub fn with_target_name(mut self, target_name: impl Into<String>) -> Result<Self, ConfigError> {
        let target_name = target_name.into();
        if target_name.is_empty() {
            return Err(ConfigError::EmptyName {
                what: "field target name",
            });
        }
        self.spec.target_name = target_name;
        Ok(self)
    }

    /// Builder: set the string length
    pub fn with_length(mut self, length: u32) -> Result<Self, ConfigError> {
        self.spec.set_length(Some(length))?;
        Ok(self)
    }

    /// Builder: set signedness
    pub fn with_signed(mut self, signed: bool) -> Self {
        self.spec.signed = Some(signed);
        self
    }

    /// Builder: set an explicit default
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.spec.default = Some(default);
        self
    }

    /// Builder: clean the raw value before coercion
    pub fn with_cleaning(mut self, cleaning: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        self.cleaning = Some(Arc::new(cleaning));
        self
    }

    /// Builder: select expression override
    pub fn with_select(mut self, select: impl Into<String>) -> Self {
        self.select = Some(select.into());
        self
    }
}

impl fmt::Debug for ImportField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportField")
            .field("source_name", &self.source_name)
            .field("spec", &self.spec)
            .field("cleaning", &self.cleaning.is_some())
            .field("select", &self.select)
            .finish()
    }
}

/// A target column computed from the whole source row
#[derive(Clone)]
pub struct CalculatedField {
    pub spec: FieldSpec,
    pub compute: FieldCompute,
}

impl CalculatedField {
    pub fn new(
        target_name: impl Into<String>,
        field_type: FieldType,
        nullable: bool,
        compute: impl Fn(&Row) -> Value + Send + Sync + 'static,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            spec: FieldSpec::new(target_name, field_type, nullable)?,
            compute: Arc::new(compute),
        })
    }

    pub fn target_name(&self) -> &str {
        &self.spec.target_name
    }

    /// Builder: set the string length
    pub fn with_length(mut self, length: u32) -> Result<Self, ConfigError> {
        self.spec.set_length(Some(length))?;
        Ok(self)
    }

    /// Builder: set signedness
    pub fn with_signed(mut self, signed: bool) -> Self {
        self.spec.signed = Some(signed);
        self
    }

    /// Builder: set an explicit default
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.spec.default = Some(default);
        self
    }
}

impl fmt::Debug for CalculatedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalculatedField")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

/// A resolved target column: plain or calculated
#[derive(Debug, Clone)]
pub enum JobField {
    Plain(ImportField),
    Calculated(CalculatedField),
}

impl JobField {
    pub fn spec(&self) -> &FieldSpec {
        match self {
            JobField::Plain(field) => &field.spec,
            JobField::Calculated(field) => &field.spec,
        }
    }

    pub fn target_name(&self) -> &str {
        &self.spec().target_name
    }
}
