//! Index model

use indexmap::IndexMap;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

use crate::ConfigError;

/// Kind of index created on the target table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Primary,
    Unique,
    #[serde(rename = "index")]
    Normal,
    Fulltext,
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IndexKind::Primary => "primary",
            IndexKind::Unique => "unique",
            IndexKind::Normal => "index",
            IndexKind::Fulltext => "fulltext",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "primary" => Ok(IndexKind::Primary),
            "unique" => Ok(IndexKind::Unique),
            "index" => Ok(IndexKind::Normal),
            "fulltext" => Ok(IndexKind::Fulltext),
            other => Err(ConfigError::UnknownIndexKind(other.to_string())),
        }
    }
}

/// An index of an import job.
///
/// Fields are keyed by origin name: the source name of a plain field or the
/// target name of a calculated field. A length of 0 indexes the whole column.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportIndex {
    name: String,
    pub kind: IndexKind,
    fields: IndexMap<String, u32>,
}

impl ImportIndex {
    pub fn new(name: impl Into<String>, kind: IndexKind) -> Result<Self, ConfigError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ConfigError::EmptyName { what: "index name" });
        }
        Ok(Self {
            name,
            kind,
            fields: IndexMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &IndexMap<String, u32> {
        &self.fields
    }

    pub fn add_field(&mut self, origin: impl Into<String>, length: u32) -> Result<(), ConfigError> {
        let origin = origin.into();
        if self.fields.contains_key(&origin) {
            return Err(ConfigError::DuplicateIndexField {
                index: self.name.clone(),
                field: origin,
            });
        }
        self.fields.insert(origin, length);
        Ok(())
    }

    /// Builder: add a field
    pub fn with_field(mut self, origin: impl Into<String>, length: u32) -> Result<Self, ConfigError> {
        self.add_field(origin, length)?;
        Ok(self)
    }

    pub fn has_field(&self, origin: &str) -> bool {
        self.fields.contains_key(origin)
    }

    pub fn remove_field(&mut self, origin: &str) {
        self.fields.shift_remove(origin);
    }

    pub fn clear_fields(&mut self) {
        self.fields.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_index_fields_keep_insertion_order() {
        let index = ImportIndex::new("idx_name", IndexKind::Normal)
            .unwrap()
            .with_field("last_name", 0)
            .unwrap()
            .with_field("first_name", 20)
            .unwrap();
        let fields: Vec<_> = index.fields().iter().map(|(k, v)| (k.as_str(), *v)).collect();
        assert_eq!(fields, vec![("last_name", 0), ("first_name", 20)]);
    }

    #[test]
    fn test_duplicate_index_field_fails() {
        let mut index = ImportIndex::new("u", IndexKind::Unique).unwrap();
        index.add_field("email", 0).unwrap();
        assert!(matches!(
            index.add_field("email", 10),
            Err(ConfigError::DuplicateIndexField { .. })
        ));
        index.remove_field("email");
        assert!(!index.has_field("email"));
        index.add_field("email", 10).unwrap();
        index.clear_fields();
        assert!(index.fields().is_empty());
    }

    #[test]
    fn test_index_kind_names() {
        assert_eq!("index".parse::<IndexKind>().unwrap(), IndexKind::Normal);
        assert_eq!(IndexKind::Fulltext.to_string(), "fulltext");
        assert!("spatial".parse::<IndexKind>().is_err());
        assert!(ImportIndex::new("", IndexKind::Primary).is_err());
    }
}
