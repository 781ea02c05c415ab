//! Building the physical target table from an import job

use crate::model::{
    DEFAULT_COLLATION, DEFAULT_ENGINE, ImportJob, MAX_TABLE_NAME_LEN, TableDefinition, TableField,
    TableIndex,
};
use crate::ConfigError;

/// Longest accepted table-name prefix
pub const MAX_TABLE_PREFIX_LEN: usize = 32;

/// Target table name of `job`.
///
/// The explicit name when set, else `prefix` followed by the md5 of the source
/// table name concatenated with the `-`-joined target names.
pub fn derive_table_name(job: &ImportJob, prefix: &str) -> Result<String, ConfigError> {
    let name = match &job.table_name {
        Some(name) => name.clone(),
        None => {
            let targets = job.target_names()?;
            if targets.is_empty() {
                return Err(ConfigError::NoFields(job.source_table().to_string()));
            }
            if prefix.len() > MAX_TABLE_PREFIX_LEN {
                return Err(ConfigError::TablePrefixTooLong {
                    prefix: prefix.to_string(),
                    len: prefix.len(),
                });
            }
            let digest = md5::compute(format!("{}{}", job.source_table(), targets.join("-")));
            format!("{}{:x}", prefix, digest)
        }
    };

    if name.len() > MAX_TABLE_NAME_LEN {
        return Err(ConfigError::TableNameTooLong {
            len: name.len(),
            name,
        });
    }
    Ok(name)
}

/// Build the target table of `job`: columns in the effective field order,
/// indexes with origin names resolved to target names.
pub fn build_table_definition(job: &ImportJob, prefix: &str) -> Result<TableDefinition, ConfigError> {
    let name = derive_table_name(job, prefix)?;

    let fields: Vec<TableField> = job
        .ordered_fields()?
        .iter()
        .map(|field| {
            let spec = field.spec();
            TableField {
                name: spec.target_name.clone(),
                field_type: spec.field_type,
                nullable: spec.nullable,
                length: spec.length,
                signed: spec.signed,
                default: spec.default.clone(),
            }
        })
        .collect();

    let mut indexes = Vec::new();
    for index in job.indexes() {
        let mut resolved = Vec::with_capacity(index.fields().len());
        for (origin, length) in index.fields() {
            let plain = job.field(origin).map(|f| f.target_name());
            let calculated = job.calculated_field(origin).map(|f| f.target_name());
            let target = match (plain, calculated) {
                (Some(_), Some(_)) => {
                    return Err(ConfigError::AmbiguousIndexField {
                        index: index.name().to_string(),
                        field: origin.clone(),
                    });
                }
                (Some(target), None) | (None, Some(target)) => target.to_string(),
                (None, None) => {
                    return Err(ConfigError::UnresolvedIndexField {
                        index: index.name().to_string(),
                        field: origin.clone(),
                    });
                }
            };
            resolved.push((target, *length));
        }
        indexes.push(TableIndex {
            name: index.name().to_string(),
            kind: index.kind,
            fields: resolved,
        });
    }

    tracing::debug!(
        table = %name,
        fields = fields.len(),
        indexes = indexes.len(),
        "built table definition"
    );

    Ok(TableDefinition {
        name,
        schema: job.target_schema.clone(),
        collation: job
            .collation
            .clone()
            .unwrap_or_else(|| DEFAULT_COLLATION.to_string()),
        engine: job
            .engine
            .clone()
            .unwrap_or_else(|| DEFAULT_ENGINE.to_string()),
        fields,
        indexes,
    })
}
