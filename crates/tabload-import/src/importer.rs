//! Import orchestrator
//!
//! `Importer::run` drives one job end to end:
//!
//! 1. the target table is dropped and recreated without indexes
//! 2. source rows are streamed into a staging file
//! 3. the file is bulk loaded while the target table is write-locked
//! 4. indexes are added once the data is in place
//!
//! Statement logging and client timeouts of both connections are suspended
//! for the whole run and restored on every exit path.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tabload_core::{ClientTimeouts, Connection, SharedConnection, Value};

use crate::definition::{build_table_definition, derive_table_name};
use crate::model::{FieldType, ImportField, ImportIndex, ImportJob, TableDefinition};
use crate::registry::ConnectionRegistry;
use crate::settings::ImportSettings;
use crate::staging::StagingWriter;
use crate::statements::{
    LoadDataOptions, add_index_statements, bulk_load_statement, charset_from_collation,
    create_table_statement, disable_keys_statement, drop_table_statement, enable_keys_statement,
    lock_table_write_statement, row_count_statement, unlock_tables_statement,
};
use crate::{ConfigError, ImportError, Result};

/// Replacements applied on top of a field's settings
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldOverrides {
    pub field_type: Option<FieldType>,
    pub nullable: Option<bool>,
}

/// Outcome of one successful run
#[derive(Debug, Clone)]
pub struct ImportResult {
    /// Snapshot of the job as executed
    pub job: ImportJob,
    pub table: TableDefinition,
    pub staging_path: PathBuf,
    /// Rows written to the staging file
    pub lines_staged: u64,
    /// Rows reported by the target after the bulk load
    pub rows_inserted: u64,
    /// SELECT executed against the source
    pub select_sql: String,
}

/// Runs import jobs against registered connections
pub struct Importer {
    settings: ImportSettings,
    connections: ConnectionRegistry,
}

impl Importer {
    pub fn new(settings: ImportSettings, connections: ConnectionRegistry) -> Self {
        Self {
            settings,
            connections,
        }
    }

    pub fn settings(&self) -> &ImportSettings {
        &self.settings
    }

    pub fn connections(&self) -> &ConnectionRegistry {
        &self.connections
    }

    /// Build a job from the settings of `source_table`.
    ///
    /// The target defaults to `default_connection_target`. Every configured
    /// index whose fields are all part of the job is attached.
    pub fn create_job<S: AsRef<str>>(
        &self,
        source_connection: &str,
        source_table: &str,
        target_connection: Option<&str>,
        origin_fields: &[S],
    ) -> std::result::Result<ImportJob, ConfigError> {
        let target = target_connection
            .or(self.settings.default_connection_target.as_deref())
            .ok_or(ConfigError::EmptyName {
                what: "target connection name",
            })?;
        let table = self.settings.table(source_connection, source_table)?;

        let mut job = ImportJob::new(source_connection, source_table, target)?;
        job.collation = table.collation.clone();
        for origin in origin_fields {
            let field = self.create_field(
                source_connection,
                source_table,
                origin.as_ref(),
                FieldOverrides::default(),
            )?;
            job.add_field(field)?;
        }
        self.update_job_indexes(&mut job, true)?;
        Ok(job)
    }

    /// Build one field from its settings entry
    pub fn create_field(
        &self,
        source_connection: &str,
        source_table: &str,
        origin: &str,
        overrides: FieldOverrides,
    ) -> std::result::Result<ImportField, ConfigError> {
        let settings = self
            .settings
            .table(source_connection, source_table)?
            .fields
            .get(origin)
            .ok_or_else(|| ConfigError::UnknownField {
                connection: source_connection.to_string(),
                table: source_table.to_string(),
                field: origin.to_string(),
            })?;

        let mut field = ImportField::new(
            origin,
            overrides.field_type.unwrap_or(settings.field_type),
            overrides.nullable.unwrap_or(settings.nullable),
        )?
        .with_target_name(settings.name.clone())?;
        field.spec.set_length(settings.length)?;
        field.spec.signed = settings.signed;
        field.spec.default = settings.default.clone();
        field.select = settings.select.clone();
        Ok(field)
    }

    /// Attach configured indexes whose fields are all source fields of `job`.
    ///
    /// Indexes already on the job are left alone. With `keep_unknown` false,
    /// job indexes absent from the settings are removed.
    pub fn update_job_indexes(
        &self,
        job: &mut ImportJob,
        keep_unknown: bool,
    ) -> std::result::Result<(), ConfigError> {
        let table = self
            .settings
            .table(job.source_connection(), job.source_table())?;

        if !keep_unknown {
            let unknown: Vec<String> = job
                .indexes()
                .map(|index| index.name().to_string())
                .filter(|name| !table.indexes.contains_key(name))
                .collect();
            for name in unknown {
                tracing::debug!(index = %name, "removing index unknown to settings");
                job.remove_index(&name);
            }
        }

        for (name, settings) in &table.indexes {
            let fields = settings.fields.normalized();
            let eligible = !fields.is_empty() && fields.iter().all(|(f, _)| job.has_field(f));
            if !eligible || job.has_index(name) {
                continue;
            }
            let mut index = ImportIndex::new(name.clone(), settings.kind)?;
            for (field, length) in fields {
                index.add_field(field, length)?;
            }
            job.add_index(index)?;
        }
        Ok(())
    }

    /// Target table name of `job` under the configured prefix
    pub fn table_name_for(&self, job: &ImportJob) -> std::result::Result<String, ConfigError> {
        derive_table_name(job, &self.settings.table_prefix)
    }

    pub fn prepare_table_definition(
        &self,
        job: &ImportJob,
    ) -> std::result::Result<TableDefinition, ConfigError> {
        build_table_definition(job, &self.settings.table_prefix)
    }

    /// SELECT reading every plain field of `job` from the source
    pub fn source_select_statement(
        &self,
        job: &ImportJob,
        source: &dyn Connection,
    ) -> std::result::Result<String, ConfigError> {
        let columns: Vec<String> = job
            .fields()
            .map(|field| {
                let quoted = source.quote_identifier(field.source_name());
                match &field.select {
                    // used verbatim, aliased to the source name
                    Some(select) => format!("{} {}", select, quoted),
                    None => quoted,
                }
            })
            .collect();
        if columns.is_empty() {
            return Err(ConfigError::NoFields(job.source_table().to_string()));
        }

        let table = match &job.source_schema {
            Some(schema) => format!(
                "{}.{}",
                source.quote_identifier(schema),
                source.quote_identifier(job.source_table())
            ),
            None => source.quote_identifier(job.source_table()),
        };
        let mut sql = format!("SELECT {} FROM {}", columns.join(","), table);
        if let Some(condition) = &job.sql_condition {
            sql.push(' ');
            sql.push_str(condition);
        }
        Ok(sql)
    }

    pub async fn drop_table(
        &self,
        connection: &dyn Connection,
        definition: &TableDefinition,
        error_if_not_exists: bool,
    ) -> Result<()> {
        connection
            .execute(&drop_table_statement(definition, error_if_not_exists))
            .await?;
        Ok(())
    }

    pub async fn create_table(
        &self,
        connection: &dyn Connection,
        definition: &TableDefinition,
    ) -> Result<()> {
        let sql = create_table_statement(definition)?;
        connection.execute(&sql).await?;
        Ok(())
    }

    /// Add every index of `definition`, one statement each
    pub async fn update_table_indexes(
        &self,
        connection: &dyn Connection,
        definition: &TableDefinition,
    ) -> Result<()> {
        for sql in add_index_statements(definition)? {
            connection.execute(&sql).await?;
        }
        Ok(())
    }

    /// Run `job` once.
    ///
    /// The job is copied first; changes made to it afterwards do not affect
    /// the run.
    #[tracing::instrument(
        skip(self, job),
        fields(
            source = %job.source_connection(),
            source_table = %job.source_table(),
            target = %job.target_connection()
        )
    )]
    pub async fn run(&self, job: &ImportJob) -> Result<ImportResult> {
        let mut job = job.clone();
        job.formatting = job.formatting.or(self.settings.formatting()?);

        let source = self.connections.get(job.source_connection())?;
        let target = self.connections.get(job.target_connection())?;
        let _suspension = IoSuspension::begin(&[&source, &target]);

        if let Some(before) = &job.before {
            before(&job).map_err(|source| ImportError::Hook {
                stage: "before",
                source,
            })?;
        }

        let definition = self.prepare_table_definition(&job)?;
        if job.erase_existing {
            self.drop_table(target.as_ref(), &definition, false).await?;
            self.create_table(target.as_ref(), &definition).await?;
            tracing::info!(table = %definition.name, "recreated target table");
        }

        let select_sql = self.source_select_statement(&job, source.as_ref())?;

        let order = job.field_order()?;
        let missing: Vec<String> = job
            .target_names()?
            .into_iter()
            .filter(|name| !order.contains(name))
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::FieldsMissingFromOrder(missing).into());
        }

        std::fs::create_dir_all(&self.settings.temp_file.directory)?;
        let staging_path = self.settings.staging_path(&definition.name);
        match std::fs::remove_file(&staging_path) {
            Ok(()) => tracing::debug!(path = %staging_path.display(), "removed stale staging file"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let lines_staged = self
            .stage(&job, source.as_ref(), &select_sql, &staging_path)
            .await?;
        tracing::info!(path = %staging_path.display(), lines = lines_staged, "staged source rows");

        let rows_inserted = self
            .load(&job, target.as_ref(), &definition, &staging_path, order)
            .await?;
        tracing::info!(table = %definition.name, rows = rows_inserted, "bulk load finished");

        if job.erase_existing {
            self.update_table_indexes(target.as_ref(), &definition)
                .await?;
        }

        if let Some(after) = &job.after {
            after(&job).map_err(|source| ImportError::Hook {
                stage: "after",
                source,
            })?;
        }

        Ok(ImportResult {
            job,
            table: definition,
            staging_path,
            lines_staged,
            rows_inserted,
            select_sql,
        })
    }

    async fn stage(
        &self,
        job: &ImportJob,
        source: &dyn Connection,
        select_sql: &str,
        path: &Path,
    ) -> Result<u64> {
        let mut writer = StagingWriter::new(job, path)?;
        writer.open()?;
        let staged = match source.query_stream(select_sql).await {
            Ok(rows) => writer.write_stream(rows).await,
            Err(e) => Err(e.into()),
        };
        let closed = writer.close();
        let lines = staged?;
        closed?;
        Ok(lines)
    }

    /// Lock, optionally disable keys, bulk load and read back the row count.
    ///
    /// Keys are re-enabled and the lock released even when the load fails.
    async fn load(
        &self,
        job: &ImportJob,
        target: &dyn Connection,
        definition: &TableDefinition,
        path: &Path,
        columns: Vec<String>,
    ) -> Result<u64> {
        let schema = definition.schema.as_deref();
        let options = LoadDataOptions {
            duplicate_strategy: job.duplicate_strategy,
            charset: Some(charset_from_collation(&definition.collation)?),
            delimiter: job.formatting.delimiter,
            enclosure: job.formatting.enclosure,
            escape: job.formatting.escape,
            ignore_lines: 1,
            columns,
            schema: definition.schema.clone(),
        };
        let load_sql = bulk_load_statement(path, &definition.name, &options)?;

        target
            .execute(&lock_table_write_statement(&definition.name, schema))
            .await?;

        let mut keys_disabled = false;
        let loaded = async {
            if job.disable_keys {
                target
                    .execute(&disable_keys_statement(&definition.name, schema))
                    .await?;
                keys_disabled = true;
            }
            target.execute(&load_sql).await?;
            let count = target.query(&row_count_statement()).await?;
            let inserted = count
                .first_value("inserted")
                .and_then(Value::as_i64)
                .unwrap_or(0);
            Ok::<u64, ImportError>(inserted.max(0) as u64)
        }
        .await;

        let mut restored: Result<()> = Ok(());
        if keys_disabled
            && let Err(e) = target
                .execute(&enable_keys_statement(&definition.name, schema))
                .await
        {
            tracing::warn!(table = %definition.name, error = %e, "failed to re-enable keys");
            restored = Err(e.into());
        }
        if let Err(e) = target.execute(&unlock_tables_statement()).await {
            tracing::warn!(table = %definition.name, error = %e, "failed to unlock tables");
            if restored.is_ok() {
                restored = Err(e.into());
            }
        }

        let inserted = loaded?;
        restored?;
        Ok(inserted)
    }
}

/// Statement logging and client timeouts suspended for a run.
///
/// Restored in reverse order when dropped, including on early return and
/// when the run future is cancelled.
struct IoSuspension {
    saved: Vec<(SharedConnection, bool, ClientTimeouts)>,
}

impl IoSuspension {
    fn begin(connections: &[&SharedConnection]) -> Self {
        let mut saved: Vec<(SharedConnection, bool, ClientTimeouts)> = Vec::new();
        for &connection in connections {
            if saved.iter().any(|(c, _, _)| Arc::ptr_eq(c, connection)) {
                continue;
            }
            saved.push((
                connection.clone(),
                connection.sql_logging(),
                connection.timeouts(),
            ));
            connection.set_sql_logging(false);
            connection.set_timeouts(ClientTimeouts::unlimited());
        }
        Self { saved }
    }
}

impl Drop for IoSuspension {
    fn drop(&mut self) {
        for (connection, logging, timeouts) in self.saved.drain(..).rev() {
            connection.set_timeouts(timeouts);
            connection.set_sql_logging(logging);
        }
    }
}
