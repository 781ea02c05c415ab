//! Integration tests for Importer
//!
//! Runs whole jobs against recording MockConnections and checks the staging
//! file and the statement sequence sent to the target.

mod common;

use indoc::indoc;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tabload_core::Connection;
use tabload_import::{
    ConfigError, ConnectionRegistry, FieldType, ImportError, ImportField, ImportIndex, ImportJob,
    ImportSettings, Importer, IndexKind,
};
use tempfile::TempDir;

use common::{MockConnection, customer_rows};

struct Fixture {
    _dir: TempDir,
    source: Arc<MockConnection>,
    target: Arc<MockConnection>,
    importer: Importer,
}

fn fixture(source: MockConnection, target: MockConnection) -> Fixture {
    let dir = TempDir::new().unwrap();
    let mut settings = ImportSettings::default();
    settings.temp_file.directory = dir.path().join("staging");

    let source = Arc::new(source);
    let target = Arc::new(target);
    let registry = ConnectionRegistry::new()
        .with("legacy", source.clone() as Arc<dyn Connection>)
        .with("warehouse", target.clone() as Arc<dyn Connection>);
    Fixture {
        _dir: dir,
        source,
        target,
        importer: Importer::new(settings, registry),
    }
}

fn default_fixture() -> Fixture {
    fixture(
        MockConnection::new("legacy").with_rows(customer_rows()),
        MockConnection::new("warehouse").with_inserted(2),
    )
}

fn customers_job() -> ImportJob {
    let mut job = ImportJob::new("legacy", "customers", "warehouse").unwrap();
    job.add_field(
        ImportField::new("id", FieldType::Integer, false)
            .unwrap()
            .with_signed(true),
    )
    .unwrap();
    job.add_field(
        ImportField::new("full_name", FieldType::String, true)
            .unwrap()
            .with_target_name("name")
            .unwrap()
            .with_length(20)
            .unwrap(),
    )
    .unwrap();
    job.table_name = Some("customers_import".to_string());
    job
}

// ============ run Tests ============

#[tokio::test]
async fn run_stages_rows_and_loads_them() {
    let fx = default_fixture();
    let mut job = customers_job();
    job.add_index(
        ImportIndex::new("uniq_id", IndexKind::Unique)
            .unwrap()
            .with_field("id", 0)
            .unwrap(),
    )
    .unwrap();

    let result = fx.importer.run(&job).await.expect("import should succeed");

    assert_eq!(result.lines_staged, 2);
    assert_eq!(result.rows_inserted, 2);
    assert_eq!(result.select_sql, "SELECT `id`,`full_name` FROM `customers`");
    assert_eq!(fx.source.log(), vec![result.select_sql.clone()]);

    let staged = std::fs::read_to_string(&result.staging_path).unwrap();
    assert_eq!(
        staged,
        indoc! {r#"
            id,name
            1,Alice
            2,\N
        "#}
    );
    assert!(
        result
            .staging_path
            .ends_with("staging/import_customers_import")
    );

    let log = fx.target.log();
    assert_eq!(log.len(), 7, "unexpected statements: {:?}", log);
    assert_eq!(log[0], "DROP TABLE IF EXISTS `customers_import`");
    assert!(log[1].starts_with("CREATE TABLE `customers_import`("));
    assert_eq!(log[2], "LOCK TABLES `customers_import` WRITE");
    assert!(log[3].starts_with("LOAD DATA INFILE '"));
    assert!(log[3].contains("INTO TABLE `customers_import` CHARACTER SET utf8 FIELDS"));
    assert!(log[3].ends_with("IGNORE 1 LINES (`id`,`name`)"));
    assert_eq!(log[4], "SELECT ROW_COUNT() inserted");
    assert_eq!(log[5], "UNLOCK TABLES");
    assert_eq!(
        log[6],
        "ALTER TABLE `customers_import` ADD UNIQUE INDEX `uniq_id`(`id`)"
    );
}

#[tokio::test]
async fn run_suspends_logging_and_timeouts() {
    let fx = default_fixture();
    let before = fx.target.timeouts();

    fx.importer.run(&customers_job()).await.unwrap();

    assert!(fx.target.logging_seen().iter().all(|on| !on));
    assert!(fx.source.logging_seen().iter().all(|on| !on));
    assert!(fx.target.sql_logging());
    assert!(fx.source.sql_logging());
    assert_eq!(fx.target.timeouts(), before);
    assert!(!fx.source.timeouts().is_unlimited());
}

#[tokio::test]
async fn run_pairs_disable_and_enable_keys() {
    let fx = default_fixture();
    let mut job = customers_job();
    job.disable_keys = true;

    fx.importer.run(&job).await.unwrap();

    let lock = fx.target.position("LOCK TABLES").unwrap();
    let disable = fx.target.position("ALTER TABLE `customers_import` DISABLE KEYS").unwrap();
    let load = fx.target.position("LOAD DATA").unwrap();
    let enable = fx.target.position("ALTER TABLE `customers_import` ENABLE KEYS").unwrap();
    let unlock = fx.target.position("UNLOCK TABLES").unwrap();
    assert!(lock < disable && disable < load && load < enable && enable < unlock);
}

#[tokio::test]
async fn failed_load_still_enables_keys_and_unlocks() {
    let fx = fixture(
        MockConnection::new("legacy").with_rows(customer_rows()),
        MockConnection::new("warehouse").failing_on("LOAD DATA"),
    );
    let mut job = customers_job();
    job.disable_keys = true;
    job.add_index(
        ImportIndex::new("idx_name", IndexKind::Normal)
            .unwrap()
            .with_field("full_name", 0)
            .unwrap(),
    )
    .unwrap();

    let err = fx.importer.run(&job).await.unwrap_err();
    assert!(matches!(err, ImportError::Execution(_)), "got {err:?}");

    let log = fx.target.log();
    assert_eq!(
        &log[log.len() - 2..],
        [
            "ALTER TABLE `customers_import` ENABLE KEYS".to_string(),
            "UNLOCK TABLES".to_string()
        ]
    );
    assert!(fx.target.position("ALTER TABLE `customers_import` ADD").is_none());
    assert!(fx.target.sql_logging());
}

#[tokio::test]
async fn failed_index_creation_keeps_a_single_enable_keys() {
    let fx = fixture(
        MockConnection::new("legacy").with_rows(customer_rows()),
        MockConnection::new("warehouse")
            .with_inserted(2)
            .failing_on("ADD INDEX"),
    );
    let mut job = customers_job();
    job.disable_keys = true;
    job.add_index(
        ImportIndex::new("idx_name", IndexKind::Normal)
            .unwrap()
            .with_field("full_name", 0)
            .unwrap(),
    )
    .unwrap();

    let err = fx.importer.run(&job).await.unwrap_err();
    assert!(matches!(err, ImportError::Execution(_)), "got {err:?}");

    let log = fx.target.log();
    let enables: Vec<usize> = log
        .iter()
        .enumerate()
        .filter(|(_, sql)| sql.ends_with("ENABLE KEYS"))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(enables.len(), 1);
    let unlock = fx.target.position("UNLOCK TABLES").unwrap();
    let add_index = fx.target.position("ALTER TABLE `customers_import` ADD INDEX").unwrap();
    assert!(enables[0] < unlock && unlock < add_index);
    assert!(fx.target.sql_logging());
}

#[tokio::test]
async fn keep_existing_table_skips_ddl() {
    let fx = default_fixture();
    let mut job = customers_job();
    job.erase_existing = false;
    job.add_index(
        ImportIndex::new("uniq_id", IndexKind::Unique)
            .unwrap()
            .with_field("id", 0)
            .unwrap(),
    )
    .unwrap();

    fx.importer.run(&job).await.unwrap();

    assert!(fx.target.position("DROP TABLE").is_none());
    assert!(fx.target.position("CREATE TABLE").is_none());
    assert!(fx.target.position("ALTER TABLE").is_none());
    assert!(fx.target.position("LOAD DATA").is_some());
}

#[tokio::test]
async fn unknown_index_field_fails_before_any_ddl() {
    let fx = default_fixture();
    let mut job = customers_job();
    job.add_index(
        ImportIndex::new("ghost", IndexKind::Normal)
            .unwrap()
            .with_field("missing", 0)
            .unwrap(),
    )
    .unwrap();

    let err = fx.importer.run(&job).await.unwrap_err();
    assert!(matches!(
        err,
        ImportError::Config(ConfigError::UnresolvedIndexField { ref field, .. }) if field == "missing"
    ));
    assert!(fx.target.log().is_empty());
    assert!(fx.source.log().is_empty());
}

#[tokio::test]
async fn fields_missing_from_order_are_listed() {
    let fx = default_fixture();
    let mut job = customers_job();
    job.set_field_order(["id"]);

    let err = fx.importer.run(&job).await.unwrap_err();
    match err {
        ImportError::Config(ConfigError::FieldsMissingFromOrder(missing)) => {
            assert_eq!(missing, vec!["name"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(fx.target.position("LOCK TABLES").is_none());
    assert!(fx.source.log().is_empty());
}

#[tokio::test]
async fn failing_before_hook_stops_the_run() {
    let fx = default_fixture();
    let mut job = customers_job();
    job.before = Some(Arc::new(|_: &ImportJob| Err(anyhow::anyhow!("source not ready"))));

    let err = fx.importer.run(&job).await.unwrap_err();
    assert!(matches!(err, ImportError::Hook { stage: "before", .. }));
    assert!(fx.target.log().is_empty());
    assert!(fx.target.sql_logging());
}

#[tokio::test]
async fn after_hook_runs_once_indexes_exist() {
    let fx = default_fixture();
    let called = Arc::new(AtomicBool::new(false));
    let flag = called.clone();
    let mut job = customers_job();
    job.after = Some(Arc::new(move |job: &ImportJob| {
        assert_eq!(job.source_table(), "customers");
        flag.store(true, Ordering::SeqCst);
        Ok(())
    }));

    fx.importer.run(&job).await.unwrap();
    assert!(called.load(Ordering::SeqCst));
}

#[tokio::test]
async fn stale_staging_file_is_replaced() {
    let fx = default_fixture();
    let job = customers_job();
    let path = fx.importer.settings().staging_path("customers_import");
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "left over from a crashed run\n").unwrap();

    fx.importer.run(&job).await.unwrap();

    let staged = std::fs::read_to_string(&path).unwrap();
    assert!(staged.starts_with("id,name\n"));
    assert!(!staged.contains("crashed"));
}

#[tokio::test]
async fn unknown_target_connection_is_a_config_error() {
    let fx = default_fixture();
    let job = ImportJob::new("legacy", "customers", "archive").unwrap();
    let err = fx.importer.run(&job).await.unwrap_err();
    assert!(matches!(
        err,
        ImportError::Config(ConfigError::UnknownConnection(ref name)) if name == "archive"
    ));
}

// ============ source_select_statement Tests ============

#[test]
fn source_select_uses_schema_condition_and_overrides() {
    let fx = default_fixture();
    let mut job = customers_job();
    job.source_schema = Some("crm".to_string());
    job.sql_condition = Some("WHERE id > 0".to_string());
    job.field_mut("full_name").unwrap().select = Some("UPPER(full_name)".to_string());

    let sql = fx
        .importer
        .source_select_statement(&job, fx.source.as_ref())
        .unwrap();
    assert_eq!(
        sql,
        "SELECT `id`,UPPER(full_name) `full_name` FROM `crm`.`customers` WHERE id > 0"
    );

    let empty = ImportJob::new("legacy", "customers", "warehouse").unwrap();
    assert!(matches!(
        fx.importer.source_select_statement(&empty, fx.source.as_ref()),
        Err(ConfigError::NoFields(_))
    ));
}

// ============ create_job Tests ============

const SETTINGS: &str = r#"
default_connection_target = "warehouse"

[alias.legacy.tables.customers]
collation = "latin1_swedish_ci"

[alias.legacy.tables.customers.fields.id]
name = "customer_id"
type = "integer"
nullable = false
signed = false

[alias.legacy.tables.customers.fields.full_name]
name = "name"
type = "string"
nullable = true
length = 80
default = "anonymous"

[alias.legacy.tables.customers.fields.email]
name = "email"
type = "string"
nullable = true
length = 120

[alias.legacy.tables.customers.indexes.pk]
type = "primary"
fields = "id"

[alias.legacy.tables.customers.indexes.by_contact]
type = "index"
fields = ["full_name", { field = "email", length = 10 }]
"#;

fn settings_importer() -> Importer {
    Importer::new(
        ImportSettings::from_toml_str(SETTINGS).unwrap(),
        ConnectionRegistry::new(),
    )
}

#[test]
fn create_job_reads_fields_and_eligible_indexes() {
    let importer = settings_importer();
    let job = importer
        .create_job("legacy", "customers", None, &["id", "full_name"])
        .unwrap();

    assert_eq!(job.target_connection(), "warehouse");
    assert_eq!(job.collation.as_deref(), Some("latin1_swedish_ci"));
    assert_eq!(job.target_names().unwrap(), vec!["customer_id", "name"]);

    let name = job.field("full_name").unwrap();
    assert_eq!(name.spec.length, Some(80));
    assert!(name.spec.nullable);
    assert_eq!(job.field("id").unwrap().spec.signed, Some(false));

    // by_contact needs email, which is not part of the job
    let indexes: Vec<&str> = job.indexes().map(|i| i.name()).collect();
    assert_eq!(indexes, vec!["pk"]);
}

#[test]
fn create_job_with_every_index_field() {
    let importer = settings_importer();
    let job = importer
        .create_job(
            "legacy",
            "customers",
            Some("archive"),
            &["id", "full_name", "email"],
        )
        .unwrap();
    assert_eq!(job.target_connection(), "archive");

    let by_contact = job.index("by_contact").unwrap();
    let fields: Vec<(&str, u32)> = by_contact
        .fields()
        .iter()
        .map(|(f, l)| (f.as_str(), *l))
        .collect();
    assert_eq!(fields, vec![("full_name", 0), ("email", 10)]);
}

#[test]
fn create_field_applies_overrides() {
    let importer = settings_importer();
    let field = importer
        .create_field(
            "legacy",
            "customers",
            "full_name",
            tabload_import::FieldOverrides {
                field_type: Some(FieldType::Text),
                nullable: Some(false),
            },
        )
        .unwrap();
    assert_eq!(field.spec.field_type, FieldType::Text);
    assert!(!field.spec.nullable);
    assert_eq!(field.target_name(), "name");

    let field = importer
        .create_field(
            "legacy",
            "customers",
            "id",
            tabload_import::FieldOverrides {
                field_type: None,
                nullable: Some(true),
            },
        )
        .unwrap();
    assert!(field.spec.nullable);
    assert_eq!(field.target_name(), "customer_id");
}

#[test]
fn create_field_reports_unknown_fields() {
    let importer = settings_importer();
    let err = importer
        .create_field("legacy", "customers", "phone", Default::default())
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "no field \"phone\" inside table \"customers\" for connection \"legacy\""
    );
    assert!(matches!(
        importer.create_job("legacy", "orders", None, &["id"]),
        Err(ConfigError::UnknownTable { .. })
    ));
}

#[test]
fn update_job_indexes_can_drop_unknown_indexes() {
    let importer = settings_importer();
    let mut job = importer
        .create_job("legacy", "customers", None, &["id"])
        .unwrap();
    job.add_index(
        ImportIndex::new("custom", IndexKind::Normal)
            .unwrap()
            .with_field("id", 0)
            .unwrap(),
    )
    .unwrap();

    importer.update_job_indexes(&mut job, true).unwrap();
    assert!(job.has_index("custom"));

    importer.update_job_indexes(&mut job, false).unwrap();
    assert!(!job.has_index("custom"));
    assert!(job.has_index("pk"));
}
