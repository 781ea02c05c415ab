//! SQL text generation for the MySQL bulk-import path
//!
//! Every function here is pure: no connection is touched, so the exact text
//! can be inspected (and printed by `tabload ddl`) before anything runs.

use chrono::{DateTime, Utc};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;
use tabload_core::quote_mysql_identifier;

use crate::coercion::parse_utc_timestamp;
use crate::model::{
    DEFAULT_COLLATION, DefaultValue, DuplicateStrategy, FieldType, IndexKind, TableDefinition,
    TableField,
};
use crate::ConfigError;

/// Character sets the bulk loader can not read
const UNSUPPORTED_LOAD_CHARSETS: [&str; 4] = ["ucs2", "utf16", "utf16le", "utf32"];

static COLLATION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^_]+)(?:_.+)?$").expect("valid regex"));

/// `schema`.`table`, or `table` alone
pub fn qualified_table_name(table: &str, schema: Option<&str>) -> String {
    match schema {
        Some(schema) => format!(
            "{}.{}",
            quote_mysql_identifier(schema),
            quote_mysql_identifier(table)
        ),
        None => quote_mysql_identifier(table),
    }
}

fn definition_table(definition: &TableDefinition) -> String {
    qualified_table_name(&definition.name, definition.schema.as_deref())
}

fn column_type(field: &TableField) -> Result<String, ConfigError> {
    let ty = match field.field_type {
        FieldType::Integer => "BIGINT(20)",
        FieldType::String => {
            let length = field
                .length
                .ok_or_else(|| ConfigError::MissingLength(field.name.clone()))?;
            return Ok(format!("VARCHAR({})", length));
        }
        FieldType::Text => "LONGTEXT",
        FieldType::Blob => "LONGBLOB",
        FieldType::Float => "DOUBLE",
        FieldType::Date => "DATE",
        FieldType::DateTime => "DATETIME",
        FieldType::Time => "TIME",
        FieldType::Boolean => "TINYINT(1)",
    };
    Ok(ty.to_string())
}

/// `CREATE TABLE` without indexes, which are added after the load
pub fn create_table_statement(definition: &TableDefinition) -> Result<String, ConfigError> {
    if definition.fields.is_empty() {
        return Err(ConfigError::NoFields(definition.name.clone()));
    }
    tracing::debug!(table = %definition.name, column_count = definition.fields.len(), "generating CREATE TABLE DDL");

    let mut columns = Vec::with_capacity(definition.fields.len());
    for field in &definition.fields {
        let mut parts = vec![quote_mysql_identifier(&field.name), column_type(field)?];
        // any declared signedness marks the column unsigned
        if field.signed.is_some() {
            parts.push("UNSIGNED".to_string());
        }
        parts.push(if field.nullable { "NULL" } else { "NOT NULL" }.to_string());
        parts.push(format!("DEFAULT {}", render_default(field)?));
        columns.push(parts.join(" "));
    }

    Ok(format!(
        "CREATE TABLE {}({})DEFAULT COLLATE {} ENGINE {}",
        definition_table(definition),
        columns.join(","),
        definition.collation,
        definition.engine
    ))
}

/// Drop the target table, tolerating its absence unless `error_if_not_exists`
pub fn drop_table_statement(definition: &TableDefinition, error_if_not_exists: bool) -> String {
    tracing::debug!(table = %definition.name, "generating DROP TABLE DDL");
    if error_if_not_exists {
        format!("DROP TABLE {}", definition_table(definition))
    } else {
        format!("DROP TABLE IF EXISTS {}", definition_table(definition))
    }
}

fn index_keyword(kind: IndexKind) -> &'static str {
    match kind {
        IndexKind::Primary | IndexKind::Unique => "UNIQUE INDEX",
        IndexKind::Normal => "INDEX",
        IndexKind::Fulltext => "FULLTEXT INDEX",
    }
}

/// One `ALTER TABLE ... ADD` per index of the definition
pub fn add_index_statements(definition: &TableDefinition) -> Result<Vec<String>, ConfigError> {
    let table = definition_table(definition);
    definition
        .indexes
        .iter()
        .map(|index| {
            if index.fields.is_empty() {
                return Err(ConfigError::EmptyIndex(index.name.clone()));
            }
            tracing::debug!(table = %definition.name, index = %index.name, "generating ADD INDEX DDL");
            let fields = index
                .fields
                .iter()
                .map(|(name, length)| match length {
                    0 => quote_mysql_identifier(name),
                    n => format!("{}({})", quote_mysql_identifier(name), n),
                })
                .collect::<Vec<_>>()
                .join(",");
            Ok(format!(
                "ALTER TABLE {} ADD {} {}({})",
                table,
                index_keyword(index.kind),
                quote_mysql_identifier(&index.name),
                fields
            ))
        })
        .collect()
}

/// Options of a `LOAD DATA INFILE` statement
#[derive(Debug, Clone, Default)]
pub struct LoadDataOptions {
    pub duplicate_strategy: DuplicateStrategy,
    pub charset: Option<String>,
    pub delimiter: Option<char>,
    pub enclosure: Option<char>,
    pub escape: Option<char>,
    /// Header lines to skip
    pub ignore_lines: u32,
    /// Target columns, in file order
    pub columns: Vec<String>,
    pub schema: Option<String>,
}

/// Escape a value embedded in single quotes of a `LOAD DATA` statement.
///
/// Backslash goes first so the escapes added afterwards are kept intact.
pub fn escape_load_data_option(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\x0c' => out.push_str("\\f"),
            '\x1b' => out.push_str("\\033"),
            '\x07' => out.push_str("\\a"),
            '\x0b' => out.push_str("\\v"),
            '\'' => out.push_str("\\'"),
            other => out.push(other),
        }
    }
    out
}

fn quoted_option(value: char) -> String {
    format!("'{}'", escape_load_data_option(&value.to_string()))
}

/// Native bulk load of `file_path` into `table`
pub fn bulk_load_statement(
    file_path: &Path,
    table: &str,
    options: &LoadDataOptions,
) -> Result<String, ConfigError> {
    if let Some(charset) = &options.charset
        && UNSUPPORTED_LOAD_CHARSETS.contains(&charset.as_str())
    {
        return Err(ConfigError::UnsupportedCharset(charset.clone()));
    }

    let mut parts = vec![
        "LOAD DATA".to_string(),
        format!(
            "INFILE '{}'",
            escape_load_data_option(&file_path.to_string_lossy())
        ),
    ];
    if let Some(keyword) = options.duplicate_strategy.keyword() {
        parts.push(keyword.to_string());
    }
    parts.push(format!(
        "INTO TABLE {}",
        qualified_table_name(table, options.schema.as_deref())
    ));
    if let Some(charset) = &options.charset {
        parts.push(format!("CHARACTER SET {}", charset));
    }
    parts.push("FIELDS".to_string());
    parts.push(format!(
        "TERMINATED BY {}",
        quoted_option(options.delimiter.unwrap_or(','))
    ));
    parts.push(format!(
        "ENCLOSED BY {}",
        quoted_option(options.enclosure.unwrap_or('"'))
    ));
    parts.push(format!(
        "ESCAPED BY {}",
        quoted_option(options.escape.unwrap_or('\\'))
    ));
    parts.push("LINES STARTING BY '' TERMINATED BY '\\n'".to_string());
    if options.ignore_lines > 0 {
        parts.push(format!("IGNORE {} LINES", options.ignore_lines));
    }
    if !options.columns.is_empty() {
        let columns = options
            .columns
            .iter()
            .map(|c| quote_mysql_identifier(c))
            .collect::<Vec<_>>()
            .join(",");
        parts.push(format!("({})", columns));
    }
    Ok(parts.join(" "))
}

pub fn lock_table_write_statement(table: &str, schema: Option<&str>) -> String {
    format!("LOCK TABLES {} WRITE", qualified_table_name(table, schema))
}

pub fn lock_table_read_statement(table: &str, schema: Option<&str>) -> String {
    format!("LOCK TABLES {} READ", qualified_table_name(table, schema))
}

pub fn unlock_tables_statement() -> String {
    "UNLOCK TABLES".to_string()
}

pub fn disable_keys_statement(table: &str, schema: Option<&str>) -> String {
    format!("ALTER TABLE {} DISABLE KEYS", qualified_table_name(table, schema))
}

pub fn enable_keys_statement(table: &str, schema: Option<&str>) -> String {
    format!("ALTER TABLE {} ENABLE KEYS", qualified_table_name(table, schema))
}

/// Rows affected by the previous statement, as column `inserted`
pub fn row_count_statement() -> String {
    "SELECT ROW_COUNT() inserted".to_string()
}

pub fn current_schema_statement() -> String {
    "SELECT DATABASE()".to_string()
}

/// Count rows, or non-null values of `column`, as column `result`
pub fn count_rows_statement(table: &str, schema: Option<&str>, column: Option<&str>) -> String {
    let counted = column.map_or_else(|| "*".to_string(), quote_mysql_identifier);
    format!(
        "SELECT COUNT({}) result FROM {}",
        counted,
        qualified_table_name(table, schema)
    )
}

/// Collation of an existing table, as column `collation_name`
pub fn table_collation_statement(table: &str, schema: &str) -> String {
    format!(
        "SELECT TABLE_COLLATION collation_name FROM INFORMATION_SCHEMA.TABLES \
         WHERE TABLE_NAME='{}' AND TABLE_SCHEMA='{}'",
        escape_load_data_option(table),
        escape_load_data_option(schema)
    )
}

/// Convert a table to `collation` and its character set
pub fn alter_table_collation_statement(
    table: &str,
    schema: Option<&str>,
    collation: Option<&str>,
) -> Result<String, ConfigError> {
    let collation = collation.unwrap_or(DEFAULT_COLLATION);
    let charset = charset_from_collation(collation)?;
    Ok(format!(
        "ALTER TABLE {} CONVERT TO CHARACTER SET {} COLLATE {}",
        qualified_table_name(table, schema),
        charset,
        collation
    ))
}

pub fn schema_default_charset_statement(schema: &str) -> String {
    format!(
        "SELECT `DEFAULT_CHARACTER_SET_NAME` FROM information_schema.SCHEMATA WHERE schema_name = '{}'",
        escape_load_data_option(schema)
    )
}

pub fn schema_default_collation_statement(schema: &str) -> String {
    format!(
        "SELECT `DEFAULT_COLLATION_NAME` FROM information_schema.SCHEMATA WHERE schema_name = '{}'",
        escape_load_data_option(schema)
    )
}

/// Character set of a collation name: `utf8mb4_general_ci` is `utf8mb4`
pub fn charset_from_collation(collation: &str) -> Result<String, ConfigError> {
    COLLATION_PATTERN
        .captures(collation)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ConfigError::InvalidCollation(collation.to_string()))
}

/// Default of a column after validation against its type
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedDefault {
    /// Rendered as `NULL`
    None,
    Integer(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

/// Validate the explicit default of `field`, or substitute the implicit one.
///
/// Not-null columns without a default get a zero value, except temporal
/// columns which still have no default.
pub fn resolve_default(field: &TableField) -> Result<ResolvedDefault, ConfigError> {
    let invalid = |expected: &'static str| ConfigError::InvalidDefault {
        field: field.name.clone(),
        expected,
    };

    let Some(default) = &field.default else {
        if field.nullable {
            return Ok(ResolvedDefault::None);
        }
        return Ok(match field.field_type {
            FieldType::Float => ResolvedDefault::Float(0.0),
            FieldType::Integer => ResolvedDefault::Integer(0),
            FieldType::Date | FieldType::DateTime | FieldType::Time => ResolvedDefault::None,
            FieldType::String | FieldType::Text | FieldType::Blob | FieldType::Boolean => {
                ResolvedDefault::Text(String::new())
            }
        });
    };

    match field.field_type {
        FieldType::Float => match default {
            DefaultValue::Float(v) => Ok(ResolvedDefault::Float(*v)),
            DefaultValue::Integer(v) => Ok(ResolvedDefault::Float(*v as f64)),
            DefaultValue::String(s) => s
                .trim()
                .parse::<f64>()
                .map(ResolvedDefault::Float)
                .map_err(|_| invalid("float")),
            DefaultValue::Timestamp(_) => Err(invalid("float")),
        },
        FieldType::Integer => match default {
            DefaultValue::Integer(v) => Ok(ResolvedDefault::Integer(*v)),
            DefaultValue::String(s) => s
                .trim()
                .parse::<i64>()
                .map(ResolvedDefault::Integer)
                .map_err(|_| invalid("integer")),
            _ => Err(invalid("integer")),
        },
        FieldType::Date | FieldType::DateTime | FieldType::Time => match default {
            DefaultValue::Timestamp(ts) => Ok(ResolvedDefault::Timestamp(*ts)),
            DefaultValue::Integer(secs) => DateTime::from_timestamp(*secs, 0)
                .map(ResolvedDefault::Timestamp)
                .ok_or_else(|| invalid("date/time")),
            DefaultValue::String(s) => parse_utc_timestamp(s)
                .map(ResolvedDefault::Timestamp)
                .ok_or_else(|| invalid("date/time")),
            DefaultValue::Float(_) => Err(invalid("date/time")),
        },
        FieldType::String | FieldType::Text | FieldType::Blob | FieldType::Boolean => {
            match default {
                DefaultValue::String(s) => Ok(ResolvedDefault::Text(s.clone())),
                _ => Err(invalid("string")),
            }
        }
    }
}

/// Literal placed after `DEFAULT` in a column clause
pub fn render_default(field: &TableField) -> Result<String, ConfigError> {
    let rendered = match resolve_default(field)? {
        ResolvedDefault::None => "NULL".to_string(),
        ResolvedDefault::Timestamp(ts) => {
            let format = match field.field_type {
                FieldType::Date => "%Y-%m-%d",
                FieldType::Time => "%H:%M:%S",
                _ => "%Y-%m-%d %H:%M:%S",
            };
            format!("'{}'", ts.format(format))
        }
        ResolvedDefault::Integer(v) => v.to_string(),
        ResolvedDefault::Float(v) => format!("{:?}", v),
        ResolvedDefault::Text(s) if field.field_type == FieldType::Boolean => {
            boolean_default(&s).to_string()
        }
        ResolvedDefault::Text(s) => quote_string_literal(&s),
    };
    Ok(rendered)
}

fn boolean_default(s: &str) -> i64 {
    let s = s.trim();
    if s.eq_ignore_ascii_case("true") {
        return 1;
    }
    s.parse::<i64>()
        .or_else(|_| s.parse::<f64>().map(|f| f as i64))
        .unwrap_or(0)
}

/// Single-quoted string literal with backslashes and quotes escaped
pub fn quote_string_literal(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('"', "\\\"");
    format!("'{}'", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DEFAULT_ENGINE, TableIndex};
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use std::path::PathBuf;

    fn field(name: &str, field_type: FieldType, nullable: bool) -> TableField {
        TableField {
            name: name.to_string(),
            field_type,
            nullable,
            length: None,
            signed: None,
            default: None,
        }
    }

    fn definition() -> TableDefinition {
        TableDefinition {
            name: "_tmp_import_abc".to_string(),
            schema: None,
            collation: DEFAULT_COLLATION.to_string(),
            engine: DEFAULT_ENGINE.to_string(),
            fields: vec![
                TableField {
                    signed: Some(true),
                    ..field("id", FieldType::Integer, false)
                },
                TableField {
                    length: Some(10),
                    ..field("name", FieldType::String, true)
                },
            ],
            indexes: vec![],
        }
    }

    #[test]
    fn test_create_table_statement() {
        assert_eq!(
            create_table_statement(&definition()).unwrap(),
            "CREATE TABLE `_tmp_import_abc`(`id` BIGINT(20) UNSIGNED NOT NULL DEFAULT 0,\
             `name` VARCHAR(10) NULL DEFAULT NULL)DEFAULT COLLATE utf8_unicode_ci ENGINE MyISAM"
        );
    }

    #[test]
    fn test_create_table_requires_fields_and_lengths() {
        let mut def = definition();
        def.fields[1].length = None;
        assert!(matches!(
            create_table_statement(&def),
            Err(ConfigError::MissingLength(name)) if name == "name"
        ));
        def.fields.clear();
        assert!(matches!(
            create_table_statement(&def),
            Err(ConfigError::NoFields(_))
        ));
    }

    #[test]
    fn test_drop_table_statement() {
        let mut def = definition();
        def.schema = Some("stage".to_string());
        assert_eq!(
            drop_table_statement(&def, false),
            "DROP TABLE IF EXISTS `stage`.`_tmp_import_abc`"
        );
        assert_eq!(
            drop_table_statement(&def, true),
            "DROP TABLE `stage`.`_tmp_import_abc`"
        );
    }

    #[test]
    fn test_add_index_statements() {
        let mut def = definition();
        def.indexes = vec![
            TableIndex {
                name: "pk".to_string(),
                kind: IndexKind::Primary,
                fields: vec![("id".to_string(), 0)],
            },
            TableIndex {
                name: "by_name".to_string(),
                kind: IndexKind::Normal,
                fields: vec![("name".to_string(), 5), ("id".to_string(), 0)],
            },
            TableIndex {
                name: "ft".to_string(),
                kind: IndexKind::Fulltext,
                fields: vec![("name".to_string(), 0)],
            },
        ];
        assert_eq!(
            add_index_statements(&def).unwrap(),
            vec![
                "ALTER TABLE `_tmp_import_abc` ADD UNIQUE INDEX `pk`(`id`)",
                "ALTER TABLE `_tmp_import_abc` ADD INDEX `by_name`(`name`(5),`id`)",
                "ALTER TABLE `_tmp_import_abc` ADD FULLTEXT INDEX `ft`(`name`)",
            ]
        );

        def.indexes[0].fields.clear();
        assert!(matches!(
            add_index_statements(&def),
            Err(ConfigError::EmptyIndex(name)) if name == "pk"
        ));
    }

    #[test]
    fn test_bulk_load_statement() {
        let options = LoadDataOptions {
            duplicate_strategy: DuplicateStrategy::Replace,
            charset: Some("utf8".to_string()),
            ignore_lines: 1,
            columns: vec!["id".to_string(), "name".to_string()],
            ..LoadDataOptions::default()
        };
        assert_eq!(
            bulk_load_statement(&PathBuf::from("/tmp/import_x"), "x", &options).unwrap(),
            "LOAD DATA INFILE '/tmp/import_x' REPLACE INTO TABLE `x` CHARACTER SET utf8 \
             FIELDS TERMINATED BY ',' ENCLOSED BY '\"' ESCAPED BY '\\\\' \
             LINES STARTING BY '' TERMINATED BY '\\n' IGNORE 1 LINES (`id`,`name`)"
        );
    }

    #[test]
    fn test_bulk_load_minimal_and_forbidden_charset() {
        let options = LoadDataOptions {
            delimiter: Some('\t'),
            ..LoadDataOptions::default()
        };
        let sql = bulk_load_statement(Path::new("f"), "x", &options).unwrap();
        assert!(sql.contains("TERMINATED BY '\\t'"));
        assert!(!sql.contains("CHARACTER SET"));
        assert!(!sql.contains("IGNORE"));
        assert!(sql.ends_with("TERMINATED BY '\\n'"));

        let options = LoadDataOptions {
            charset: Some("utf16".to_string()),
            ..LoadDataOptions::default()
        };
        assert!(matches!(
            bulk_load_statement(Path::new("f"), "x", &options),
            Err(ConfigError::UnsupportedCharset(cs)) if cs == "utf16"
        ));
    }

    #[rstest]
    #[case("\\", "\\\\")]
    #[case("'", "\\'")]
    #[case("\r\n", "\\r\\n")]
    #[case("\x1b\x07\x0b\x0c", "\\033\\a\\v\\f")]
    #[case("O'Brien\\", "O\\'Brien\\\\")]
    #[case("plain", "plain")]
    fn test_escape_load_data_option(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(escape_load_data_option(raw), expected);
    }

    #[test]
    fn test_single_statement_helpers() {
        assert_eq!(lock_table_write_statement("t", None), "LOCK TABLES `t` WRITE");
        assert_eq!(lock_table_read_statement("t", Some("s")), "LOCK TABLES `s`.`t` READ");
        assert_eq!(unlock_tables_statement(), "UNLOCK TABLES");
        assert_eq!(disable_keys_statement("t", None), "ALTER TABLE `t` DISABLE KEYS");
        assert_eq!(enable_keys_statement("t", None), "ALTER TABLE `t` ENABLE KEYS");
        assert_eq!(row_count_statement(), "SELECT ROW_COUNT() inserted");
        assert_eq!(current_schema_statement(), "SELECT DATABASE()");
        assert_eq!(
            count_rows_statement("t", None, Some("id")),
            "SELECT COUNT(`id`) result FROM `t`"
        );
        assert_eq!(
            count_rows_statement("t", Some("s"), None),
            "SELECT COUNT(*) result FROM `s`.`t`"
        );
    }

    #[test]
    fn test_collation_statements() {
        assert_eq!(charset_from_collation("utf8_unicode_ci").unwrap(), "utf8");
        assert_eq!(charset_from_collation("latin1").unwrap(), "latin1");
        assert!(matches!(
            charset_from_collation("_bad"),
            Err(ConfigError::InvalidCollation(_))
        ));
        assert_eq!(
            alter_table_collation_statement("t", None, None).unwrap(),
            "ALTER TABLE `t` CONVERT TO CHARACTER SET utf8 COLLATE utf8_unicode_ci"
        );
        assert_eq!(
            table_collation_statement("o't", "s"),
            "SELECT TABLE_COLLATION collation_name FROM INFORMATION_SCHEMA.TABLES \
             WHERE TABLE_NAME='o\\'t' AND TABLE_SCHEMA='s'"
        );
        assert!(schema_default_charset_statement("s").ends_with("schema_name = 's'"));
        assert!(schema_default_collation_statement("s").contains("DEFAULT_COLLATION_NAME"));
    }

    #[test]
    fn test_implicit_defaults() {
        let cases = [
            (FieldType::Float, "0.0"),
            (FieldType::Integer, "0"),
            (FieldType::Date, "NULL"),
            (FieldType::Time, "NULL"),
            (FieldType::Text, "''"),
            (FieldType::Boolean, "0"),
        ];
        for (ty, expected) in cases {
            assert_eq!(render_default(&field("c", ty, false)).unwrap(), expected, "{ty}");
            assert_eq!(render_default(&field("c", ty, true)).unwrap(), "NULL", "{ty}");
        }
    }

    #[test]
    fn test_explicit_defaults() {
        let with = |ty, default| TableField {
            default: Some(default),
            ..field("c", ty, false)
        };
        assert_eq!(
            render_default(&with(FieldType::Float, DefaultValue::String("1.5".into()))).unwrap(),
            "1.5"
        );
        assert_eq!(
            render_default(&with(FieldType::Integer, DefaultValue::String("42".into()))).unwrap(),
            "42"
        );
        assert_eq!(
            render_default(&with(FieldType::String, DefaultValue::String("O'Brien \"x\"".into())))
                .unwrap(),
            "'O\\'Brien \\\"x\\\"'"
        );
        assert_eq!(
            render_default(&with(FieldType::Boolean, DefaultValue::String("true".into()))).unwrap(),
            "1"
        );
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 15, 4, 5).unwrap();
        assert_eq!(
            render_default(&with(FieldType::DateTime, DefaultValue::Timestamp(ts))).unwrap(),
            "'2024-01-02 15:04:05'"
        );
        assert_eq!(
            render_default(&with(FieldType::Time, DefaultValue::String("2024-01-02 15:04:05".into())))
                .unwrap(),
            "'15:04:05'"
        );
        assert_eq!(
            render_default(&with(FieldType::Date, DefaultValue::Integer(0))).unwrap(),
            "'1970-01-01'"
        );
    }

    #[test]
    fn test_mismatched_defaults_name_the_field() {
        let bad = TableField {
            default: Some(DefaultValue::String("abc".into())),
            ..field("amount", FieldType::Integer, false)
        };
        assert!(matches!(
            resolve_default(&bad),
            Err(ConfigError::InvalidDefault { field, expected: "integer" }) if field == "amount"
        ));
        let bad = TableField {
            default: Some(DefaultValue::Integer(3)),
            ..field("label", FieldType::Text, true)
        };
        assert!(matches!(
            resolve_default(&bad),
            Err(ConfigError::InvalidDefault { expected: "string", .. })
        ));
    }

    #[test]
    fn test_resolving_a_default_twice_gives_the_same_result() {
        let fields = [
            TableField {
                default: Some(DefaultValue::String("O'Brien".into())),
                ..field("name", FieldType::String, false)
            },
            TableField {
                default: Some(DefaultValue::String("2024-01-02 15:04:05".into())),
                ..field("seen", FieldType::DateTime, false)
            },
            field("amount", FieldType::Float, false),
            field("note", FieldType::Text, true),
        ];
        for f in &fields {
            assert_eq!(resolve_default(f).unwrap(), resolve_default(f).unwrap(), "{}", f.name);
            assert_eq!(render_default(f).unwrap(), render_default(f).unwrap(), "{}", f.name);
        }
    }

    /// Reverse of MySQL string literal escaping
    fn unquote(literal: &str) -> String {
        let inner = literal
            .strip_prefix('\'')
            .and_then(|s| s.strip_suffix('\''))
            .unwrap();
        let mut out = String::new();
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                out.push(chars.next().unwrap());
            } else {
                out.push(c);
            }
        }
        out
    }

    #[rstest]
    #[case("O'Brien")]
    #[case(r#"say "hi""#)]
    #[case(r"C:\temp\'x'")]
    fn test_string_default_round_trips(#[case] value: &str) {
        let f = TableField {
            default: Some(DefaultValue::String(value.into())),
            ..field("c", FieldType::String, false)
        };
        assert_eq!(unquote(&render_default(&f).unwrap()), value);
    }

    #[test]
    fn test_quote_string_literal_escapes_backslash_first() {
        assert_eq!(quote_string_literal("a\\'b"), "'a\\\\\\'b'");
    }
}
