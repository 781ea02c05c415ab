//! Identifier quoting

/// Quote a MySQL identifier with backticks, doubling embedded backticks
pub fn quote_mysql_identifier(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

/// Quote an identifier with ANSI double quotes, doubling embedded quotes
pub fn quote_ansi_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

/// Quote an identifier for the given dialect.
///
/// MySQL and MariaDB use backticks; every other dialect uses double quotes.
pub fn quote_identifier_for(dialect: Option<&str>, identifier: &str) -> String {
    match dialect {
        Some("mysql") | Some("mariadb") => quote_mysql_identifier(identifier),
        _ => quote_ansi_identifier(identifier),
    }
}
