//! CREATE TABLE generation.

use crate::table::{ColumnSpec, TableSpec};
use sqlrepo_core::{Dialect, SqlType};

/// Render the CREATE TABLE statement for `table`.
///
/// Column definitions follow schema order; the PRIMARY KEY clause comes last
/// and only when the table has an id column.
pub fn create_table_sql(table: &TableSpec, dialect: Dialect) -> String {
    let mut parts: Vec<String> = table
        .columns()
        .iter()
        .map(|column| column_definition(column, dialect))
        .collect();

    if let Some(id) = table.id_column() {
        parts.push(format!("PRIMARY KEY ({})", id.column_name));
    }

    let sql = format!("CREATE TABLE {} ({})", table.table_name(), parts.join(", "));
    tracing::trace!(sql = %sql, ?dialect, "Generated CREATE TABLE");
    sql
}

fn column_definition(column: &ColumnSpec, dialect: Dialect) -> String {
    // SQLite only hands out keys for a rowid alias, which must be declared INTEGER.
    let sql_type = if dialect == Dialect::Sqlite
        && column.auto_increment
        && column.primary_key
        && column.sql_type.is_integer()
    {
        SqlType::Integer
    } else {
        column.sql_type
    };

    let mut def = format!("{} {}", column.column_name, sql_type.sql_name());
    if !column.nullable {
        def.push_str(" NOT NULL");
    }
    if column.auto_increment {
        if let Some(keyword) = dialect.auto_increment_keyword() {
            def.push(' ');
            def.push_str(keyword);
        }
    }
    def
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derive::table_spec_of;
    use sqlrepo_macros::Entity;

    #[derive(Entity, Debug, Default, Clone)]
    struct Person {
        #[sqlrepo(id, generated)]
        id: Option<i64>,
        name: String,
        age: i32,
    }

    #[derive(Entity, Debug, Default, Clone)]
    #[sqlrepo(table = "TAGS")]
    struct Tag {
        label: String,
        weight: Option<i32>,
    }

    #[derive(Entity, Debug, Default, Clone)]
    struct Code {
        #[sqlrepo(id)]
        code: String,
        #[sqlrepo(column = "DESCR")]
        description: Option<String>,
    }

    #[test]
    fn test_standard_dialect_person() {
        let spec = table_spec_of::<Person>().unwrap();
        assert_eq!(
            create_table_sql(&spec, Dialect::Standard),
            "CREATE TABLE PERSON (ID BIGINT AUTO_INCREMENT, NAME VARCHAR(255) NOT NULL, \
             AGE INTEGER NOT NULL, PRIMARY KEY (ID))"
        );
    }

    #[test]
    fn test_sqlite_dialect_uses_rowid_alias() {
        let spec = table_spec_of::<Person>().unwrap();
        assert_eq!(
            create_table_sql(&spec, Dialect::Sqlite),
            "CREATE TABLE PERSON (ID INTEGER, NAME VARCHAR(255) NOT NULL, \
             AGE INTEGER NOT NULL, PRIMARY KEY (ID))"
        );
    }

    #[test]
    fn test_no_primary_key_clause_without_id() {
        let spec = table_spec_of::<Tag>().unwrap();
        let sql = create_table_sql(&spec, Dialect::Standard);
        assert_eq!(
            sql,
            "CREATE TABLE TAGS (LABEL VARCHAR(255) NOT NULL, WEIGHT INTEGER)"
        );
        assert!(!sql.contains("PRIMARY KEY"));
    }

    #[test]
    fn test_single_primary_key_clause() {
        let spec = table_spec_of::<Code>().unwrap();
        let sql = create_table_sql(&spec, Dialect::Standard);
        assert_eq!(sql.matches("PRIMARY KEY").count(), 1);
        assert!(sql.ends_with("PRIMARY KEY (CODE))"));
        assert!(sql.contains("DESCR VARCHAR(255),"));
    }
}
