//! SQL statement templates for repository operations.

use sqlrepo_core::Dialect;
use sqlrepo_schema::TableSpec;

/// `SELECT * FROM <table>`
pub fn select_all_sql(table: &TableSpec) -> String {
    format!("SELECT * FROM {}", table.table_name())
}

/// `SELECT * FROM <table> WHERE <column> = ?`
pub fn select_where_sql(table: &TableSpec, column: &str) -> String {
    format!("SELECT * FROM {} WHERE {} = ?", table.table_name(), column)
}

/// Upsert of every column in schema order.
///
/// Standard: `MERGE INTO <table> (<cols>) VALUES (?, ...)`.
/// SQLite: `INSERT OR REPLACE INTO <table> (<cols>) VALUES (?, ...)`.
pub fn upsert_sql(table: &TableSpec, dialect: Dialect) -> String {
    let columns = table.column_names();
    let placeholders = vec!["?"; columns.len()].join(", ");
    format!(
        "{} {} ({}) VALUES ({})",
        dialect.upsert_keyword(),
        table.table_name(),
        columns.join(", "),
        placeholders
    )
}

/// The base statements for one table, rendered once per dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlTemplates {
    pub find_all: String,
    /// Absent when the table has no id column.
    pub find_by_id: Option<String>,
    pub save: String,
}

impl SqlTemplates {
    pub fn render(table: &TableSpec, dialect: Dialect) -> Self {
        Self {
            find_all: select_all_sql(table),
            find_by_id: table
                .id_column()
                .map(|id| select_where_sql(table, &id.column_name)),
            save: upsert_sql(table, dialect),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlrepo_macros::Entity;
    use sqlrepo_schema::table_spec_of;

    #[derive(Entity, Debug, Default)]
    struct Person {
        #[sqlrepo(id, generated)]
        id: Option<i64>,
        name: String,
        age: i32,
    }

    #[derive(Entity, Debug, Default)]
    struct Note {
        text: String,
    }

    #[test]
    fn test_standard_templates() {
        let spec = table_spec_of::<Person>().unwrap();
        let t = SqlTemplates::render(&spec, Dialect::Standard);
        assert_eq!(t.find_all, "SELECT * FROM PERSON");
        assert_eq!(
            t.find_by_id.as_deref(),
            Some("SELECT * FROM PERSON WHERE ID = ?")
        );
        assert_eq!(
            t.save,
            "MERGE INTO PERSON (ID, NAME, AGE) VALUES (?, ?, ?)"
        );
    }

    #[test]
    fn test_sqlite_upsert() {
        let spec = table_spec_of::<Person>().unwrap();
        assert_eq!(
            upsert_sql(&spec, Dialect::Sqlite),
            "INSERT OR REPLACE INTO PERSON (ID, NAME, AGE) VALUES (?, ?, ?)"
        );
    }

    #[test]
    fn test_no_find_by_id_without_id() {
        let spec = table_spec_of::<Note>().unwrap();
        let t = SqlTemplates::render(&spec, Dialect::Standard);
        assert!(t.find_by_id.is_none());
        assert_eq!(t.save, "MERGE INTO NOTE (TEXT) VALUES (?)");
        assert_eq!(select_where_sql(&spec, "TEXT"), "SELECT * FROM NOTE WHERE TEXT = ?");
    }
}
