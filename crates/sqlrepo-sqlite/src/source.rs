//! Connection factory over one SQLite database.

use crate::connection::{SqliteConfig, SqliteConnection};
use sqlrepo_core::{Connection, DataSource, Result};

/// Opens a fresh [`SqliteConnection`] per request.
///
/// A private `:memory:` database is different for every connection, so units
/// of work that must see each other's writes need a file path or
/// [`SqliteDataSource::shared_memory`].
#[derive(Debug)]
pub struct SqliteDataSource {
    config: SqliteConfig,
    /// Keeps a shared in-memory database alive between units of work.
    anchor: Option<SqliteConnection>,
}

impl SqliteDataSource {
    pub fn new(config: SqliteConfig) -> Self {
        Self {
            config,
            anchor: None,
        }
    }

    /// A file-based database, created on first use.
    pub fn file(path: impl Into<String>) -> Self {
        Self::new(SqliteConfig::file(path))
    }

    /// A named in-memory database that lives as long as this source.
    pub fn shared_memory(name: &str) -> Result<Self> {
        let config = SqliteConfig::shared_memory(name);
        let anchor = SqliteConnection::open(&config)?;
        Ok(Self {
            config,
            anchor: Some(anchor),
        })
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }

    /// Open a connection with its concrete type.
    pub fn open(&self) -> Result<SqliteConnection> {
        SqliteConnection::open(&self.config)
    }

    /// Run SQL on a throwaway auto-commit connection.
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        match &self.anchor {
            Some(anchor) => anchor.execute_raw(sql),
            None => self.open()?.execute_raw(sql),
        }
    }
}

impl DataSource for SqliteDataSource {
    fn connection(&self) -> Result<Box<dyn Connection>> {
        tracing::trace!(path = %self.config.path, "Acquiring SQLite connection");
        Ok(Box::new(self.open()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlrepo_core::Value;

    #[test]
    fn test_file_source_connections_share_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.db").to_string_lossy().into_owned();
        let ds = SqliteDataSource::file(path);
        ds.execute_batch("CREATE TABLE note (text TEXT)").unwrap();

        let first = ds.connection().unwrap();
        first.set_auto_commit(false).unwrap();
        first
            .execute("INSERT INTO note (text) VALUES (?)", &[Value::from("hi")])
            .unwrap();
        first.commit().unwrap();
        first.close().unwrap();

        let second = ds.connection().unwrap();
        let rows = second.query("SELECT text FROM note", &[]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_as::<String>(0).unwrap(), "hi");
    }

    #[test]
    fn test_shared_memory_survives_between_connections() {
        let ds = SqliteDataSource::shared_memory("source_shared_memory_test").unwrap();
        ds.execute_batch("CREATE TABLE note (text TEXT)").unwrap();

        let first = ds.connection().unwrap();
        first
            .execute("INSERT INTO note (text) VALUES (?)", &[Value::from("kept")])
            .unwrap();
        first.close().unwrap();

        let second = ds.connection().unwrap();
        let rows = second.query("SELECT COUNT(*) FROM note", &[]).unwrap();
        assert_eq!(rows[0].get_as::<i64>(0).unwrap(), 1);
    }

    #[test]
    fn test_connections_speak_sqlite() {
        let ds = SqliteDataSource::new(SqliteConfig::memory());
        let conn = ds.connection().unwrap();
        assert_eq!(conn.dialect(), sqlrepo_core::Dialect::Sqlite);
    }
}
