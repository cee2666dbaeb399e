//! SQLite connection implementation.
//!
//! [`SqliteConnection`] wraps one `sqlite3` handle and implements the core
//! [`Connection`] trait. SQLite itself only knows explicit `BEGIN`, so the
//! auto-commit switch is emulated: with auto-commit off, the first statement
//! opens a transaction that lasts until the next commit or rollback.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::borrow_as_ptr)] // FFI takes raw out-pointers

use crate::ffi;
use crate::types;
use sqlrepo_core::{
    ColumnInfo, Connection, ConnectionError, ConnectionErrorKind, Dialect, Error, QueryError,
    QueryErrorKind, Result, Row, Value,
};
use std::ffi::{CStr, CString, c_int};
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Configuration for opening SQLite connections.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path to the database file, ":memory:", or a `file:` URI.
    pub path: String,
    /// Open flags.
    pub flags: OpenFlags,
    /// Busy timeout in milliseconds; 0 disables it.
    pub busy_timeout_ms: u32,
}

/// Flags controlling how the database is opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenFlags {
    pub read_only: bool,
    pub read_write: bool,
    /// Create the database if it doesn't exist.
    pub create: bool,
    /// Interpret the path as a `file:` URI.
    pub uri: bool,
    pub no_mutex: bool,
    pub full_mutex: bool,
    pub shared_cache: bool,
}

impl OpenFlags {
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// Read-write access; the database must exist.
    pub fn read_write() -> Self {
        Self {
            read_write: true,
            ..Default::default()
        }
    }

    pub fn create_read_write() -> Self {
        Self {
            read_write: true,
            create: true,
            ..Default::default()
        }
    }

    fn to_sqlite_flags(self) -> c_int {
        let mut flags = 0;
        if self.read_only {
            flags |= ffi::SQLITE_OPEN_READONLY;
        }
        if self.read_write {
            flags |= ffi::SQLITE_OPEN_READWRITE;
        }
        if self.create {
            flags |= ffi::SQLITE_OPEN_CREATE;
        }
        if self.uri {
            flags |= ffi::SQLITE_OPEN_URI;
        }
        if self.no_mutex {
            flags |= ffi::SQLITE_OPEN_NOMUTEX;
        }
        if self.full_mutex {
            flags |= ffi::SQLITE_OPEN_FULLMUTEX;
        }
        if self.shared_cache {
            flags |= ffi::SQLITE_OPEN_SHAREDCACHE;
        }

        if flags & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            flags |= ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        }
        flags
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            flags: OpenFlags::create_read_write(),
            busy_timeout_ms: 5000,
        }
    }
}

impl SqliteConfig {
    /// A file-based database, created if missing.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// A private in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// A named in-memory database shared by every connection in the process
    /// that opens the same name.
    pub fn shared_memory(name: &str) -> Self {
        Self {
            path: format!("file:{name}?mode=memory&cache=shared"),
            flags: OpenFlags {
                uri: true,
                ..OpenFlags::create_read_write()
            },
            ..Self::default()
        }
    }

    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }
}

struct SqliteInner {
    db: *mut ffi::sqlite3,
    auto_commit: bool,
    in_transaction: bool,
}

// SAFETY: the handle is only touched while the owning Mutex is held, and the
// bundled SQLite is built in serialized threading mode.
unsafe impl Send for SqliteInner {}

/// A connection to a SQLite database.
pub struct SqliteConnection {
    inner: Mutex<SqliteInner>,
    path: String,
}

impl SqliteConnection {
    /// Open a connection with the given configuration.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let c_path = CString::new(config.path.as_str())
            .map_err(|_| connection_error(ConnectionErrorKind::Connect, "path contains a null byte"))?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        // SAFETY: c_path is NUL-terminated and db is a valid out-pointer
        let rc = unsafe {
            ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, config.flags.to_sqlite_flags(), ptr::null())
        };

        if rc != ffi::SQLITE_OK {
            let msg = if db.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: a handle is returned even on failure and must be closed
                unsafe {
                    let msg = ffi::last_error(db);
                    ffi::sqlite3_close(db);
                    msg
                }
            };
            return Err(connection_error(
                ConnectionErrorKind::Connect,
                format!("failed to open {}: {}", config.path, msg),
            ));
        }

        if config.busy_timeout_ms > 0 {
            let ms = c_int::try_from(config.busy_timeout_ms).unwrap_or(c_int::MAX);
            // SAFETY: db is valid
            unsafe { ffi::sqlite3_busy_timeout(db, ms) };
        }

        tracing::debug!(path = %config.path, "Opened SQLite connection");

        Ok(Self {
            inner: Mutex::new(SqliteInner {
                db,
                auto_commit: true,
                in_transaction: false,
            }),
            path: config.path.clone(),
        })
    }

    pub fn open_memory() -> Result<Self> {
        Self::open(&SqliteConfig::memory())
    }

    pub fn open_file(path: impl Into<String>) -> Result<Self> {
        Self::open(&SqliteConfig::file(path))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether auto-commit is currently on.
    pub fn auto_commit(&self) -> bool {
        self.lock().auto_commit
    }

    /// Whether an implicit transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.lock().in_transaction
    }

    /// Execute one or more statements without binding parameters.
    ///
    /// Runs outside the emulated transaction bookkeeping; intended for DDL
    /// and setup scripts.
    pub fn execute_raw(&self, sql: &str) -> Result<()> {
        let inner = self.lock();
        exec(inner.db, sql)
    }

    /// Rowid of the most recent successful insert.
    pub fn last_insert_rowid(&self) -> i64 {
        let inner = self.lock();
        // SAFETY: db is valid while the connection is open
        unsafe { ffi::sqlite3_last_insert_rowid(inner.db) }
    }

    /// Rows changed by the most recent statement.
    pub fn changes(&self) -> u64 {
        let inner = self.lock();
        // SAFETY: db is valid while the connection is open
        let n = unsafe { ffi::sqlite3_changes(inner.db) };
        u64::try_from(n).unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, SqliteInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one statement to completion, opening the implicit transaction first
    /// when auto-commit is off.
    fn run(&self, sql: &str, params: &[Value]) -> Result<(Vec<Row>, u64)> {
        let mut inner = self.lock();
        if inner.db.is_null() {
            return Err(connection_error(ConnectionErrorKind::Close, "connection is closed"));
        }
        if !inner.auto_commit && !inner.in_transaction {
            exec(inner.db, "BEGIN").map_err(|e| transaction_error("BEGIN", &e))?;
            inner.in_transaction = true;
            tracing::trace!(path = %self.path, "Opened implicit transaction");
        }

        let stmt = Statement::prepare(inner.db, sql)?;
        stmt.bind_all(params)?;
        let rows = stmt.collect_rows()?;
        drop(stmt);

        // SAFETY: db is valid
        let changes = unsafe { ffi::sqlite3_changes(inner.db) };
        Ok((rows, u64::try_from(changes).unwrap_or(0)))
    }

    fn end_transaction(&self, verb: &'static str) -> Result<()> {
        let mut inner = self.lock();
        if !inner.in_transaction {
            return Ok(());
        }
        // SAFETY: db is valid
        let open = unsafe { ffi::sqlite3_get_autocommit(inner.db) } == 0;
        if !open {
            // SQLite already ended it, e.g. after a constraint error with ON CONFLICT ROLLBACK.
            inner.in_transaction = false;
            return Ok(());
        }
        exec(inner.db, verb).map_err(|e| transaction_error(verb, &e))?;
        inner.in_transaction = false;
        tracing::debug!(path = %self.path, verb, "Ended transaction");
        Ok(())
    }
}

impl Connection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn set_auto_commit(&self, auto_commit: bool) -> Result<()> {
        if auto_commit && self.in_transaction() {
            self.end_transaction("COMMIT")?;
        }
        self.lock().auto_commit = auto_commit;
        Ok(())
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.run(sql, params).map(|(rows, _)| rows)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.run(sql, params).map(|(_, changes)| changes)
    }

    fn insert(&self, sql: &str, params: &[Value], key_column: &str) -> Result<Option<Value>> {
        let returning = format!("{sql} RETURNING {key_column}");
        let (rows, _) = self.run(&returning, params)?;
        Ok(rows.first().and_then(|row| row.get(0)).cloned())
    }

    fn commit(&self) -> Result<()> {
        self.end_transaction("COMMIT")
    }

    fn rollback(&self) -> Result<()> {
        self.end_transaction("ROLLBACK")
    }

    fn close(self: Box<Self>) -> Result<()> {
        let mut inner = self.lock();
        if inner.db.is_null() {
            return Ok(());
        }
        // SAFETY: db is valid and every statement has been finalized
        let rc = unsafe { ffi::sqlite3_close(inner.db) };
        if rc != ffi::SQLITE_OK {
            // Leave the handle for Drop to release with close_v2.
            return Err(connection_error(
                ConnectionErrorKind::Close,
                format!("failed to close {}: {}", self.path, ffi::error_string(rc)),
            ));
        }
        inner.db = ptr::null_mut();
        inner.in_transaction = false;
        tracing::debug!(path = %self.path, "Closed SQLite connection");
        Ok(())
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if !inner.db.is_null() {
            // SAFETY: db is valid and no longer used
            unsafe { ffi::sqlite3_close_v2(inner.db) };
            inner.db = ptr::null_mut();
        }
    }
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// A prepared statement, finalized on drop.
struct Statement<'db> {
    db: *mut ffi::sqlite3,
    stmt: *mut ffi::sqlite3_stmt,
    sql: &'db str,
}

impl<'db> Statement<'db> {
    fn prepare(db: *mut ffi::sqlite3, sql: &'db str) -> Result<Self> {
        let c_sql = CString::new(sql)
            .map_err(|_| query_error(QueryErrorKind::Syntax, sql, "SQL contains a null byte"))?;
        let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();
        let len = c_int::try_from(c_sql.as_bytes().len()).unwrap_or(c_int::MAX);

        // SAFETY: all pointers are valid for the duration of the call
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(db, c_sql.as_ptr(), len, &mut stmt, ptr::null_mut())
        };
        if rc != ffi::SQLITE_OK {
            return Err(last_query_error(db, sql));
        }
        Ok(Self { db, stmt, sql })
    }

    fn bind_all(&self, params: &[Value]) -> Result<()> {
        for (i, param) in params.iter().enumerate() {
            let index = c_int::try_from(i + 1).unwrap_or(c_int::MAX);
            // SAFETY: stmt is valid, index is 1-based
            let rc = unsafe { types::bind_value(self.stmt, index, param) };
            if rc != ffi::SQLITE_OK {
                // SAFETY: db is valid
                let msg = unsafe { ffi::last_error(self.db) };
                return Err(query_error(
                    QueryErrorKind::Database,
                    self.sql,
                    format!("failed to bind parameter {}: {}", i + 1, msg),
                ));
            }
        }
        Ok(())
    }

    fn collect_rows(&self) -> Result<Vec<Row>> {
        // SAFETY: stmt is valid
        let count = unsafe { ffi::sqlite3_column_count(self.stmt) };
        let names = (0..count)
            // SAFETY: index is within the column count
            .map(|i| unsafe { types::column_name(self.stmt, i) }.unwrap_or_else(|| format!("col{i}")))
            .collect();
        let columns = Arc::new(ColumnInfo::new(names));

        let mut rows = Vec::new();
        loop {
            // SAFETY: stmt is valid
            match unsafe { ffi::sqlite3_step(self.stmt) } {
                ffi::SQLITE_ROW => {
                    let values = (0..count)
                        // SAFETY: the statement is positioned on a row
                        .map(|i| unsafe { types::read_column(self.stmt, i) })
                        .collect();
                    rows.push(Row::with_columns(Arc::clone(&columns), values));
                }
                ffi::SQLITE_DONE => return Ok(rows),
                _ => return Err(last_query_error(self.db, self.sql)),
            }
        }
    }
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        // SAFETY: stmt came from sqlite3_prepare_v2 and is finalized once
        unsafe { ffi::sqlite3_finalize(self.stmt) };
    }
}

/// Run SQL text through `sqlite3_exec`.
fn exec(db: *mut ffi::sqlite3, sql: &str) -> Result<()> {
    let c_sql = CString::new(sql)
        .map_err(|_| query_error(QueryErrorKind::Syntax, sql, "SQL contains a null byte"))?;
    let mut errmsg: *mut std::ffi::c_char = ptr::null_mut();

    // SAFETY: all pointers are valid
    let rc = unsafe { ffi::sqlite3_exec(db, c_sql.as_ptr(), None, ptr::null_mut(), &mut errmsg) };
    if rc == ffi::SQLITE_OK {
        return Ok(());
    }

    let msg = if errmsg.is_null() {
        ffi::error_string(rc).to_string()
    } else {
        // SAFETY: errmsg was allocated by SQLite and is freed exactly once
        unsafe {
            let msg = CStr::from_ptr(errmsg).to_string_lossy().into_owned();
            ffi::sqlite3_free(errmsg.cast());
            msg
        }
    };
    Err(query_error(error_code_to_kind(rc, &msg), sql, msg))
}

fn last_query_error(db: *mut ffi::sqlite3, sql: &str) -> Error {
    // SAFETY: db is valid
    let (code, msg) = unsafe { (ffi::sqlite3_errcode(db), ffi::last_error(db)) };
    query_error(error_code_to_kind(code, &msg), sql, msg)
}

fn error_code_to_kind(code: c_int, message: &str) -> QueryErrorKind {
    match code & 0xff {
        ffi::SQLITE_CONSTRAINT => QueryErrorKind::Constraint,
        ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => QueryErrorKind::Busy,
        ffi::SQLITE_PERM | ffi::SQLITE_AUTH | ffi::SQLITE_READONLY => QueryErrorKind::Permission,
        ffi::SQLITE_NOTFOUND => QueryErrorKind::NotFound,
        ffi::SQLITE_ERROR if message.contains("syntax error") => QueryErrorKind::Syntax,
        ffi::SQLITE_ERROR if message.starts_with("no such") => QueryErrorKind::NotFound,
        _ => QueryErrorKind::Database,
    }
}

fn query_error(kind: QueryErrorKind, sql: &str, message: impl Into<String>) -> Error {
    Error::from(QueryError {
        kind,
        sql: Some(sql.to_string()),
        message: message.into(),
        source: None,
    })
}

fn connection_error(kind: ConnectionErrorKind, message: impl Into<String>) -> Error {
    Error::from(ConnectionError {
        kind,
        message: message.into(),
        source: None,
    })
}

fn transaction_error(verb: &str, cause: &Error) -> Error {
    connection_error(ConnectionErrorKind::Transaction, format!("{verb} failed: {cause}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlrepo_core::ErrorKind;

    fn people() -> SqliteConnection {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE person (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)")
            .unwrap();
        conn
    }

    fn count(conn: &SqliteConnection) -> i64 {
        let rows = conn.query("SELECT COUNT(*) FROM person", &[]).unwrap();
        rows[0].get_as::<i64>(0).unwrap()
    }

    #[test]
    fn test_open_memory() {
        let conn = SqliteConnection::open_memory().unwrap();
        assert_eq!(conn.path(), ":memory:");
        assert!(conn.auto_commit());
        assert_eq!(conn.dialect(), Dialect::Sqlite);
    }

    #[test]
    fn test_execute_raw() {
        let conn = people();
        conn.execute_raw("INSERT INTO person (name, age) VALUES ('Alice', 30)")
            .unwrap();
        assert_eq!(conn.changes(), 1);
        assert_eq!(conn.last_insert_rowid(), 1);
    }

    #[test]
    fn test_parameterized_query() {
        let conn = people();
        let n = conn
            .execute(
                "INSERT INTO person (name, age) VALUES (?, ?)",
                &[Value::from("Alice"), Value::Int(30)],
            )
            .unwrap();
        assert_eq!(n, 1);

        let rows = conn
            .query("SELECT * FROM person WHERE name = ?", &[Value::from("Alice")])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_named::<String>("name").unwrap(), "Alice");
        assert_eq!(rows[0].get_named::<i32>("age").unwrap(), 30);
    }

    #[test]
    fn test_value_storage_classes() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE t (a, b, c, d, e, f)").unwrap();
        conn.execute(
            "INSERT INTO t VALUES (?, ?, ?, ?, ?, ?)",
            &[
                Value::Null,
                Value::Bool(true),
                Value::BigInt(1 << 40),
                Value::Double(1.5),
                Value::from("text"),
                Value::Bytes(vec![1, 2, 3]),
            ],
        )
        .unwrap();

        let rows = conn.query("SELECT * FROM t", &[]).unwrap();
        let values: Vec<Value> = rows[0].values().cloned().collect();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Int(1),
                Value::BigInt(1 << 40),
                Value::Double(1.5),
                Value::from("text"),
                Value::Bytes(vec![1, 2, 3]),
            ]
        );
    }

    #[test]
    fn test_insert_returns_generated_key() {
        let conn = people();
        let key = conn
            .insert(
                "INSERT OR REPLACE INTO person (id, name, age) VALUES (?, ?, ?)",
                &[Value::Null, Value::from("Ada"), Value::Int(36)],
                "id",
            )
            .unwrap();
        assert_eq!(key, Some(Value::Int(1)));

        let key = conn
            .insert(
                "INSERT OR REPLACE INTO person (id, name, age) VALUES (?, ?, ?)",
                &[Value::Int(1), Value::from("Ada"), Value::Int(37)],
                "id",
            )
            .unwrap();
        assert_eq!(key, Some(Value::Int(1)));
        assert_eq!(count(&conn), 1);
    }

    #[test]
    fn test_auto_commit_off_rollback() {
        let conn = people();
        conn.set_auto_commit(false).unwrap();
        assert!(!conn.in_transaction());

        conn.execute("INSERT INTO person (name) VALUES (?)", &[Value::from("Bob")])
            .unwrap();
        assert!(conn.in_transaction());
        conn.rollback().unwrap();
        assert!(!conn.in_transaction());
        assert_eq!(count(&conn), 0);
    }

    #[test]
    fn test_auto_commit_off_commit() {
        let conn = people();
        conn.set_auto_commit(false).unwrap();
        conn.execute("INSERT INTO person (name) VALUES (?)", &[Value::from("Bob")])
            .unwrap();
        conn.commit().unwrap();
        conn.rollback().unwrap();
        assert_eq!(count(&conn), 1);
    }

    #[test]
    fn test_commit_without_transaction_is_noop() {
        let conn = people();
        conn.commit().unwrap();
        conn.rollback().unwrap();
    }

    #[test]
    fn test_enabling_auto_commit_commits() {
        let conn = people();
        conn.set_auto_commit(false).unwrap();
        conn.execute("INSERT INTO person (name) VALUES (?)", &[Value::from("Eve")])
            .unwrap();
        conn.set_auto_commit(true).unwrap();
        assert!(!conn.in_transaction());
        conn.rollback().unwrap();
        assert_eq!(count(&conn), 1);
    }

    #[test]
    fn test_error_kinds() {
        let conn = people();

        let err = conn.query("SELEC nothing", &[]).unwrap_err();
        match err.kind() {
            ErrorKind::Query(q) => assert_eq!(q.kind, QueryErrorKind::Syntax),
            other => panic!("unexpected {other:?}"),
        }

        let err = conn.query("SELECT * FROM missing", &[]).unwrap_err();
        match err.kind() {
            ErrorKind::Query(q) => {
                assert_eq!(q.kind, QueryErrorKind::NotFound);
                assert_eq!(q.sql.as_deref(), Some("SELECT * FROM missing"));
            }
            other => panic!("unexpected {other:?}"),
        }

        conn.execute("INSERT INTO person (id) VALUES (1)", &[]).unwrap();
        let err = conn
            .execute("INSERT INTO person (id) VALUES (1)", &[])
            .unwrap_err();
        assert!(err.is_data_access());
        match err.kind() {
            ErrorKind::Query(q) => assert_eq!(q.kind, QueryErrorKind::Constraint),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_close() {
        let conn: Box<dyn Connection> = Box::new(people());
        conn.close().unwrap();
    }

    #[test]
    fn test_open_missing_read_write_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");
        let config = SqliteConfig::file(path.to_string_lossy()).flags(OpenFlags::read_write());
        let err = SqliteConnection::open(&config).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Connection(c) if c.kind == ConnectionErrorKind::Connect));
    }

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("people.db").to_string_lossy().into_owned();

        let conn = SqliteConnection::open_file(path.clone()).unwrap();
        conn.execute_raw("CREATE TABLE person (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)")
            .unwrap();
        conn.execute("INSERT INTO person (name) VALUES (?)", &[Value::from("Ada")])
            .unwrap();
        Box::new(conn).close().unwrap();

        let conn = SqliteConnection::open_file(path).unwrap();
        assert_eq!(count(&conn), 1);
    }
}
