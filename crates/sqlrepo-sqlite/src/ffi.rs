//! The slice of the libsqlite3 C API the driver uses.
//!
//! Bindings come from `libsqlite3-sys`, which compiles the bundled SQLite
//! amalgamation. This module narrows them to what the driver needs and adds
//! a few safe helpers.

use std::ffi::{CStr, c_int};

pub use libsqlite3_sys::{
    SQLITE_AUTH, SQLITE_BLOB, SQLITE_BUSY, SQLITE_CONSTRAINT, SQLITE_DONE, SQLITE_ERROR,
    SQLITE_FLOAT, SQLITE_INTEGER, SQLITE_LOCKED, SQLITE_NOTFOUND, SQLITE_NULL, SQLITE_OK,
    SQLITE_OPEN_CREATE, SQLITE_OPEN_FULLMUTEX, SQLITE_OPEN_NOMUTEX, SQLITE_OPEN_READONLY,
    SQLITE_OPEN_READWRITE, SQLITE_OPEN_SHAREDCACHE, SQLITE_OPEN_URI, SQLITE_PERM,
    SQLITE_READONLY, SQLITE_ROW, SQLITE_TEXT, SQLITE_TRANSIENT, sqlite3, sqlite3_bind_blob,
    sqlite3_bind_double, sqlite3_bind_int, sqlite3_bind_int64, sqlite3_bind_null,
    sqlite3_bind_text, sqlite3_busy_timeout, sqlite3_changes, sqlite3_close,
    sqlite3_column_blob, sqlite3_column_bytes, sqlite3_column_count, sqlite3_column_double,
    sqlite3_column_int64, sqlite3_column_name, sqlite3_column_text, sqlite3_column_type,
    sqlite3_errcode, sqlite3_errmsg, sqlite3_errstr, sqlite3_exec, sqlite3_finalize,
    sqlite3_free, sqlite3_get_autocommit, sqlite3_last_insert_rowid, sqlite3_libversion,
    sqlite3_libversion_number, sqlite3_open_v2, sqlite3_prepare_v2, sqlite3_step, sqlite3_stmt,
};

// `libsqlite3-sys` omits `sqlite3_close_v2` from its pregenerated bundled
// bindings; the symbol is still exported by the bundled library.
unsafe extern "C" {
    pub fn sqlite3_close_v2(db: *mut sqlite3) -> c_int;
}

/// SQLite library version string, e.g. "3.46.0".
pub fn version() -> &'static str {
    // SAFETY: sqlite3_libversion returns a pointer to a static string
    let version = unsafe { CStr::from_ptr(sqlite3_libversion()) };
    version.to_str().unwrap_or("unknown")
}

/// SQLite library version number, e.g. 3046000.
pub fn version_number() -> i32 {
    // SAFETY: no preconditions
    unsafe { sqlite3_libversion_number() }
}

/// English description of a result code.
pub fn error_string(code: c_int) -> &'static str {
    // SAFETY: sqlite3_errstr returns a static string for every code
    let msg = unsafe { CStr::from_ptr(sqlite3_errstr(code)) };
    msg.to_str().unwrap_or("unknown error")
}

/// Most recent error message on `db`.
///
/// # Safety
/// `db` must be a valid connection handle.
pub unsafe fn last_error(db: *mut sqlite3) -> String {
    // SAFETY: caller guarantees db is valid; errmsg never returns null for a valid handle
    let msg = unsafe { CStr::from_ptr(sqlite3_errmsg(db)) };
    msg.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(version().starts_with('3'));
        assert!(version_number() >= 3_035_000, "RETURNING needs 3.35+");
    }

    #[test]
    fn test_error_string() {
        assert_eq!(error_string(SQLITE_OK), "not an error");
        assert_eq!(error_string(SQLITE_BUSY), "database is locked");
        assert_eq!(error_string(SQLITE_CONSTRAINT), "constraint failed");
    }
}
