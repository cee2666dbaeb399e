//! Error types for sqlrepo operations.
//!
//! Every failure is an [`Error`]: an [`ErrorKind`] plus the list of secondary
//! errors that were raised while handling it (a rollback that failed after the
//! unit of work had already failed, for instance). The kinds group into the
//! four [`ErrorCategory`] values that callers branch on.

use std::fmt;

/// The primary error type for all sqlrepo operations.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    suppressed: Vec<Error>,
}

/// What went wrong.
#[derive(Debug)]
pub enum ErrorKind {
    /// Entity or repository configuration is invalid
    Config(ConfigError),
    /// Operation not allowed in the current state
    State(StateError),
    /// Statement execution failed
    Query(QueryError),
    /// Connection could not be acquired, configured or released
    Connection(ConnectionError),
    /// A column value could not be converted to the requested Rust type
    Type(TypeError),
    /// A data-access failure raised inside a repository call
    Repository(RepositoryError),
    /// Caller-defined failure
    Custom(String),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid configuration; fatal and never retried.
    Configuration,
    /// Illegal call for the current state; fatal per call.
    State,
    /// Failure talking to the database.
    DataAccess,
    /// Anything raised by caller code.
    Other,
}

#[derive(Debug)]
pub struct ConfigError {
    pub kind: ConfigErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorKind {
    /// Property type has no SQL mapping
    UnmappedType,
    /// More than one property carries the identifier marker
    MultiplePrimaryKeys,
    /// Operation needs an identifier column but the entity declares none
    MissingIdentifier,
    /// A `find_by_<property>` method names a property the entity lacks
    UnknownProperty,
    /// The repository contract cannot be implemented
    InvalidContract,
}

#[derive(Debug)]
pub struct StateError {
    pub kind: StateErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateErrorKind {
    /// No transaction context is active
    NoConnection,
    /// A transaction context is already active for this unit of work
    NestedTransaction,
    /// The repository method has no dispatch rule
    UnsupportedOperation,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, not null, ...)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Permission denied
    Permission,
    /// Database is busy or locked
    Busy,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to establish connection
    Connect,
    /// Failed to begin, commit or roll back
    Transaction,
    /// Failed to close the connection
    Close,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug)]
pub struct RepositoryError {
    /// Repository method that was executing
    pub method: String,
    /// The data-access failure
    pub cause: Box<Error>,
}

impl Error {
    /// Create an error of the given kind with no suppressed errors.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            suppressed: Vec::new(),
        }
    }

    /// Configuration error.
    pub fn config(kind: ConfigErrorKind, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config(ConfigError {
            kind,
            message: message.into(),
        }))
    }

    /// State error.
    pub fn state(kind: StateErrorKind, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::State(StateError {
            kind,
            message: message.into(),
        }))
    }

    /// The state error raised when no transaction context is active.
    pub fn no_connection() -> Self {
        Self::state(StateErrorKind::NoConnection, "no connection available")
    }

    /// Caller-defined error.
    pub fn custom(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Custom(message.into()))
    }

    /// Wrap a data-access failure raised by a repository method.
    ///
    /// Configuration and state errors pass through unchanged, as does an
    /// error that is already wrapped.
    pub fn repository(method: impl Into<String>, cause: Error) -> Self {
        if cause.category() != ErrorCategory::DataAccess || cause.is_repository() {
            return cause;
        }
        Self::new(ErrorKind::Repository(RepositoryError {
            method: method.into(),
            cause: Box::new(cause),
        }))
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }

    /// Classify this error, looking through the repository wrapper.
    pub fn category(&self) -> ErrorCategory {
        match &self.kind {
            ErrorKind::Config(_) => ErrorCategory::Configuration,
            ErrorKind::State(_) => ErrorCategory::State,
            ErrorKind::Query(_)
            | ErrorKind::Connection(_)
            | ErrorKind::Type(_)
            | ErrorKind::Repository(_) => ErrorCategory::DataAccess,
            ErrorKind::Custom(_) => ErrorCategory::Other,
        }
    }

    pub fn is_config(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    pub fn is_state(&self) -> bool {
        self.category() == ErrorCategory::State
    }

    pub fn is_data_access(&self) -> bool {
        self.category() == ErrorCategory::DataAccess
    }

    pub fn is_repository(&self) -> bool {
        matches!(self.kind, ErrorKind::Repository(_))
    }

    /// The configuration error kind, if this is a configuration error.
    pub fn config_kind(&self) -> Option<ConfigErrorKind> {
        match &self.kind {
            ErrorKind::Config(e) => Some(e.kind),
            _ => None,
        }
    }

    /// The state error kind, if this is a state error.
    pub fn state_kind(&self) -> Option<StateErrorKind> {
        match &self.kind {
            ErrorKind::State(e) => Some(e.kind),
            _ => None,
        }
    }

    /// Strip a repository wrapper, returning the original data-access failure.
    ///
    /// Suppressed errors recorded on the wrapper move to the cause.
    pub fn unwrap_repository(self) -> Error {
        match self.kind {
            ErrorKind::Repository(wrapper) => {
                let mut cause = *wrapper.cause;
                cause.suppressed.extend(self.suppressed);
                cause
            }
            kind => Error {
                kind,
                suppressed: self.suppressed,
            },
        }
    }

    /// Attach a secondary error raised while handling this one.
    pub fn add_suppressed(&mut self, other: Error) {
        self.suppressed.push(other);
    }

    /// Record the column a type error was raised for. Other kinds and the
    /// suppressed list are left as they are.
    pub fn with_type_column(mut self, column: &str) -> Self {
        if let ErrorKind::Type(te) = &mut self.kind {
            te.column = Some(column.to_string());
        }
        self
    }

    /// Builder form of [`add_suppressed`](Self::add_suppressed).
    pub fn with_suppressed(mut self, other: Error) -> Self {
        self.add_suppressed(other);
        self
    }

    pub fn suppressed(&self) -> &[Error] {
        &self.suppressed
    }

    /// Get the SQL that caused this error, if available.
    pub fn sql(&self) -> Option<&str> {
        match &self.kind {
            ErrorKind::Query(q) => q.sql.as_deref(),
            ErrorKind::Repository(r) => r.cause.sql(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::Config(e) => write!(f, "Configuration error: {}", e.message)?,
            ErrorKind::State(e) => write!(f, "State error: {}", e.message)?,
            ErrorKind::Query(e) => write!(f, "Query error: {}", e)?,
            ErrorKind::Connection(e) => write!(f, "Connection error: {}", e.message)?,
            ErrorKind::Type(e) => write!(f, "Type error: {}", e)?,
            ErrorKind::Repository(e) => write!(f, "Repository error in {}: {}", e.method, e.cause)?,
            ErrorKind::Custom(msg) => write!(f, "{}", msg)?,
        }
        if !self.suppressed.is_empty() {
            write!(f, " ({} suppressed)", self.suppressed.len())?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Repository(e) => Some(e.cause.as_ref()),
            ErrorKind::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            ErrorKind::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sql) = &self.sql {
            write!(f, "{} [{}]", self.message, sql)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::new(ErrorKind::Config(err))
    }
}

impl From<StateError> for Error {
    fn from(err: StateError) -> Self {
        Error::new(ErrorKind::State(err))
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::new(ErrorKind::Query(err))
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::new(ErrorKind::Connection(err))
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::new(ErrorKind::Type(err))
    }
}

/// Result type alias for sqlrepo operations.
pub type Result<T> = std::result::Result<T, Error>;
