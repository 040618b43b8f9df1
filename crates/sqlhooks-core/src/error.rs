//! Error types shared by drivers and the hook layer.
//!
//! Execution-time errors belong to the driver that produced them and travel
//! through the hook layer untouched. The only category the hook layer itself
//! produces is [`DriverError`], raised while registering or looking up drivers.

use std::fmt;

/// The error type for every driver operation.
#[derive(Debug)]
pub enum Error {
    /// The data source could not be opened
    Connection(ConnectionError),
    /// A statement or query was rejected
    Query(QueryError),
    /// A column value could not be converted to the requested type
    Type(TypeError),
    /// Transaction state errors
    Transaction(TransactionError),
    /// Driver registration and lookup errors
    Driver(DriverError),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub message: String,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    /// The statement that failed, once the driver has attached it
    pub sql: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Malformed statement
    Syntax,
    /// Constraint violation, such as creating a table twice
    Constraint,
    /// Table or column not found
    NotFound,
    /// Wrong number or type of bound parameters
    Parameter,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// A transaction is already open on this connection
    AlreadyActive,
    /// No transaction is open on this connection
    NotActive,
}

/// Failure to locate or register a driver.
#[derive(Debug)]
pub struct DriverError {
    pub kind: DriverErrorKind,
    /// The driver name involved
    pub name: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// No driver is registered under the name
    NotFound,
    /// A driver is already registered under the name
    AlreadyRegistered,
}

impl ConnectionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl QueryError {
    /// Create a query error without SQL context.
    pub fn new(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            sql: None,
            message: message.into(),
        }
    }

    /// Attach the statement that failed.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }
}

impl TransactionError {
    pub fn new(kind: TransactionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl DriverError {
    pub fn not_found(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: DriverErrorKind::NotFound,
            message: format!("unknown driver \"{name}\" (forgotten register?)"),
            name,
        }
    }

    pub fn already_registered(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            kind: DriverErrorKind::AlreadyRegistered,
            message: format!("register called twice for driver \"{name}\""),
            name,
        }
    }
}

impl Error {
    /// Did the data source fail to open?
    pub fn is_connection_error(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Get the SQL that caused this error, if available.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }

    /// The driver error kind, if this is a registration failure.
    pub fn driver_kind(&self) -> Option<DriverErrorKind> {
        match self {
            Error::Driver(d) => Some(d.kind),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Query(e) => write!(f, "Query error: {}", e.message),
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::Transaction(e) => write!(f, "Transaction error: {}", e.message),
            Error::Driver(e) => write!(f, "Driver error: {}", e.message),
        }
    }
}

impl std::error::Error for Error {}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sql {
            Some(sql) => write!(f, "{} in {sql:?}", self.message),
            None => write!(f, "{}", self.message),
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

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<DriverError> for Error {
    fn from(err: DriverError) -> Self {
        Error::Driver(err)
    }
}

/// Result type alias for driver operations.
pub type Result<T> = std::result::Result<T, Error>;
