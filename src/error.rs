//! Error types for QuantumDbLog
//!
//! This module defines every error the handler can surface. Construction errors
//! (configuration, connection, schema) leave no half-built handler behind; per-record
//! errors (connection, insert) are returned to whoever called `emit`.

use thiserror::Error;

/// Main error type for QuantumDbLog operations
#[derive(Error, Debug)]
pub enum QuantumDbLogError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Configuration file not found
    #[error("Configuration file not found: {0}")]
    ConfigFileMissing(String),

    /// TOML parsing errors
    #[error("TOML parsing error: {source}")]
    TomlError {
        #[from]
        source: toml::de::Error,
    },

    /// Invalid log level
    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    /// Table name that cannot be used as a plain SQL identifier
    #[error("Invalid table name: {0}")]
    InvalidTableName(String),

    /// Database URI scheme unknown, or its backend was not compiled in
    #[error("Unsupported database: {0}")]
    UnsupportedDatabase(String),

    /// Installing the global subscriber failed
    #[error("Initialization error: {0}")]
    InitializationError(String),

    /// The store cannot be reached or no connection could be checked out
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// An existing table carries a column the handler does not know about
    #[error("Database table {table} has unexpected column {column}")]
    SchemaMismatch { table: String, column: String },

    /// The engine rejected an insert
    #[error("Insert failed: {source}")]
    InsertFailure {
        #[source]
        source: diesel::result::Error,
    },

    /// Introspection or DDL statement failed
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// I/O errors (reading configuration files)
    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

/// Result type alias for QuantumDbLog operations
pub type Result<T> = std::result::Result<T, QuantumDbLogError>;

impl QuantumDbLogError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a new connection error
    pub fn connection<S: Into<String>>(msg: S) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a new database error
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::DatabaseError(msg.into())
    }

    /// Create a new schema mismatch error
    pub fn schema_mismatch<T: Into<String>, C: Into<String>>(table: T, column: C) -> Self {
        Self::SchemaMismatch {
            table: table.into(),
            column: column.into(),
        }
    }

    /// Classify a failed insert. A dropped connection is reported as a connection
    /// error, everything else the engine says is an insert failure.
    pub fn from_insert(source: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};

        match source {
            Error::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
                Self::ConnectionError(info.message().to_string())
            }
            source => Self::InsertFailure { source },
        }
    }

    /// Check if this error only affects the current call
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::ConnectionError(_) => true,
            Self::InsertFailure { .. } => true,
            Self::DatabaseError(_) => true,
            Self::IoError { .. } => true,
            Self::SchemaMismatch { .. } => false,
            Self::InitializationError(_) => false,
            _ => false,
        }
    }

    /// Get the error category for logging purposes
    pub fn category(&self) -> &'static str {
        match self {
            Self::ConfigError(_)
            | Self::ConfigFileMissing(_)
            | Self::TomlError { .. }
            | Self::InvalidLogLevel(_)
            | Self::InvalidTableName(_)
            | Self::UnsupportedDatabase(_) => "config",
            Self::InitializationError(_) => "initialization",
            Self::ConnectionError(_) => "connection",
            Self::SchemaMismatch { .. } => "schema",
            Self::InsertFailure { .. } => "insert",
            Self::DatabaseError(_) => "database",
            Self::IoError { .. } => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::result::{DatabaseErrorKind, Error as DieselError};
    use std::io;

    #[test]
    fn test_error_creation() {
        let config_err = QuantumDbLogError::config("Invalid configuration");
        assert!(matches!(config_err, QuantumDbLogError::ConfigError(_)));
        assert_eq!(
            config_err.to_string(),
            "Configuration error: Invalid configuration"
        );

        let conn_err = QuantumDbLogError::connection("refused");
        assert_eq!(conn_err.to_string(), "Connection error: refused");
    }

    #[test]
    fn test_schema_mismatch_names_table_and_column() {
        let err = QuantumDbLogError::schema_mismatch("app_logs", "extra_col");
        let msg = err.to_string();
        assert!(msg.contains("app_logs"));
        assert!(msg.contains("extra_col"));
    }

    #[test]
    fn test_insert_classification() {
        let err = QuantumDbLogError::from_insert(DieselError::NotFound);
        assert!(matches!(err, QuantumDbLogError::InsertFailure { .. }));

        let closed = DieselError::DatabaseError(
            DatabaseErrorKind::ClosedConnection,
            Box::new("server closed the connection".to_string()),
        );
        let err = QuantumDbLogError::from_insert(closed);
        assert!(matches!(err, QuantumDbLogError::ConnectionError(ref m) if m.contains("server closed")));
    }

    #[test]
    fn test_error_from_conversions() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let err: QuantumDbLogError = io_error.into();
        assert!(matches!(err, QuantumDbLogError::IoError { .. }));
        assert!(err.to_string().contains("File not found"));
    }

    #[test]
    fn test_toml_error_conversion() {
        let toml_error = toml::from_str::<toml::Value>("key = ").unwrap_err();
        let err: QuantumDbLogError = toml_error.into();
        assert!(matches!(err, QuantumDbLogError::TomlError { .. }));
        assert!(err.to_string().starts_with("TOML parsing error"));
        assert_eq!(err.category(), "config");
    }

    #[test]
    fn test_error_recoverability() {
        assert!(QuantumDbLogError::connection("temp failure").is_recoverable());
        assert!(QuantumDbLogError::from_insert(DieselError::NotFound).is_recoverable());
        assert!(!QuantumDbLogError::schema_mismatch("t", "c").is_recoverable());
        assert!(!QuantumDbLogError::config("invalid config").is_recoverable());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(QuantumDbLogError::config("test").category(), "config");
        assert_eq!(QuantumDbLogError::connection("test").category(), "connection");
        assert_eq!(QuantumDbLogError::database("test").category(), "database");
        assert_eq!(
            QuantumDbLogError::schema_mismatch("t", "c").category(),
            "schema"
        );
        assert_eq!(
            QuantumDbLogError::from_insert(DieselError::NotFound).category(),
            "insert"
        );
        assert_eq!(
            QuantumDbLogError::InvalidTableName(String::new()).category(),
            "config"
        );
    }

    #[test]
    fn test_error_debug_format() {
        let err = QuantumDbLogError::config("test error");
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("ConfigError"));
        assert!(debug_str.contains("test error"));
    }
}
