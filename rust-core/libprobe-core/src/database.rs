//! # Database Connectivity
//!
//! Short-lived verification connections through SQLx. A connection is
//! opened and immediately closed to prove a connection string is usable;
//! nothing else talks to the database from this crate.
//!
//! The [`Connector`] trait is the seam the connection selector depends on,
//! so tests can substitute a scripted connector for a real database.

use crate::server::BoxFuture;
use sqlx::postgres::PgConnection;
use sqlx::sqlite::SqliteConnection;
use sqlx::Connection;
use thiserror::Error;
use tracing::debug;

/// Why a verification connection could not be established
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// The database could not be reached or refused the session
    #[error("database connection failed: {0}")]
    Connectivity(String),
    /// Anything else: malformed connection string, unsupported driver, ...
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl From<sqlx::Error> for VerifyError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Database(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::Connectivity(err.to_string()),
            other => Self::Unexpected(other.to_string()),
        }
    }
}

/// Supported database backends, chosen from the connection string scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    /// `sqlite:` URLs
    Sqlite,
    /// `postgres://` / `postgresql://` URLs
    Postgres,
}

impl DatabaseKind {
    /// Detect the backend from a connection string
    #[must_use]
    pub fn from_url(url: &str) -> Option<Self> {
        let scheme = url.split_once(':')?.0.to_ascii_lowercase();
        match scheme.as_str() {
            "sqlite" => Some(Self::Sqlite),
            "postgres" | "postgresql" => Some(Self::Postgres),
            _ => None,
        }
    }
}

/// Opens verification connections
pub trait Connector: Send + Sync {
    /// Open a connection to `connection_string` and close it again
    fn verify<'a>(&'a self, connection_string: &'a str) -> BoxFuture<'a, Result<(), VerifyError>>;
}

/// Connector backed by SQLx drivers
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlxConnector;

impl SqlxConnector {
    /// Create a new SQLx connector
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    async fn open_and_close(connection_string: &str) -> Result<(), VerifyError> {
        let kind = DatabaseKind::from_url(connection_string).ok_or_else(|| {
            VerifyError::Unexpected("unsupported connection string scheme".to_string())
        })?;

        debug!(?kind, "Opening verification connection");
        match kind {
            DatabaseKind::Sqlite => {
                SqliteConnection::connect(connection_string)
                    .await?
                    .close()
                    .await?;
            }
            DatabaseKind::Postgres => {
                PgConnection::connect(connection_string)
                    .await?
                    .close()
                    .await?;
            }
        }
        Ok(())
    }
}

impl Connector for SqlxConnector {
    fn verify<'a>(&'a self, connection_string: &'a str) -> BoxFuture<'a, Result<(), VerifyError>> {
        Box::pin(Self::open_and_close(connection_string))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_url() {
        assert_eq!(
            DatabaseKind::from_url("sqlite::memory:"),
            Some(DatabaseKind::Sqlite)
        );
        assert_eq!(
            DatabaseKind::from_url("postgres://localhost/library"),
            Some(DatabaseKind::Postgres)
        );
        assert_eq!(
            DatabaseKind::from_url("PostgreSQL://localhost/library"),
            Some(DatabaseKind::Postgres)
        );
        assert_eq!(
            DatabaseKind::from_url("Server=tcp:example.database.windows.net"),
            None
        );
        assert_eq!(DatabaseKind::from_url("no scheme at all"), None);
    }

    #[tokio::test]
    async fn test_sqlite_memory_verifies() {
        let connector = SqlxConnector::new();
        assert_eq!(connector.verify("sqlite::memory:").await, Ok(()));
    }

    #[tokio::test]
    async fn test_sqlite_missing_directory_is_connectivity_failure() {
        let connector = SqlxConnector::new();
        let result = connector
            .verify("sqlite:/nonexistent-libprobe-dir/library.db")
            .await;
        assert!(matches!(result, Err(VerifyError::Connectivity(_))));
    }

    #[tokio::test]
    async fn test_unsupported_scheme_is_unexpected() {
        let connector = SqlxConnector::new();
        let result = connector
            .verify("Server=tcp:library.database.windows.net,1433")
            .await;
        assert!(matches!(result, Err(VerifyError::Unexpected(_))));
    }

    #[test]
    fn test_sqlx_error_mapping() {
        let io = sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert!(matches!(VerifyError::from(io), VerifyError::Connectivity(_)));

        let config = sqlx::Error::Configuration("bad url".into());
        assert!(matches!(
            VerifyError::from(config),
            VerifyError::Unexpected(_)
        ));
    }
}
