//! # Connection Selector
//!
//! Single source of truth for which of the two configured databases the
//! service talks to. Switching is verified with a real connection and
//! rolled back when the verification fails.
//!
//! The `(key, connection string)` pair lives behind one `tokio` `RwLock`.
//! A switch holds the write half for its whole duration, verification
//! included, so readers never observe a tentative or half-restored pair
//! and two switches cannot interleave.

use crate::database::{Connector, VerifyError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Logical database identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DbKey {
    /// The legacy database
    Old,
    /// The current database
    New,
}

impl DbKey {
    /// Both keys, in declaration order
    pub const ALL: [Self; 2] = [Self::Old, Self::New];

    /// Wire name of the key
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Old => "old",
            Self::New => "new",
        }
    }
}

impl fmt::Display for DbKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DbKey {
    type Err = SelectorError;

    /// Keys are matched exactly; `"Old"` or `" old"` are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "old" => Ok(Self::Old),
            "new" => Ok(Self::New),
            other => Err(SelectorError::InvalidKey {
                key: other.to_string(),
            }),
        }
    }
}

/// Static key → connection string mapping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct ConnectionStrings {
    /// Connection string of the legacy database
    pub old: String,
    /// Connection string of the current database
    pub new: String,
}

impl ConnectionStrings {
    /// Connection string for a typed key
    #[must_use]
    pub fn get(&self, key: DbKey) -> &str {
        match key {
            DbKey::Old => &self.old,
            DbKey::New => &self.new,
        }
    }
}

/// Errors reported by [`ConnectionSelector`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    /// The requested key is neither `old` nor `new`; nothing changed
    #[error("invalid database key '{key}', valid keys are 'old' or 'new'")]
    InvalidKey {
        /// The rejected key
        key: String,
    },

    /// Verification could not connect; the previous key was restored
    #[error("database connection failed, reverted to {reverted_to}: {reason}")]
    ConnectivityFailure {
        /// Key active again after rollback
        reverted_to: DbKey,
        /// Driver message
        reason: String,
    },

    /// Verification failed for another reason; the previous key was restored
    #[error("unexpected error, reverted to {reverted_to}: {reason}")]
    UnexpectedError {
        /// Key active again after rollback
        reverted_to: DbKey,
        /// Error message
        reason: String,
    },
}

impl SelectorError {
    fn rolled_back(reverted_to: DbKey, failure: VerifyError) -> Self {
        match failure {
            VerifyError::Connectivity(reason) => Self::ConnectivityFailure {
                reverted_to,
                reason,
            },
            VerifyError::Unexpected(reason) => Self::UnexpectedError {
                reverted_to,
                reason,
            },
        }
    }
}

/// The currently selected database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Active key
    pub key: DbKey,
    /// Connection string for `key`
    pub connection_string: String,
}

/// Switchable active-database holder with verify-then-commit semantics
#[derive(Clone)]
pub struct ConnectionSelector {
    strings: Arc<ConnectionStrings>,
    active: Arc<RwLock<Selection>>,
    connector: Arc<dyn Connector>,
}

impl fmt::Debug for ConnectionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionSelector")
            .field("strings", &self.strings)
            .finish_non_exhaustive()
    }
}

impl ConnectionSelector {
    /// Create a selector starting on `initial`
    pub fn new(
        strings: ConnectionStrings,
        initial: DbKey,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let selection = Selection {
            key: initial,
            connection_string: strings.get(initial).to_string(),
        };
        Self {
            strings: Arc::new(strings),
            active: Arc::new(RwLock::new(selection)),
            connector,
        }
    }

    /// Currently active key
    pub async fn current(&self) -> DbKey {
        self.active.read().await.key
    }

    /// Consistent copy of the active key and its connection string
    pub async fn snapshot(&self) -> Selection {
        self.active.read().await.clone()
    }

    /// Connection string configured for `key`
    ///
    /// # Errors
    ///
    /// `SelectorError::InvalidKey` when `key` is not `old` or `new`
    pub fn connection_string_for(&self, key: &str) -> Result<&str, SelectorError> {
        let key: DbKey = key.parse()?;
        Ok(self.strings.get(key))
    }

    /// Verify the active connection string without changing anything
    ///
    /// # Errors
    ///
    /// The connector's failure, if the active database is unreachable
    pub async fn check_active(&self) -> Result<DbKey, VerifyError> {
        let selection = self.snapshot().await;
        self.connector.verify(&selection.connection_string).await?;
        Ok(selection.key)
    }

    /// Switch to `requested`, verifying the new connection
    ///
    /// On verification failure the previous key and its string are
    /// reinstated without re-verifying them, and the error names the key
    /// that is active again.
    ///
    /// # Errors
    ///
    /// - `SelectorError::InvalidKey` if `requested` is not `old`/`new`
    /// - `SelectorError::ConnectivityFailure` if the database is unreachable
    /// - `SelectorError::UnexpectedError` for any other verification failure
    pub async fn switch(&self, requested: &str) -> Result<DbKey, SelectorError> {
        let key: DbKey = requested.parse().map_err(|e| {
            warn!(requested = %requested, "Rejected database switch with invalid key");
            e
        })?;

        let mut active = self.active.write().await;
        let previous = active.key;

        *active = Selection {
            key,
            connection_string: self.strings.get(key).to_string(),
        };

        let verified = self.connector.verify(&active.connection_string).await;
        match verified {
            Ok(()) => {
                info!(from = %previous, to = %key, "Switched active database");
                Ok(key)
            }
            Err(failure) => {
                *active = Selection {
                    key: previous,
                    connection_string: self.strings.get(previous).to_string(),
                };
                warn!(
                    attempted = %key,
                    reverted_to = %previous,
                    error = %failure,
                    "Database verification failed, reverted to previous database"
                );
                Err(SelectorError::rolled_back(previous, failure))
            }
        }
    }
}
