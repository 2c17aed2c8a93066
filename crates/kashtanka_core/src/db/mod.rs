//! Storage engine session, schema deployment and lifecycle management.
//!
//! # Responsibility
//! - Connect to a data node and negotiate a compatible engine version.
//! - Deploy the keyspace schema idempotently on every connection.
//! - Hand out one shared, prepared session to every repository.
//!
//! # Invariants
//! - Repositories never touch the engine before initialization succeeds.
//! - Initialization runs once; a failed attempt leaves no cached state.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod connect;
mod manager;
pub mod schema;
mod session;
mod statements;

pub use connect::{
    resolve_contact_points, Endpoint, MEMORY_CONTACT_POINT, REQUIRED_ENGINE_VERSION,
};
pub use manager::{ConnectionManager, LifecycleState};
pub use session::Session;
pub use statements::Statements;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// The node runs an engine older than the required version.
    IncompatibleEngine {
        endpoint: String,
        found: String,
        required: String,
    },
    /// The contact point does not name a reachable data node.
    Unreachable {
        endpoint: String,
        reason: String,
    },
    /// Every contact point failed; one `(endpoint, error)` pair each.
    NoHostAvailable {
        errors: Vec<(String, String)>,
    },
    /// A previous holder of the session lock panicked.
    SessionPoisoned,
    /// The blocking worker running an engine call failed.
    Task(String),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "keyspace schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::IncompatibleEngine {
                endpoint,
                found,
                required,
            } => write!(
                f,
                "engine at `{endpoint}` runs version {found}, at least {required} is required"
            ),
            Self::Unreachable { endpoint, reason } => {
                write!(f, "data node `{endpoint}` is unreachable: {reason}")
            }
            Self::NoHostAvailable { errors } => {
                write!(f, "no host available")?;
                for (endpoint, error) in errors {
                    write!(f, "; {endpoint}: {error}")?;
                }
                Ok(())
            }
            Self::SessionPoisoned => write!(f, "storage session lock is poisoned"),
            Self::Task(message) => write!(f, "storage worker failed: {message}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
