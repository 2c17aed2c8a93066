//! Contact point resolution and engine connection bootstrap.
//!
//! # Responsibility
//! - Turn configured contact point strings into data node endpoints.
//! - Open a session connection and negotiate the engine version.
//!
//! # Invariants
//! - A returned connection runs an engine satisfying `REQUIRED_ENGINE_VERSION`.
//! - Incompatible connections are dropped before returning.

use super::{DbError, DbResult};
use crate::model::identifier::Identifier;
use log::{error, info, warn};
use rusqlite::Connection;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Oldest engine providing JSON functions and `ON CONFLICT` upserts.
pub const REQUIRED_ENGINE_VERSION: (u32, u32, u32) = (3, 38, 0);

/// Contact point naming an ephemeral, process-local node.
pub const MEMORY_CONTACT_POINT: &str = ":memory:";

const KEYSPACE_FILE_EXTENSION: &str = "sqlite3";

/// A resolved data node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Directory holding one database file per keyspace.
    Directory(PathBuf),
    /// Ephemeral node; keyspaces live only as long as the session.
    Memory,
}

impl Endpoint {
    /// Database location backing `keyspace` on this node.
    pub fn keyspace_location(&self, keyspace: &Identifier) -> String {
        match self {
            Self::Directory(dir) => dir
                .join(format!("{keyspace}.{KEYSPACE_FILE_EXTENSION}"))
                .to_string_lossy()
                .into_owned(),
            Self::Memory => MEMORY_CONTACT_POINT.to_string(),
        }
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Directory(dir) => write!(f, "{}", dir.display()),
            Self::Memory => f.write_str(MEMORY_CONTACT_POINT),
        }
    }
}

/// Resolves every contact point; a point that cannot be resolved is used
/// verbatim.
pub fn resolve_contact_points(contact_points: &[String]) -> Vec<Endpoint> {
    contact_points
        .iter()
        .map(|raw| resolve_contact_point(raw))
        .collect()
}

fn resolve_contact_point(raw: &str) -> Endpoint {
    if raw == MEMORY_CONTACT_POINT {
        return Endpoint::Memory;
    }

    info!("event=contact_point_resolve module=db status=start contact_point={raw}");
    match std::fs::canonicalize(raw) {
        Ok(path) => {
            info!(
                "event=contact_point_resolve module=db status=ok contact_point={raw} endpoint={}",
                path.display()
            );
            Endpoint::Directory(path)
        }
        Err(err) => {
            error!(
                "event=contact_point_resolve module=db status=fallback contact_point={raw} error={err}"
            );
            Endpoint::Directory(PathBuf::from(raw))
        }
    }
}

/// Tries every endpoint in order and returns the first compatible session.
///
/// # Errors
/// - `NoHostAvailable` listing each endpoint's failure when none succeeds.
pub(crate) fn connect_round(
    endpoints: &[Endpoint],
    busy_timeout: Duration,
) -> DbResult<(Connection, Endpoint)> {
    let mut errors = Vec::with_capacity(endpoints.len());
    for endpoint in endpoints {
        match connect_endpoint(endpoint, busy_timeout) {
            Ok(conn) => return Ok((conn, endpoint.clone())),
            Err(err) => {
                warn!("event=db_connect module=db status=error endpoint={endpoint} error={err}");
                errors.push((endpoint.to_string(), err.to_string()));
            }
        }
    }

    let err = DbError::NoHostAvailable { errors };
    error!("event=db_connect module=db status=error error_code=no_host_available error={err}");
    Err(err)
}

fn connect_endpoint(endpoint: &Endpoint, busy_timeout: Duration) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_connect module=db status=start endpoint={endpoint}");

    if let Endpoint::Directory(dir) = endpoint {
        if !dir.is_dir() {
            return Err(DbError::Unreachable {
                endpoint: endpoint.to_string(),
                reason: "not an existing directory".to_string(),
            });
        }
    }

    let conn = Connection::open_in_memory()?;
    conn.busy_timeout(busy_timeout)?;

    let found = negotiate_engine_version(&conn)?;
    if !satisfies_required(&found) {
        error!(
            "event=db_negotiate module=db status=error endpoint={endpoint} found={found} required={} action=disconnect",
            format_version(REQUIRED_ENGINE_VERSION)
        );
        return Err(DbError::IncompatibleEngine {
            endpoint: endpoint.to_string(),
            found,
            required: format_version(REQUIRED_ENGINE_VERSION),
        });
    }

    info!(
        "event=db_connect module=db status=ok endpoint={endpoint} engine_version={found} duration_ms={}",
        started_at.elapsed().as_millis()
    );
    Ok(conn)
}

fn negotiate_engine_version(conn: &Connection) -> DbResult<String> {
    let version = conn.query_row("SELECT sqlite_version();", [], |row| row.get(0))?;
    Ok(version)
}

fn parse_version(value: &str) -> Option<(u32, u32, u32)> {
    let mut parts = value.trim().split('.').map(|part| part.parse::<u32>());
    let major = parts.next()?.ok()?;
    let minor = parts.next()?.ok()?;
    let patch = match parts.next() {
        Some(part) => part.ok()?,
        None => 0,
    };
    Some((major, minor, patch))
}

fn satisfies_required(found: &str) -> bool {
    parse_version(found).is_some_and(|version| version >= REQUIRED_ENGINE_VERSION)
}

fn format_version((major, minor, patch): (u32, u32, u32)) -> String {
    format!("{major}.{minor}.{patch}")
}

#[cfg(test)]
mod tests {
    use super::{
        connect_round, parse_version, resolve_contact_points, satisfies_required, Endpoint,
    };
    use crate::db::DbError;
    use crate::model::identifier::Identifier;
    use std::time::Duration;

    #[test]
    fn parses_engine_versions() {
        assert_eq!(parse_version("3.46.0"), Some((3, 46, 0)));
        assert_eq!(parse_version("3.38"), Some((3, 38, 0)));
        assert_eq!(parse_version("three"), None);
        assert!(satisfies_required("3.38.0"));
        assert!(satisfies_required("3.45.1"));
        assert!(!satisfies_required("3.37.2"));
        assert!(!satisfies_required("garbage"));
    }

    #[test]
    fn unresolvable_contact_points_are_used_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().to_string_lossy().into_owned();
        let missing = dir.path().join("missing").to_string_lossy().into_owned();

        let endpoints =
            resolve_contact_points(&[existing, missing.clone(), ":memory:".to_string()]);
        assert_eq!(
            endpoints[0],
            Endpoint::Directory(dir.path().canonicalize().unwrap())
        );
        assert_eq!(endpoints[1], Endpoint::Directory(missing.into()));
        assert_eq!(endpoints[2], Endpoint::Memory);
    }

    #[test]
    fn keyspace_lives_in_node_directory() {
        let keyspace = Identifier::new("kashtanka").unwrap();
        let location = Endpoint::Directory("/srv/node1".into()).keyspace_location(&keyspace);
        assert!(location.ends_with("kashtanka.sqlite3"));
        assert_eq!(Endpoint::Memory.keyspace_location(&keyspace), ":memory:");
    }

    #[test]
    fn connect_round_skips_unreachable_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let endpoints = vec![
            Endpoint::Directory(dir.path().join("absent")),
            Endpoint::Directory(dir.path().to_path_buf()),
        ];
        let (_conn, endpoint) = connect_round(&endpoints, Duration::from_millis(100)).unwrap();
        assert_eq!(endpoint, endpoints[1]);
    }

    #[test]
    fn connect_round_reports_every_failure() {
        let dir = tempfile::tempdir().unwrap();
        let endpoints = vec![
            Endpoint::Directory(dir.path().join("a")),
            Endpoint::Directory(dir.path().join("b")),
        ];
        match connect_round(&endpoints, Duration::from_millis(100)) {
            Err(DbError::NoHostAvailable { errors }) => assert_eq!(errors.len(), 2),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("connect should fail"),
        }
    }
}
