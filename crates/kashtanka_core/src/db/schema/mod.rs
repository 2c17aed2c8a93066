//! Keyspace schema deployment.
//!
//! # Responsibility
//! - Attach the keyspace to a session, creating it on first use.
//! - Run the ordered table scripts on every connection.
//!
//! # Invariants
//! - Scripts are idempotent (`IF NOT EXISTS`) and run in declaration order,
//!   since later scripts may reference earlier ones.
//! - The deployed version is mirrored to the keyspace's `PRAGMA user_version`.
//! - A keyspace written by a newer schema is rejected, never downgraded.

use crate::db::{DbError, DbResult, Endpoint};
use crate::model::identifier::Identifier;
use log::info;
use rusqlite::{Connection, DatabaseName};

const KEYSPACE_PLACEHOLDER: &str = "{keyspace}";

#[derive(Debug, Clone, Copy)]
struct DeploymentScript {
    name: &'static str,
    sql: &'static str,
}

const DEPLOYMENT_SCRIPTS: &[DeploymentScript] = &[
    DeploymentScript {
        name: "0001_cards_by_id",
        sql: include_str!("0001_cards_by_id.sql"),
    },
    DeploymentScript {
        name: "0002_images_by_card_id",
        sql: include_str!("0002_images_by_card_id.sql"),
    },
    DeploymentScript {
        name: "0003_processed_images_by_uuid",
        sql: include_str!("0003_processed_images_by_uuid.sql"),
    },
    DeploymentScript {
        name: "0004_image_features_by_uuid",
        sql: include_str!("0004_image_features_by_uuid.sql"),
    },
];

/// Schema version written by this binary.
pub const SCHEMA_VERSION: u32 = 1;

/// Names of the table scripts in execution order.
pub fn deployment_script_names() -> Vec<&'static str> {
    DEPLOYMENT_SCRIPTS.iter().map(|script| script.name).collect()
}

/// Attaches `keyspace` from `endpoint` and deploys every table script.
pub(crate) fn deploy_schema(
    conn: &Connection,
    endpoint: &Endpoint,
    keyspace: &Identifier,
) -> DbResult<()> {
    info!("event=schema_deploy module=db status=start keyspace={keyspace}");
    create_keyspace(conn, endpoint, keyspace)?;

    for script in DEPLOYMENT_SCRIPTS {
        conn.execute_batch(&render(script.sql, keyspace))?;
        info!(
            "event=schema_deploy module=db status=ok keyspace={keyspace} script={}",
            script.name
        );
    }

    record_schema_version(conn, keyspace)
}

fn create_keyspace(conn: &Connection, endpoint: &Endpoint, keyspace: &Identifier) -> DbResult<()> {
    let location = endpoint.keyspace_location(keyspace);
    conn.execute(
        &format!("ATTACH DATABASE ?1 AS \"{keyspace}\";"),
        [location.as_str()],
    )?;

    if !endpoint.is_memory() {
        let journal_mode: String = conn.pragma_update_and_check(
            Some(DatabaseName::Attached(keyspace.as_str())),
            "journal_mode",
            "WAL",
            |row| row.get(0),
        )?;
        info!(
            "event=keyspace_create module=db status=ok keyspace={keyspace} location={location} journal_mode={journal_mode}"
        );
    } else {
        info!("event=keyspace_create module=db status=ok keyspace={keyspace} location={location}");
    }

    Ok(())
}

fn record_schema_version(conn: &Connection, keyspace: &Identifier) -> DbResult<()> {
    let schema = DatabaseName::Attached(keyspace.as_str());
    let current: u32 = conn.pragma_query_value(Some(schema), "user_version", |row| row.get(0))?;

    if current > SCHEMA_VERSION {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current,
            latest_supported: SCHEMA_VERSION,
        });
    }
    if current < SCHEMA_VERSION {
        conn.pragma_update(Some(schema), "user_version", SCHEMA_VERSION)?;
    }
    Ok(())
}

/// Substitutes the keyspace name into a schema or statement template.
pub(crate) fn render(template: &str, keyspace: &Identifier) -> String {
    template.replace(KEYSPACE_PLACEHOLDER, keyspace.as_str())
}

#[cfg(test)]
mod tests {
    use super::{deploy_schema, deployment_script_names, render, SCHEMA_VERSION};
    use crate::db::{DbError, Endpoint};
    use crate::model::identifier::Identifier;
    use rusqlite::Connection;

    fn keyspace() -> Identifier {
        Identifier::new("kashtanka").unwrap()
    }

    fn table_exists(conn: &Connection, table: &str) -> bool {
        conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM kashtanka.sqlite_master WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get::<_, i64>(0),
        )
        .unwrap()
            == 1
    }

    #[test]
    fn scripts_run_in_declared_order() {
        assert_eq!(
            deployment_script_names(),
            vec![
                "0001_cards_by_id",
                "0002_images_by_card_id",
                "0003_processed_images_by_uuid",
                "0004_image_features_by_uuid",
            ]
        );
    }

    #[test]
    fn render_qualifies_with_keyspace() {
        assert_eq!(
            render("SELECT * FROM \"{keyspace}\".cards_by_id", &keyspace()),
            "SELECT * FROM \"kashtanka\".cards_by_id"
        );
    }

    #[test]
    fn deploys_all_tables_into_memory_keyspace() {
        let conn = Connection::open_in_memory().unwrap();
        deploy_schema(&conn, &Endpoint::Memory, &keyspace()).unwrap();

        for table in [
            "cards_by_id",
            "images_by_card_id",
            "processed_images_by_uuid",
            "image_features_by_uuid",
        ] {
            assert!(table_exists(&conn, table), "table {table} does not exist");
        }
    }

    #[test]
    fn redeploying_on_same_node_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let endpoint = Endpoint::Directory(dir.path().to_path_buf());

        let first = Connection::open_in_memory().unwrap();
        deploy_schema(&first, &endpoint, &keyspace()).unwrap();
        first
            .execute(
                "INSERT INTO kashtanka.cards_by_id (namespace, local_id) VALUES ('ns', 'id');",
                [],
            )
            .unwrap();
        drop(first);

        let second = Connection::open_in_memory().unwrap();
        deploy_schema(&second, &endpoint, &keyspace()).unwrap();
        let count: i64 = second
            .query_row("SELECT COUNT(*) FROM kashtanka.cards_by_id;", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn newer_keyspace_schema_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kashtanka.sqlite3");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("PRAGMA user_version = 999;").unwrap();
        drop(conn);

        let session = Connection::open_in_memory().unwrap();
        let err = deploy_schema(
            &session,
            &Endpoint::Directory(dir.path().to_path_buf()),
            &keyspace(),
        )
        .unwrap_err();
        match err {
            DbError::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => {
                assert_eq!(db_version, 999);
                assert_eq!(latest_supported, SCHEMA_VERSION);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
