use kashtanka_core::db::MEMORY_CONTACT_POINT;
use kashtanka_core::{ConnectionManager, DbError, Identifier, LifecycleState, StorageConfig};
use std::sync::Arc;
use std::time::Duration;

fn config(contact_points: &[&str]) -> StorageConfig {
    let mut config = StorageConfig::new(
        contact_points.iter().map(|point| point.to_string()).collect(),
        Identifier::new("kashtanka").unwrap(),
    );
    config.retry_backoff = Duration::from_millis(10);
    config
}

#[tokio::test]
async fn concurrent_first_calls_initialize_once() {
    let manager = Arc::new(ConnectionManager::new(config(&[MEMORY_CONTACT_POINT])));
    assert_eq!(manager.state(), LifecycleState::Uninitialized);

    let mut handles = Vec::new();
    for _ in 0..16 {
        let manager = Arc::clone(&manager);
        handles.push(tokio::spawn(async move { manager.session().await }));
    }

    let mut sessions = Vec::new();
    for handle in handles {
        sessions.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(manager.generation(), 1);
    assert_eq!(manager.state(), LifecycleState::Ready);
    assert!(sessions
        .windows(2)
        .all(|pair| Arc::ptr_eq(&pair[0], &pair[1])));
    assert_eq!(sessions[0].keyspace().as_str(), "kashtanka");
}

#[tokio::test]
async fn failed_initialization_is_not_cached() {
    let root = tempfile::tempdir().unwrap();
    let node = root.path().join("node1");
    let node_str = node.to_str().unwrap();

    let mut config = config(&[node_str]);
    config.connect_attempts = 1;
    let manager = ConnectionManager::new(config);

    let err = manager.session().await.unwrap_err();
    match err {
        DbError::NoHostAvailable { errors } => {
            assert_eq!(errors.len(), 1);
            assert!(errors[0].0.contains("node1"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(manager.state(), LifecycleState::Uninitialized);
    assert_eq!(manager.generation(), 0);

    std::fs::create_dir(&node).unwrap();
    manager.session().await.unwrap();
    assert_eq!(manager.state(), LifecycleState::Ready);
    assert_eq!(manager.generation(), 1);
    assert!(node.join("kashtanka.sqlite3").exists());
}

#[tokio::test]
async fn connect_rounds_retry_until_a_node_appears() {
    let root = tempfile::tempdir().unwrap();
    let node = root.path().join("late-node");

    let mut config = config(&[node.to_str().unwrap()]);
    config.connect_attempts = 50;
    let manager = ConnectionManager::new(config);

    let creator = {
        let node = node.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            std::fs::create_dir(&node).unwrap();
        })
    };

    manager.session().await.unwrap();
    creator.await.unwrap();
    assert_eq!(manager.generation(), 1);
}

#[tokio::test]
async fn unreachable_points_are_skipped() {
    let root = tempfile::tempdir().unwrap();
    let missing = root.path().join("missing");
    let manager = ConnectionManager::new(config(&[
        missing.to_str().unwrap(),
        root.path().to_str().unwrap(),
    ]));

    let session = manager.session().await.unwrap();
    assert_eq!(
        session.endpoint().to_string(),
        std::fs::canonicalize(root.path()).unwrap().display().to_string()
    );
}

#[tokio::test]
async fn schema_deployment_is_idempotent_across_restarts() {
    let node = tempfile::tempdir().unwrap();
    let node_str = node.path().to_str().unwrap();

    for _ in 0..2 {
        let manager = ConnectionManager::new(config(&[node_str]));
        manager.session().await.unwrap();
        manager.session().await.unwrap();
        assert_eq!(manager.generation(), 1);
    }
}

#[tokio::test]
async fn newer_keyspace_schema_is_rejected() {
    let node = tempfile::tempdir().unwrap();
    {
        let conn = rusqlite::Connection::open(node.path().join("kashtanka.sqlite3")).unwrap();
        conn.pragma_update(None, "user_version", 99).unwrap();
    }

    let manager = ConnectionManager::new(config(&[node.path().to_str().unwrap()]));
    let err = manager.session().await.unwrap_err();
    assert!(matches!(
        err,
        DbError::UnsupportedSchemaVersion {
            db_version: 99,
            ..
        }
    ));
    assert_eq!(manager.state(), LifecycleState::Uninitialized);
}
