//! Shared engine session.
//!
//! # Responsibility
//! - Own the single initialized connection and its statement catalogue.
//! - Run engine calls on the blocking pool so async callers never block.
//!
//! # Invariants
//! - A `Session` is only constructed after schema deployment and statement
//!   preparation succeeded.
//! - The connection lock is held for exactly one engine call.

use super::{DbError, Endpoint, Statements};
use crate::model::identifier::Identifier;
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
pub struct Session {
    conn: Arc<Mutex<Connection>>,
    statements: Arc<Statements>,
    keyspace: Identifier,
    endpoint: Endpoint,
    page_size: u32,
}

impl Session {
    pub(crate) fn new(
        conn: Connection,
        statements: Statements,
        keyspace: Identifier,
        endpoint: Endpoint,
        page_size: u32,
    ) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            statements: Arc::new(statements),
            keyspace,
            endpoint,
            page_size,
        }
    }

    pub fn keyspace(&self) -> &Identifier {
        &self.keyspace
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Rows per round-trip for paged listings.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Runs `op` against the connection on the blocking pool.
    ///
    /// # Errors
    /// - Whatever `op` returns.
    /// - `DbError::SessionPoisoned` / `DbError::Task` when the worker fails.
    pub async fn call<T, E, F>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce(&Connection, &Statements) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<DbError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let statements = Arc::clone(&self.statements);

        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| E::from(DbError::SessionPoisoned))?;
            op(&*guard, statements.as_ref())
        })
        .await
        .map_err(|err| E::from(DbError::Task(err.to_string())))?
    }
}
