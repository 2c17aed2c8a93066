//! Single-flight session lifecycle.
//!
//! # Responsibility
//! - Run connect, schema deployment and statement preparation once.
//! - Serve the ready session to every repository call afterwards.
//!
//! # Invariants
//! - Concurrent first callers serialize on the gate; only one initializes.
//! - The ready fast path never takes the gate.
//! - A failed or abandoned initialization returns to `Uninitialized`, so the
//!   next call starts over from scratch.
//!
//! # See also
//! - `crate::config::StorageConfig` for connect attempts, backoff and page size.

use super::connect::{connect_round, resolve_contact_points, Endpoint};
use super::schema::deploy_schema;
use super::{DbError, DbResult, Session, Statements};
use crate::config::StorageConfig;
use log::{error, info};
use rusqlite::Connection;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

/// Observable lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Ready,
}

enum Lifecycle {
    Uninitialized,
    Initializing,
    Ready(Arc<Session>),
}

/// Owner of the one shared storage session.
pub struct ConnectionManager {
    config: StorageConfig,
    lifecycle: RwLock<Lifecycle>,
    gate: tokio::sync::Mutex<()>,
    generation: AtomicU64,
}

impl ConnectionManager {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            lifecycle: RwLock::new(Lifecycle::Uninitialized),
            gate: tokio::sync::Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        match *self.lifecycle.read().unwrap_or_else(PoisonError::into_inner) {
            Lifecycle::Uninitialized => LifecycleState::Uninitialized,
            Lifecycle::Initializing => LifecycleState::Initializing,
            Lifecycle::Ready(_) => LifecycleState::Ready,
        }
    }

    /// Number of initializations that completed successfully.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Returns the ready session, initializing it on first use.
    ///
    /// # Errors
    /// - Connectivity, negotiation, deployment or preparation failures of
    ///   this attempt. Nothing is cached; a later call retries.
    pub async fn session(&self) -> DbResult<Arc<Session>> {
        if let Some(session) = self.ready_session() {
            return Ok(session);
        }

        let _gate = self.gate.lock().await;
        if let Some(session) = self.ready_session() {
            return Ok(session);
        }

        let started_at = Instant::now();
        info!(
            "event=storage_init module=db status=start keyspace={}",
            self.config.keyspace
        );
        let reset = ResetOnDrop::arm(&self.lifecycle);

        match self.initialize().await {
            Ok(session) => {
                let session = Arc::new(session);
                reset.disarm(Lifecycle::Ready(Arc::clone(&session)));
                let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
                info!(
                    "event=storage_init module=db status=ok keyspace={} endpoint={} generation={generation} duration_ms={}",
                    self.config.keyspace,
                    session.endpoint(),
                    started_at.elapsed().as_millis()
                );
                Ok(session)
            }
            Err(err) => {
                error!(
                    "event=storage_init module=db status=error keyspace={} duration_ms={} error={err}",
                    self.config.keyspace,
                    started_at.elapsed().as_millis()
                );
                Err(err)
            }
        }
    }

    fn ready_session(&self) -> Option<Arc<Session>> {
        match &*self.lifecycle.read().unwrap_or_else(PoisonError::into_inner) {
            Lifecycle::Ready(session) => Some(Arc::clone(session)),
            Lifecycle::Uninitialized | Lifecycle::Initializing => None,
        }
    }

    async fn initialize(&self) -> DbResult<Session> {
        let endpoints = resolve_contact_points(&self.config.contact_points);
        let (conn, endpoint) = self.connect(endpoints).await?;

        let keyspace = self.config.keyspace.clone();
        let page_size = self.config.page_size;
        tokio::task::spawn_blocking(move || -> DbResult<Session> {
            deploy_schema(&conn, &endpoint, &keyspace)?;

            let statements = Statements::for_keyspace(&keyspace);
            info!("event=keyspace_use module=db status=ok keyspace={keyspace}");
            statements.prepare_all(&conn)?;

            Ok(Session::new(conn, statements, keyspace, endpoint, page_size))
        })
        .await
        .map_err(|err| DbError::Task(err.to_string()))?
    }

    async fn connect(&self, endpoints: Vec<Endpoint>) -> DbResult<(Connection, Endpoint)> {
        let endpoints = Arc::new(endpoints);
        let max_attempts = self.config.connect_attempts.max(1);
        let mut attempt = 1;

        loop {
            let round_endpoints = Arc::clone(&endpoints);
            let busy_timeout = self.config.busy_timeout;
            let round =
                tokio::task::spawn_blocking(move || connect_round(&round_endpoints, busy_timeout))
                    .await
                    .map_err(|err| DbError::Task(err.to_string()))?;

            match round {
                Ok(connected) => return Ok(connected),
                Err(err) if attempt < max_attempts => {
                    error!(
                        "event=db_connect module=db status=retry attempt={attempt} max_attempts={max_attempts} backoff_ms={} error={err}",
                        self.config.retry_backoff.as_millis()
                    );
                    tokio::time::sleep(self.config.retry_backoff).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Marks the lifecycle `Initializing` and puts it back to `Uninitialized`
/// unless a final state is installed, including when the initializing
/// future is dropped mid-way.
struct ResetOnDrop<'a> {
    lifecycle: &'a RwLock<Lifecycle>,
    armed: bool,
}

impl<'a> ResetOnDrop<'a> {
    fn arm(lifecycle: &'a RwLock<Lifecycle>) -> Self {
        *lifecycle.write().unwrap_or_else(PoisonError::into_inner) = Lifecycle::Initializing;
        Self {
            lifecycle,
            armed: true,
        }
    }

    fn disarm(mut self, state: Lifecycle) {
        *self.lifecycle.write().unwrap_or_else(PoisonError::into_inner) = state;
        self.armed = false;
    }
}

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed {
            *self.lifecycle.write().unwrap_or_else(PoisonError::into_inner) =
                Lifecycle::Uninitialized;
        }
    }
}
