//! Backend selection.
//!
//! # Responsibility
//! - Wire both repositories to one shared `ConnectionManager`, or to one
//!   shared in-memory stand-in when no engine is configured.
//!
//! # Invariants
//! - Opening never touches the engine; the first repository call (or
//!   `ready`) initializes the session.

use crate::config::StorageConfig;
use crate::db::ConnectionManager;
use crate::repo::card_repo::SqliteCardRepository;
use crate::repo::memory::MemoryStorage;
use crate::repo::photo_repo::SqlitePhotoRepository;
use crate::repo::{CardStorage, PhotoStorage, RepoResult};
use crate::service::card_service::CardService;
use crate::service::photo_service::PhotoService;
use log::{info, warn};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Sqlite,
    Memory,
}

impl Display for Backend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite => write!(f, "sqlite"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Clone)]
pub struct Storage {
    cards: Arc<dyn CardStorage>,
    photos: Arc<dyn PhotoStorage>,
    manager: Option<Arc<ConnectionManager>>,
}

impl Storage {
    pub fn backend(&self) -> Backend {
        if self.manager.is_some() {
            Backend::Sqlite
        } else {
            Backend::Memory
        }
    }

    pub fn cards(&self) -> Arc<dyn CardStorage> {
        Arc::clone(&self.cards)
    }

    pub fn photos(&self) -> Arc<dyn PhotoStorage> {
        Arc::clone(&self.photos)
    }

    pub fn manager(&self) -> Option<&Arc<ConnectionManager>> {
        self.manager.as_ref()
    }

    pub fn card_service(&self) -> CardService<dyn CardStorage> {
        CardService::new(self.cards())
    }

    pub fn photo_service(&self) -> PhotoService<dyn PhotoStorage> {
        PhotoService::new(self.photos())
    }

    /// Forces session initialization. Always succeeds for the in-memory
    /// backend.
    pub async fn ready(&self) -> RepoResult<()> {
        if let Some(manager) = &self.manager {
            manager.session().await?;
        }
        Ok(())
    }
}

/// Opens the SQLite backend for `Some(config)`, the in-memory stand-in
/// otherwise.
pub fn open_storage(config: Option<StorageConfig>) -> Storage {
    match config {
        Some(config) => {
            info!(
                "event=storage_open module=storage status=ok backend=sqlite keyspace={} contact_points={}",
                config.keyspace,
                config.contact_points.join(",")
            );
            let manager = Arc::new(ConnectionManager::new(config));
            Storage {
                cards: Arc::new(SqliteCardRepository::new(Arc::clone(&manager))),
                photos: Arc::new(SqlitePhotoRepository::new(Arc::clone(&manager))),
                manager: Some(manager),
            }
        }
        None => {
            warn!("event=storage_open module=storage status=ok backend=memory");
            let memory = Arc::new(MemoryStorage::new());
            Storage {
                cards: Arc::clone(&memory) as Arc<dyn CardStorage>,
                photos: memory,
                manager: None,
            }
        }
    }
}
