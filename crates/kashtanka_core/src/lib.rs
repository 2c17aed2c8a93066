//! Storage layer for lost/found pet cards and their photographs.
//!
//! Cards, original photos, processed variants and feature vectors live in a
//! keyspace reached through one lazily initialized session. When no engine
//! is configured an in-process stand-in serves the same contracts.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod storage;

pub use config::{ConfigError, StorageConfig};
pub use db::{ConnectionManager, DbError, DbResult, LifecycleState};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::card::{
    Animal, CardType, ContactInfo, EventTime, FeatureVector, Location, PetCard, Sex,
};
pub use model::identifier::{Identifier, IdentifierError};
pub use model::photo::{
    AddedPhoto, OriginalPhoto, OriginalPhotoRef, PetPhoto, PhotoId, PhotoSelector,
};
pub use repo::card_repo::SqliteCardRepository;
pub use repo::memory::MemoryStorage;
pub use repo::photo_repo::SqlitePhotoRepository;
pub use repo::{CardStorage, PhotoStorage, PhotoStream, RepoError, RepoResult};
pub use service::card_service::CardService;
pub use service::photo_service::{
    ImageSource, PhotoService, PhotoWithFeatures, ProcessedOutcome, ResolvedImage,
};
pub use storage::{open_storage, Backend, Storage};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
