//! Repository contracts and their implementations.
//!
//! # Responsibility
//! - Define the card and photo storage contracts consumed by callers.
//! - Isolate engine details (SQL, encodings) behind those contracts.
//!
//! # Invariants
//! - Every key argument is a validated `Identifier` or a `PhotoId`.
//! - Not-found is `None`, conflict is `false`; neither is an error.
//! - Creates are conditional and never overwrite an existing row.
//!
//! # See also
//! - `crate::db::ConnectionManager` for the session every call awaits.

use crate::db::DbError;
use crate::model::card::{FeatureVector, PetCard};
use crate::model::identifier::Identifier;
use crate::model::photo::{
    AddedPhoto, OriginalPhoto, OriginalPhotoRef, PetPhoto, PhotoId, PhotoSelector,
};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod card_repo;
pub mod codec;
pub mod memory;
pub mod photo_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Lazy, finite, forward-only listing of a card's original photos.
pub type PhotoStream = BoxStream<'static, RepoResult<OriginalPhotoRef>>;

#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// A persisted row could not be decoded.
    InvalidData(String),
    /// The caller passed a value the engine cannot represent.
    InvalidInput(String),
    /// A conditional insert lost to an existing row that cannot be read back.
    Consistency {
        namespace: Identifier,
        local_id: Identifier,
        image_num: i32,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::Consistency {
                namespace,
                local_id,
                image_num,
            } => write!(
                f,
                "photo {namespace}/{local_id}/{image_num} already exists but cannot be read back"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidData(_) | Self::InvalidInput(_) | Self::Consistency { .. } => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Pet card persistence.
#[async_trait]
pub trait CardStorage: Send + Sync {
    /// Returns the card or `None` when no row matches.
    async fn get_card(&self, ns: &Identifier, local_id: &Identifier)
        -> RepoResult<Option<PetCard>>;

    /// Creates the card; `false` when a card already holds the key.
    async fn create_card(
        &self,
        ns: &Identifier,
        local_id: &Identifier,
        card: &PetCard,
    ) -> RepoResult<bool>;

    /// Removes the card. Photos are left alone.
    async fn delete_card(&self, ns: &Identifier, local_id: &Identifier) -> RepoResult<bool>;

    /// Adds or replaces one tagged vector, keeping sibling tags. `false`
    /// when the card does not exist.
    async fn set_card_features(
        &self,
        ns: &Identifier,
        local_id: &Identifier,
        features_ident: &Identifier,
        features: &[f64],
    ) -> RepoResult<bool>;
}

/// Original/processed photo and photo feature persistence.
#[async_trait]
pub trait PhotoStorage: Send + Sync {
    /// Streams `{uuid, image_num}` descriptors without image bytes.
    fn list_original_photos(&self, ns: &Identifier, local_id: &Identifier) -> PhotoStream;

    async fn get_original_photo(
        &self,
        ns: &Identifier,
        local_id: &Identifier,
        image_num: i32,
    ) -> RepoResult<Option<OriginalPhoto>>;

    async fn get_processed_photo(
        &self,
        uuid: PhotoId,
        processing_ident: &Identifier,
    ) -> RepoResult<Option<PetPhoto>>;

    async fn get_photo_features(
        &self,
        uuid: PhotoId,
        features_ident: &Identifier,
    ) -> RepoResult<Option<FeatureVector>>;

    /// Deletes one original, or every original of the card.
    async fn delete_original_photo(
        &self,
        ns: &Identifier,
        local_id: &Identifier,
        selector: PhotoSelector,
    ) -> RepoResult<bool>;

    async fn delete_processed_photo(
        &self,
        uuid: PhotoId,
        processing_ident: &Identifier,
    ) -> RepoResult<bool>;

    /// Stores a new original under a freshly minted UUID. When the key is
    /// taken, reports the existing photo's UUID with `created = false`.
    async fn add_original_photo(
        &self,
        ns: &Identifier,
        local_id: &Identifier,
        image_num: i32,
        photo: &PetPhoto,
    ) -> RepoResult<AddedPhoto>;

    /// Stores a processed variant; `false` when the variant already exists.
    /// The caller checks that the original exists.
    async fn add_processed_photo(
        &self,
        uuid: PhotoId,
        processing_ident: &Identifier,
        photo: &PetPhoto,
    ) -> RepoResult<bool>;

    /// Upserts a tagged vector for the photo.
    async fn set_photo_features(
        &self,
        uuid: PhotoId,
        features_ident: &Identifier,
        features: &[f64],
    ) -> RepoResult<bool>;
}
