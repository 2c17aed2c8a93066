//! Photo use-case service.
//!
//! # Responsibility
//! - Address processed variants and photo features by the card-side key
//!   `(namespace, local_id, image_num)` instead of by UUID.
//! - Pick the best available rendition of a photo.
//!
//! # Invariants
//! - Derived data is only written for an original that exists.
//! - Service layer remains storage-agnostic.

use crate::model::card::FeatureVector;
use crate::model::identifier::Identifier;
use crate::model::photo::{OriginalPhotoRef, PetPhoto, PhotoId};
use crate::repo::{PhotoStorage, RepoResult};
use futures::TryStreamExt;
use log::{debug, info};
use std::collections::BTreeMap;
use std::sync::Arc;

/// MIME type reported when the stored photo carries none.
pub const DEFAULT_MIME_TYPE: &str = "image";

/// Which rendition `resolve_image` picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Original,
    Processed(Identifier),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub uuid: PhotoId,
    pub source: ImageSource,
    pub image: Option<Vec<u8>>,
    pub mime_type: String,
}

/// Outcome of storing a processed variant for an original.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessedOutcome {
    OriginalMissing,
    Created(PhotoId),
    Exists(PhotoId),
}

/// Original photo descriptor with the requested feature vectors that exist.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoWithFeatures {
    pub reference: OriginalPhotoRef,
    pub features: BTreeMap<Identifier, FeatureVector>,
}

pub struct PhotoService<S: PhotoStorage + ?Sized> {
    photos: Arc<S>,
}

impl<S: PhotoStorage + ?Sized> PhotoService<S> {
    pub fn new(photos: Arc<S>) -> Self {
        Self { photos }
    }

    /// Returns the first processed variant found in `preferred_processings`
    /// order, falling back to the original. `None` when the original is
    /// missing.
    pub async fn resolve_image(
        &self,
        ns: &Identifier,
        local_id: &Identifier,
        image_num: i32,
        preferred_processings: &[Identifier],
    ) -> RepoResult<Option<ResolvedImage>> {
        let Some(original) = self
            .photos
            .get_original_photo(ns, local_id, image_num)
            .await?
        else {
            return Ok(None);
        };
        let uuid = original.reference.uuid;

        for tag in preferred_processings {
            if let Some(processed) = self.photos.get_processed_photo(uuid, tag).await? {
                debug!(
                    "event=image_resolve module=service status=ok uuid={uuid} source=processed tag={tag}"
                );
                return Ok(Some(resolved(uuid, ImageSource::Processed(tag.clone()), processed)));
            }
        }

        debug!("event=image_resolve module=service status=ok uuid={uuid} source=original");
        Ok(Some(resolved(uuid, ImageSource::Original, original.photo)))
    }

    pub async fn add_processed_for_original(
        &self,
        ns: &Identifier,
        local_id: &Identifier,
        image_num: i32,
        processing_ident: &Identifier,
        photo: &PetPhoto,
    ) -> RepoResult<ProcessedOutcome> {
        let Some(original) = self
            .photos
            .get_original_photo(ns, local_id, image_num)
            .await?
        else {
            info!(
                "event=processed_photo_add module=service status=original_missing ns={ns} local_id={local_id} image_num={image_num}"
            );
            return Ok(ProcessedOutcome::OriginalMissing);
        };

        let uuid = original.reference.uuid;
        if self
            .photos
            .add_processed_photo(uuid, processing_ident, photo)
            .await?
        {
            Ok(ProcessedOutcome::Created(uuid))
        } else {
            Ok(ProcessedOutcome::Exists(uuid))
        }
    }

    /// Stores a feature vector for the original's UUID. `None` when the
    /// original is missing.
    pub async fn set_features_for_original(
        &self,
        ns: &Identifier,
        local_id: &Identifier,
        image_num: i32,
        features_ident: &Identifier,
        features: &[f64],
    ) -> RepoResult<Option<PhotoId>> {
        let Some(original) = self
            .photos
            .get_original_photo(ns, local_id, image_num)
            .await?
        else {
            return Ok(None);
        };

        let uuid = original.reference.uuid;
        self.photos
            .set_photo_features(uuid, features_ident, features)
            .await?;
        Ok(Some(uuid))
    }

    pub async fn list_with_features(
        &self,
        ns: &Identifier,
        local_id: &Identifier,
        features_idents: &[Identifier],
    ) -> RepoResult<Vec<PhotoWithFeatures>> {
        let references: Vec<OriginalPhotoRef> = self
            .photos
            .list_original_photos(ns, local_id)
            .try_collect()
            .await?;

        let mut listed = Vec::with_capacity(references.len());
        for reference in references {
            let mut features = BTreeMap::new();
            for tag in features_idents {
                if let Some(vector) = self.photos.get_photo_features(reference.uuid, tag).await? {
                    features.insert(tag.clone(), vector);
                }
            }
            listed.push(PhotoWithFeatures {
                reference,
                features,
            });
        }
        Ok(listed)
    }
}

fn resolved(uuid: PhotoId, source: ImageSource, photo: PetPhoto) -> ResolvedImage {
    ResolvedImage {
        uuid,
        source,
        image: photo.image,
        mime_type: photo
            .mime_type
            .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
    }
}
