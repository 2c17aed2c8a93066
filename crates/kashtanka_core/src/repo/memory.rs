//! In-process stand-in for both storage contracts.
//!
//! Selected when no storage endpoint is configured. Mirrors the SQLite
//! repositories' semantics: conditional creates, UUID reuse on conflict,
//! the all-photos delete selector and merge-by-tag card features.

use super::codec::ensure_finite;
use super::{CardStorage, PhotoStorage, PhotoStream, RepoError, RepoResult};
use crate::model::card::{FeatureVector, PetCard};
use crate::model::identifier::Identifier;
use crate::model::photo::{
    AddedPhoto, OriginalPhoto, OriginalPhotoRef, PetPhoto, PhotoId, PhotoSelector,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

type CardKey = (String, String);
type OriginalKey = (String, String, i32);
type TaggedKey = (PhotoId, String);

#[derive(Default)]
struct Tables {
    cards: BTreeMap<CardKey, PetCard>,
    originals: BTreeMap<OriginalKey, (PhotoId, PetPhoto)>,
    processed: HashMap<TaggedKey, PetPhoto>,
    photo_features: HashMap<TaggedKey, FeatureVector>,
}

#[derive(Default)]
pub struct MemoryStorage {
    tables: Mutex<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn card_key(ns: &Identifier, local_id: &Identifier) -> CardKey {
    (ns.as_str().to_string(), local_id.as_str().to_string())
}

fn tagged_key(uuid: PhotoId, tag: &Identifier) -> TaggedKey {
    (uuid, tag.as_str().to_string())
}

#[async_trait]
impl CardStorage for MemoryStorage {
    async fn get_card(
        &self,
        ns: &Identifier,
        local_id: &Identifier,
    ) -> RepoResult<Option<PetCard>> {
        Ok(self.tables().cards.get(&card_key(ns, local_id)).cloned())
    }

    async fn create_card(
        &self,
        ns: &Identifier,
        local_id: &Identifier,
        card: &PetCard,
    ) -> RepoResult<bool> {
        for vector in card.features.values() {
            ensure_finite(vector)?;
        }
        let mut tables = self.tables();
        let key = card_key(ns, local_id);
        if tables.cards.contains_key(&key) {
            return Ok(false);
        }
        tables.cards.insert(key, card.clone());
        Ok(true)
    }

    async fn delete_card(&self, ns: &Identifier, local_id: &Identifier) -> RepoResult<bool> {
        self.tables().cards.remove(&card_key(ns, local_id));
        Ok(true)
    }

    async fn set_card_features(
        &self,
        ns: &Identifier,
        local_id: &Identifier,
        features_ident: &Identifier,
        features: &[f64],
    ) -> RepoResult<bool> {
        ensure_finite(features)?;
        let mut tables = self.tables();
        match tables.cards.get_mut(&card_key(ns, local_id)) {
            Some(card) => {
                card.features.insert(features_ident.clone(), features.to_vec());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[async_trait]
impl PhotoStorage for MemoryStorage {
    fn list_original_photos(&self, ns: &Identifier, local_id: &Identifier) -> PhotoStream {
        let (ns, local_id) = card_key(ns, local_id);
        let refs: Vec<OriginalPhotoRef> = self
            .tables()
            .originals
            .range((ns.clone(), local_id.clone(), i32::MIN)..=(ns, local_id, i32::MAX))
            .map(|((_, _, image_num), (uuid, _))| OriginalPhotoRef {
                uuid: *uuid,
                image_num: *image_num,
            })
            .collect();
        stream::iter(refs.into_iter().map(Ok::<_, RepoError>)).boxed()
    }

    async fn get_original_photo(
        &self,
        ns: &Identifier,
        local_id: &Identifier,
        image_num: i32,
    ) -> RepoResult<Option<OriginalPhoto>> {
        let (ns, local_id) = card_key(ns, local_id);
        Ok(self
            .tables()
            .originals
            .get(&(ns, local_id, image_num))
            .map(|(uuid, photo)| OriginalPhoto {
                reference: OriginalPhotoRef {
                    uuid: *uuid,
                    image_num,
                },
                photo: photo.clone(),
            }))
    }

    async fn get_processed_photo(
        &self,
        uuid: PhotoId,
        processing_ident: &Identifier,
    ) -> RepoResult<Option<PetPhoto>> {
        Ok(self
            .tables()
            .processed
            .get(&tagged_key(uuid, processing_ident))
            .cloned())
    }

    async fn get_photo_features(
        &self,
        uuid: PhotoId,
        features_ident: &Identifier,
    ) -> RepoResult<Option<FeatureVector>> {
        Ok(self
            .tables()
            .photo_features
            .get(&tagged_key(uuid, features_ident))
            .cloned())
    }

    async fn delete_original_photo(
        &self,
        ns: &Identifier,
        local_id: &Identifier,
        selector: PhotoSelector,
    ) -> RepoResult<bool> {
        let (ns, local_id) = card_key(ns, local_id);
        let mut tables = self.tables();
        match selector {
            PhotoSelector::All => tables
                .originals
                .retain(|(row_ns, row_id, _), _| !(*row_ns == ns && *row_id == local_id)),
            PhotoSelector::Single(image_num) => {
                tables.originals.remove(&(ns, local_id, image_num));
            }
        }
        Ok(true)
    }

    async fn delete_processed_photo(
        &self,
        uuid: PhotoId,
        processing_ident: &Identifier,
    ) -> RepoResult<bool> {
        self.tables()
            .processed
            .remove(&tagged_key(uuid, processing_ident));
        Ok(true)
    }

    async fn add_original_photo(
        &self,
        ns: &Identifier,
        local_id: &Identifier,
        image_num: i32,
        photo: &PetPhoto,
    ) -> RepoResult<AddedPhoto> {
        let (ns, local_id) = card_key(ns, local_id);
        let mut tables = self.tables();
        match tables.originals.entry((ns, local_id, image_num)) {
            Entry::Occupied(existing) => Ok(AddedPhoto {
                uuid: existing.get().0,
                created: false,
            }),
            Entry::Vacant(slot) => {
                let uuid = Uuid::new_v4();
                slot.insert((uuid, photo.clone()));
                Ok(AddedPhoto {
                    uuid,
                    created: true,
                })
            }
        }
    }

    async fn add_processed_photo(
        &self,
        uuid: PhotoId,
        processing_ident: &Identifier,
        photo: &PetPhoto,
    ) -> RepoResult<bool> {
        let mut tables = self.tables();
        let key = tagged_key(uuid, processing_ident);
        if tables.processed.contains_key(&key) {
            return Ok(false);
        }
        tables.processed.insert(key, photo.clone());
        Ok(true)
    }

    async fn set_photo_features(
        &self,
        uuid: PhotoId,
        features_ident: &Identifier,
        features: &[f64],
    ) -> RepoResult<bool> {
        ensure_finite(features)?;
        self.tables()
            .photo_features
            .insert(tagged_key(uuid, features_ident), features.to_vec());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;

    fn id(raw: &str) -> Identifier {
        Identifier::new(raw).unwrap()
    }

    #[tokio::test]
    async fn listing_is_scoped_to_one_card_and_ordered() {
        let storage = MemoryStorage::new();
        let photo = PetPhoto::new(vec![1_u8], "image/png");
        for (local_id, image_num) in [("b", 2), ("a", 3), ("b", 1), ("bb", 1)] {
            storage
                .add_original_photo(&id("ns"), &id(local_id), image_num, &photo)
                .await
                .unwrap();
        }

        let listed: Vec<i32> = storage
            .list_original_photos(&id("ns"), &id("b"))
            .map_ok(|reference| reference.image_num)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(listed, vec![1, 2]);
    }
}
