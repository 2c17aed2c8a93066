//! SQLite-backed photo repository.
//!
//! # Responsibility
//! - Conditional creation of original photos and processed variants.
//! - Paged, lazy listing of a card's originals.
//! - Photo feature vectors, independent of image bytes.
//!
//! # Invariants
//! - An original's UUID is minted once, by the insert that wins the key.
//! - A losing insert reports the winner's UUID, read back from the engine.
//! - A losing insert whose winner cannot be read back is a fatal
//!   `RepoError::Consistency`; it is logged and never retried.
//!
//! # See also
//! - `crate::db::Statements` for the queries behind each operation.
//! - `crate::service::photo_service` for access by the card-side key.

use super::codec::{decode_features_blob, encode_features_blob};
use super::{PhotoStorage, PhotoStream, RepoError, RepoResult};
use crate::db::ConnectionManager;
use crate::model::card::FeatureVector;
use crate::model::identifier::Identifier;
use crate::model::photo::{
    AddedPhoto, OriginalPhoto, OriginalPhotoRef, PetPhoto, PhotoId, PhotoSelector,
};
use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use log::{debug, error, info, warn};
use rusqlite::{params, OptionalExtension, Row};
use std::sync::Arc;
use uuid::Uuid;

pub struct SqlitePhotoRepository {
    manager: Arc<ConnectionManager>,
}

impl SqlitePhotoRepository {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }
}

/// Position of the listing between pages.
enum PageCursor {
    Start,
    After(i32),
    Done,
}

#[async_trait]
impl PhotoStorage for SqlitePhotoRepository {
    fn list_original_photos(&self, ns: &Identifier, local_id: &Identifier) -> PhotoStream {
        let manager = Arc::clone(&self.manager);
        let (ns, local_id) = (ns.clone(), local_id.clone());

        let pages = stream::try_unfold(PageCursor::Start, move |cursor| {
            let manager = Arc::clone(&manager);
            let (ns, local_id) = (ns.clone(), local_id.clone());
            async move {
                let after = match cursor {
                    PageCursor::Start => i64::MIN,
                    PageCursor::After(image_num) => i64::from(image_num),
                    PageCursor::Done => return Ok(None),
                };

                let session = manager.session().await?;
                let page_size = session.page_size();
                let page = session
                    .call(move |conn, statements| -> RepoResult<Vec<OriginalPhotoRef>> {
                        let mut stmt = conn.prepare_cached(&statements.list_original_photos_page)?;
                        let mut rows = stmt.query(params![
                            ns.as_str(),
                            local_id.as_str(),
                            after,
                            i64::from(page_size)
                        ])?;
                        let mut page = Vec::new();
                        while let Some(row) = rows.next()? {
                            page.push(parse_original_ref(row)?);
                        }
                        debug!(
                            "event=photo_list_page module=repo status=ok ns={ns} local_id={local_id} rows={}",
                            page.len()
                        );
                        Ok(page)
                    })
                    .await?;

                let next = match page.last() {
                    Some(last) if page.len() >= page_size as usize => {
                        PageCursor::After(last.image_num)
                    }
                    _ => PageCursor::Done,
                };
                Ok::<_, RepoError>(Some((page, next)))
            }
        });

        pages
            .map_ok(|page| stream::iter(page.into_iter().map(Ok::<_, RepoError>)))
            .try_flatten()
            .boxed()
    }

    async fn get_original_photo(
        &self,
        ns: &Identifier,
        local_id: &Identifier,
        image_num: i32,
    ) -> RepoResult<Option<OriginalPhoto>> {
        let session = self.manager.session().await?;
        let (ns, local_id) = (ns.clone(), local_id.clone());

        session
            .call(move |conn, statements| -> RepoResult<Option<OriginalPhoto>> {
                let mut stmt = conn.prepare_cached(&statements.get_original_photo)?;
                let photo = stmt
                    .query_row(params![ns.as_str(), local_id.as_str(), image_num], |row| {
                        Ok(parse_original_photo(row))
                    })
                    .optional()?
                    .transpose()?;
                debug!(
                    "event=photo_get module=repo status=ok ns={ns} local_id={local_id} image_num={image_num} found={}",
                    photo.is_some()
                );
                Ok(photo)
            })
            .await
    }

    async fn get_processed_photo(
        &self,
        uuid: PhotoId,
        processing_ident: &Identifier,
    ) -> RepoResult<Option<PetPhoto>> {
        let session = self.manager.session().await?;
        let tag = processing_ident.clone();

        session
            .call(move |conn, statements| -> RepoResult<Option<PetPhoto>> {
                let mut stmt = conn.prepare_cached(&statements.get_processed_photo)?;
                let photo = stmt
                    .query_row(params![uuid.to_string(), tag.as_str()], |row| {
                        Ok(PetPhoto {
                            image: row.get("image")?,
                            mime_type: row.get("image_mime_type")?,
                        })
                    })
                    .optional()?;
                Ok(photo)
            })
            .await
    }

    async fn get_photo_features(
        &self,
        uuid: PhotoId,
        features_ident: &Identifier,
    ) -> RepoResult<Option<FeatureVector>> {
        let session = self.manager.session().await?;
        let tag = features_ident.clone();

        session
            .call(move |conn, statements| -> RepoResult<Option<FeatureVector>> {
                let mut stmt = conn.prepare_cached(&statements.get_photo_features)?;
                let blob: Option<Vec<u8>> = stmt
                    .query_row(params![uuid.to_string(), tag.as_str()], |row| row.get(0))
                    .optional()?;
                blob.map(|bytes| decode_features_blob(&bytes)).transpose()
            })
            .await
    }

    async fn delete_original_photo(
        &self,
        ns: &Identifier,
        local_id: &Identifier,
        selector: PhotoSelector,
    ) -> RepoResult<bool> {
        let session = self.manager.session().await?;
        let (ns, local_id) = (ns.clone(), local_id.clone());

        session
            .call(move |conn, statements| -> RepoResult<bool> {
                let deleted = match selector {
                    PhotoSelector::All => conn
                        .prepare_cached(&statements.delete_all_original_photos)?
                        .execute(params![ns.as_str(), local_id.as_str()])?,
                    PhotoSelector::Single(image_num) => conn
                        .prepare_cached(&statements.delete_original_photo)?
                        .execute(params![ns.as_str(), local_id.as_str(), image_num])?,
                };
                info!(
                    "event=photo_delete module=repo status=ok ns={ns} local_id={local_id} selector={selector:?} rows={deleted}"
                );
                Ok(true)
            })
            .await
    }

    async fn delete_processed_photo(
        &self,
        uuid: PhotoId,
        processing_ident: &Identifier,
    ) -> RepoResult<bool> {
        let session = self.manager.session().await?;
        let tag = processing_ident.clone();

        session
            .call(move |conn, statements| -> RepoResult<bool> {
                conn.prepare_cached(&statements.delete_processed_photo)?
                    .execute(params![uuid.to_string(), tag.as_str()])?;
                info!("event=processed_photo_delete module=repo status=ok uuid={uuid} tag={tag}");
                Ok(true)
            })
            .await
    }

    async fn add_original_photo(
        &self,
        ns: &Identifier,
        local_id: &Identifier,
        image_num: i32,
        photo: &PetPhoto,
    ) -> RepoResult<AddedPhoto> {
        let session = self.manager.session().await?;
        let (ns, local_id, photo) = (ns.clone(), local_id.clone(), photo.clone());
        let minted = Uuid::new_v4();

        session
            .call(move |conn, statements| -> RepoResult<AddedPhoto> {
                let applied = conn
                    .prepare_cached(&statements.insert_original_photo)?
                    .execute(params![
                        ns.as_str(),
                        local_id.as_str(),
                        image_num,
                        minted.to_string(),
                        photo.image.as_deref(),
                        photo.mime_type.as_deref(),
                    ])?
                    == 1;

                if applied {
                    info!(
                        "event=photo_add module=repo status=ok ns={ns} local_id={local_id} image_num={image_num} uuid={minted}"
                    );
                    return Ok(AddedPhoto {
                        uuid: minted,
                        created: true,
                    });
                }

                let existing: Option<String> = conn
                    .prepare_cached(&statements.get_original_photo_uuid)?
                    .query_row(params![ns.as_str(), local_id.as_str(), image_num], |row| {
                        row.get(0)
                    })
                    .optional()?;

                match existing {
                    Some(text) => {
                        let uuid = parse_uuid(&text)?;
                        warn!(
                            "event=photo_add module=repo status=conflict ns={ns} local_id={local_id} image_num={image_num} uuid={uuid}"
                        );
                        Ok(AddedPhoto {
                            uuid,
                            created: false,
                        })
                    }
                    None => {
                        error!(
                            "event=photo_add module=repo status=error error_code=consistency_fault ns={ns} local_id={local_id} image_num={image_num}"
                        );
                        Err(RepoError::Consistency {
                            namespace: ns,
                            local_id,
                            image_num,
                        })
                    }
                }
            })
            .await
    }

    async fn add_processed_photo(
        &self,
        uuid: PhotoId,
        processing_ident: &Identifier,
        photo: &PetPhoto,
    ) -> RepoResult<bool> {
        let session = self.manager.session().await?;
        let (tag, photo) = (processing_ident.clone(), photo.clone());

        session
            .call(move |conn, statements| -> RepoResult<bool> {
                let applied = conn
                    .prepare_cached(&statements.insert_processed_photo)?
                    .execute(params![
                        uuid.to_string(),
                        tag.as_str(),
                        photo.image.as_deref(),
                        photo.mime_type.as_deref(),
                    ])?
                    == 1;

                if applied {
                    info!("event=processed_photo_add module=repo status=ok uuid={uuid} tag={tag}");
                } else {
                    warn!(
                        "event=processed_photo_add module=repo status=conflict uuid={uuid} tag={tag}"
                    );
                }
                Ok(applied)
            })
            .await
    }

    async fn set_photo_features(
        &self,
        uuid: PhotoId,
        features_ident: &Identifier,
        features: &[f64],
    ) -> RepoResult<bool> {
        let blob = encode_features_blob(features)?;
        let session = self.manager.session().await?;
        let tag = features_ident.clone();

        session
            .call(move |conn, statements| -> RepoResult<bool> {
                conn.prepare_cached(&statements.upsert_photo_features)?
                    .execute(params![uuid.to_string(), tag.as_str(), blob])?;
                info!("event=photo_features_set module=repo status=ok uuid={uuid} tag={tag}");
                Ok(true)
            })
            .await
    }
}

fn parse_uuid(text: &str) -> RepoResult<PhotoId> {
    Uuid::parse_str(text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid uuid value `{text}` in images_by_card_id.image_uuid"
        ))
    })
}

fn parse_original_ref(row: &Row<'_>) -> RepoResult<OriginalPhotoRef> {
    let uuid_text: String = row.get("image_uuid")?;
    Ok(OriginalPhotoRef {
        uuid: parse_uuid(&uuid_text)?,
        image_num: row.get("image_num")?,
    })
}

fn parse_original_photo(row: &Row<'_>) -> RepoResult<OriginalPhoto> {
    Ok(OriginalPhoto {
        reference: parse_original_ref(row)?,
        photo: PetPhoto {
            image: row.get("image")?,
            mime_type: row.get("image_mime_type")?,
        },
    })
}
