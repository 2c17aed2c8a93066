//! Parameterized statement catalogue.
//!
//! Statements are rendered against the active keyspace once per session and
//! warmed into the connection's prepared-statement cache during
//! initialization; repositories look them up with `prepare_cached`.

use super::schema::render;
use super::DbResult;
use crate::model::identifier::Identifier;
use log::debug;
use rusqlite::Connection;

const GET_CARD: &str = "SELECT
    provenance_url,
    animal,
    animal_sex,
    card_type,
    event_time,
    card_creation_time,
    event_location,
    contact_info,
    features
FROM \"{keyspace}\".cards_by_id
WHERE namespace = ?1 AND local_id = ?2;";

const INSERT_CARD: &str = "INSERT INTO \"{keyspace}\".cards_by_id (
    namespace,
    local_id,
    provenance_url,
    animal,
    animal_sex,
    card_type,
    event_time,
    card_creation_time,
    event_location,
    contact_info,
    features
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
ON CONFLICT DO NOTHING;";

const DELETE_CARD: &str =
    "DELETE FROM \"{keyspace}\".cards_by_id WHERE namespace = ?1 AND local_id = ?2;";

// Tags are identifiers, so quoting them into a JSON path is safe.
const MERGE_CARD_FEATURES: &str = "UPDATE \"{keyspace}\".cards_by_id
SET features = json_set(features, '$.\"' || ?3 || '\"', json(?4))
WHERE namespace = ?1 AND local_id = ?2;";

const INSERT_ORIGINAL_PHOTO: &str = "INSERT INTO \"{keyspace}\".images_by_card_id (
    namespace,
    local_id,
    image_num,
    image_uuid,
    image,
    image_mime_type
) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
ON CONFLICT DO NOTHING;";

const GET_ORIGINAL_PHOTO_UUID: &str = "SELECT image_uuid
FROM \"{keyspace}\".images_by_card_id
WHERE namespace = ?1 AND local_id = ?2 AND image_num = ?3;";

const GET_ORIGINAL_PHOTO: &str = "SELECT image_uuid, image_num, image, image_mime_type
FROM \"{keyspace}\".images_by_card_id
WHERE namespace = ?1 AND local_id = ?2 AND image_num = ?3;";

const LIST_ORIGINAL_PHOTOS_PAGE: &str = "SELECT image_uuid, image_num
FROM \"{keyspace}\".images_by_card_id
WHERE namespace = ?1 AND local_id = ?2 AND image_num > ?3
ORDER BY image_num
LIMIT ?4;";

const DELETE_ORIGINAL_PHOTO: &str = "DELETE FROM \"{keyspace}\".images_by_card_id
WHERE namespace = ?1 AND local_id = ?2 AND image_num = ?3;";

const DELETE_ALL_ORIGINAL_PHOTOS: &str =
    "DELETE FROM \"{keyspace}\".images_by_card_id WHERE namespace = ?1 AND local_id = ?2;";

const INSERT_PROCESSED_PHOTO: &str = "INSERT INTO \"{keyspace}\".processed_images_by_uuid (
    image_uuid,
    processing_ident,
    image,
    image_mime_type
) VALUES (?1, ?2, ?3, ?4)
ON CONFLICT DO NOTHING;";

const GET_PROCESSED_PHOTO: &str = "SELECT image, image_mime_type
FROM \"{keyspace}\".processed_images_by_uuid
WHERE image_uuid = ?1 AND processing_ident = ?2;";

const DELETE_PROCESSED_PHOTO: &str = "DELETE FROM \"{keyspace}\".processed_images_by_uuid
WHERE image_uuid = ?1 AND processing_ident = ?2;";

const UPSERT_PHOTO_FEATURES: &str = "INSERT INTO \"{keyspace}\".image_features_by_uuid (
    image_uuid,
    features_ident,
    features
) VALUES (?1, ?2, ?3)
ON CONFLICT (image_uuid, features_ident) DO UPDATE SET features = excluded.features;";

const GET_PHOTO_FEATURES: &str = "SELECT features
FROM \"{keyspace}\".image_features_by_uuid
WHERE image_uuid = ?1 AND features_ident = ?2;";

/// Keyspace-qualified SQL for every repository operation.
#[derive(Debug, Clone)]
pub struct Statements {
    pub get_card: String,
    pub insert_card: String,
    pub delete_card: String,
    pub merge_card_features: String,
    pub insert_original_photo: String,
    pub get_original_photo_uuid: String,
    pub get_original_photo: String,
    pub list_original_photos_page: String,
    pub delete_original_photo: String,
    pub delete_all_original_photos: String,
    pub insert_processed_photo: String,
    pub get_processed_photo: String,
    pub delete_processed_photo: String,
    pub upsert_photo_features: String,
    pub get_photo_features: String,
}

impl Statements {
    /// Renders the catalogue against `keyspace`.
    pub fn for_keyspace(keyspace: &Identifier) -> Self {
        Self {
            get_card: render(GET_CARD, keyspace),
            insert_card: render(INSERT_CARD, keyspace),
            delete_card: render(DELETE_CARD, keyspace),
            merge_card_features: render(MERGE_CARD_FEATURES, keyspace),
            insert_original_photo: render(INSERT_ORIGINAL_PHOTO, keyspace),
            get_original_photo_uuid: render(GET_ORIGINAL_PHOTO_UUID, keyspace),
            get_original_photo: render(GET_ORIGINAL_PHOTO, keyspace),
            list_original_photos_page: render(LIST_ORIGINAL_PHOTOS_PAGE, keyspace),
            delete_original_photo: render(DELETE_ORIGINAL_PHOTO, keyspace),
            delete_all_original_photos: render(DELETE_ALL_ORIGINAL_PHOTOS, keyspace),
            insert_processed_photo: render(INSERT_PROCESSED_PHOTO, keyspace),
            get_processed_photo: render(GET_PROCESSED_PHOTO, keyspace),
            delete_processed_photo: render(DELETE_PROCESSED_PHOTO, keyspace),
            upsert_photo_features: render(UPSERT_PHOTO_FEATURES, keyspace),
            get_photo_features: render(GET_PHOTO_FEATURES, keyspace),
        }
    }

    fn all(&self) -> [&str; 15] {
        [
            self.get_card.as_str(),
            self.insert_card.as_str(),
            self.delete_card.as_str(),
            self.merge_card_features.as_str(),
            self.insert_original_photo.as_str(),
            self.get_original_photo_uuid.as_str(),
            self.get_original_photo.as_str(),
            self.list_original_photos_page.as_str(),
            self.delete_original_photo.as_str(),
            self.delete_all_original_photos.as_str(),
            self.insert_processed_photo.as_str(),
            self.get_processed_photo.as_str(),
            self.delete_processed_photo.as_str(),
            self.upsert_photo_features.as_str(),
            self.get_photo_features.as_str(),
        ]
    }

    /// Compiles every statement into the connection's statement cache.
    ///
    /// Fails on the first statement the engine rejects, which also catches
    /// drift between the catalogue and the deployed schema.
    pub(crate) fn prepare_all(&self, conn: &Connection) -> DbResult<()> {
        let statements = self.all();
        conn.set_prepared_statement_cache_capacity(statements.len() * 2);
        for sql in statements {
            conn.prepare_cached(sql)?;
        }
        debug!(
            "event=statements_prepare module=db status=ok count={}",
            statements.len()
        );
        Ok(())
    }
}
