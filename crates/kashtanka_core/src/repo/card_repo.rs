//! SQLite-backed pet card repository.
//!
//! # Responsibility
//! - Conditional card creation, lookup, deletion and feature merging.
//!
//! # Invariants
//! - A create never overwrites: the insert only applies when the key is free.
//! - Feature attachment rewrites a single tag inside the stored map.
//! - Enumeration columns decode leniently; other undecodable data is an error.

use super::codec::{
    animal_from_db, animal_to_db, card_type_from_db, card_type_to_db, decode_features_map,
    encode_features_json, encode_features_map, sex_from_db, sex_to_db,
};
use super::{CardStorage, RepoError, RepoResult};
use crate::db::ConnectionManager;
use crate::model::card::PetCard;
use crate::model::identifier::Identifier;
use async_trait::async_trait;
use log::{debug, info, warn};
use rusqlite::{params, OptionalExtension, Row};
use std::sync::Arc;

pub struct SqliteCardRepository {
    manager: Arc<ConnectionManager>,
}

impl SqliteCardRepository {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl CardStorage for SqliteCardRepository {
    async fn get_card(
        &self,
        ns: &Identifier,
        local_id: &Identifier,
    ) -> RepoResult<Option<PetCard>> {
        let session = self.manager.session().await?;
        let (ns, local_id) = (ns.clone(), local_id.clone());

        session
            .call(move |conn, statements| -> RepoResult<Option<PetCard>> {
                let mut stmt = conn.prepare_cached(&statements.get_card)?;
                let card = stmt
                    .query_row(params![ns.as_str(), local_id.as_str()], |row| {
                        Ok(parse_card_row(row))
                    })
                    .optional()?
                    .transpose()?;
                debug!(
                    "event=card_get module=repo status=ok ns={ns} local_id={local_id} found={}",
                    card.is_some()
                );
                Ok(card)
            })
            .await
    }

    async fn create_card(
        &self,
        ns: &Identifier,
        local_id: &Identifier,
        card: &PetCard,
    ) -> RepoResult<bool> {
        let features = encode_features_map(&card.features)?;
        let session = self.manager.session().await?;
        let (ns, local_id, card) = (ns.clone(), local_id.clone(), card.clone());

        session
            .call(move |conn, statements| -> RepoResult<bool> {
                let mut stmt = conn.prepare_cached(&statements.insert_card)?;
                let applied = stmt.execute(params![
                    ns.as_str(),
                    local_id.as_str(),
                    card.provenance_url.as_deref(),
                    animal_to_db(card.animal),
                    sex_to_db(card.animal_sex),
                    card_type_to_db(card.card_type),
                    card.event_time.as_ref(),
                    card.card_creation_time,
                    card.location.as_ref(),
                    card.contact_info.as_ref(),
                    features,
                ])? == 1;

                if applied {
                    info!("event=card_create module=repo status=ok ns={ns} local_id={local_id}");
                } else {
                    warn!(
                        "event=card_create module=repo status=conflict ns={ns} local_id={local_id}"
                    );
                }
                Ok(applied)
            })
            .await
    }

    async fn delete_card(&self, ns: &Identifier, local_id: &Identifier) -> RepoResult<bool> {
        let session = self.manager.session().await?;
        let (ns, local_id) = (ns.clone(), local_id.clone());

        session
            .call(move |conn, statements| -> RepoResult<bool> {
                let mut stmt = conn.prepare_cached(&statements.delete_card)?;
                stmt.execute(params![ns.as_str(), local_id.as_str()])?;
                info!("event=card_delete module=repo status=ok ns={ns} local_id={local_id}");
                Ok(true)
            })
            .await
    }

    async fn set_card_features(
        &self,
        ns: &Identifier,
        local_id: &Identifier,
        features_ident: &Identifier,
        features: &[f64],
    ) -> RepoResult<bool> {
        let vector = encode_features_json(features)?;
        let session = self.manager.session().await?;
        let (ns, local_id, tag) = (ns.clone(), local_id.clone(), features_ident.clone());

        session
            .call(move |conn, statements| -> RepoResult<bool> {
                let mut stmt = conn.prepare_cached(&statements.merge_card_features)?;
                let changed =
                    stmt.execute(params![ns.as_str(), local_id.as_str(), tag.as_str(), vector])?;
                if changed == 0 {
                    warn!(
                        "event=card_features_set module=repo status=not_found ns={ns} local_id={local_id} tag={tag}"
                    );
                    return Ok(false);
                }
                info!(
                    "event=card_features_set module=repo status=ok ns={ns} local_id={local_id} tag={tag}"
                );
                Ok(true)
            })
            .await
    }
}

fn parse_card_row(row: &Row<'_>) -> RepoResult<PetCard> {
    let features_text: String = row.get("features")?;

    Ok(PetCard {
        provenance_url: row.get("provenance_url")?,
        animal: animal_from_db(row.get("animal")?),
        animal_sex: sex_from_db(row.get("animal_sex")?),
        card_type: card_type_from_db(row.get("card_type")?),
        event_time: row.get("event_time").map_err(conversion_error)?,
        card_creation_time: row.get("card_creation_time")?,
        location: row.get("event_location").map_err(conversion_error)?,
        contact_info: row.get("contact_info").map_err(conversion_error)?,
        features: decode_features_map(&features_text)?,
    })
}

fn conversion_error(err: rusqlite::Error) -> RepoError {
    match err {
        rusqlite::Error::FromSqlConversionFailure(index, _, source) => RepoError::InvalidData(
            format!("cannot decode column {index} of cards_by_id: {source}"),
        ),
        other => other.into(),
    }
}
