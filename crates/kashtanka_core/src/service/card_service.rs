//! Card use-case service.
//!
//! # Responsibility
//! - Serve cards to callers with contact details redacted by default.
//! - Delegate persistence to a `CardStorage` implementation.
//!
//! # Invariants
//! - Redaction only touches the returned copy, never the stored card.

use crate::model::card::PetCard;
use crate::model::identifier::Identifier;
use crate::repo::{CardStorage, RepoResult};
use log::debug;
use std::sync::Arc;

pub struct CardService<S: CardStorage + ?Sized> {
    cards: Arc<S>,
}

impl<S: CardStorage + ?Sized> CardService<S> {
    pub fn new(cards: Arc<S>) -> Self {
        Self { cards }
    }

    /// Fetches a card. Unless `include_sensitive` is set, the contact name,
    /// emails, phones and websites are cleared; the comment is kept.
    pub async fn get_card(
        &self,
        ns: &Identifier,
        local_id: &Identifier,
        include_sensitive: bool,
    ) -> RepoResult<Option<PetCard>> {
        let mut card = self.cards.get_card(ns, local_id).await?;
        if !include_sensitive {
            if let Some(contact) = card.as_mut().and_then(|card| card.contact_info.as_mut()) {
                contact.redact();
                debug!(
                    "event=card_redact module=service status=ok ns={ns} local_id={local_id}"
                );
            }
        }
        Ok(card)
    }

    pub async fn create_card(
        &self,
        ns: &Identifier,
        local_id: &Identifier,
        card: &PetCard,
    ) -> RepoResult<bool> {
        self.cards.create_card(ns, local_id, card).await
    }

    pub async fn delete_card(&self, ns: &Identifier, local_id: &Identifier) -> RepoResult<bool> {
        self.cards.delete_card(ns, local_id).await
    }

    pub async fn set_card_features(
        &self,
        ns: &Identifier,
        local_id: &Identifier,
        features_ident: &Identifier,
        features: &[f64],
    ) -> RepoResult<bool> {
        self.cards
            .set_card_features(ns, local_id, features_ident, features)
            .await
    }
}
