//! Pet card domain model.
//!
//! # Responsibility
//! - Define the lost/found pet record keyed by `(namespace, local_id)`.
//! - Provide lenient label parsing for enumerated attributes.
//!
//! # Invariants
//! - Unknown enumeration labels map to the `Unknown` variant, never an error.
//! - `features` is keyed by validated feature-set tag; entries are merged
//!   per tag.

use crate::model::identifier::Identifier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Numeric feature vector (e.g. an embedding).
pub type FeatureVector = Vec<f64>;

/// Kind of animal described by a card.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Animal {
    Cat,
    Dog,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Animal {
    pub fn from_label(label: &str) -> Self {
        match label {
            "cat" => Self::Cat,
            "dog" => Self::Dog,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cat => "cat",
            Self::Dog => "dog",
            Self::Unknown => "unknown",
        }
    }
}

/// Sex of the animal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Female,
    Male,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Sex {
    pub fn from_label(label: &str) -> Self {
        match label {
            "female" => Self::Female,
            "male" => Self::Male,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Female => "female",
            Self::Male => "male",
            Self::Unknown => "unknown",
        }
    }
}

/// Whether the card reports a found or a lost animal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardType {
    Found,
    Lost,
    #[default]
    #[serde(other)]
    Unknown,
}

impl CardType {
    pub fn from_label(label: &str) -> Self {
        match label {
            "found" => Self::Found,
            "lost" => Self::Lost,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Found => "found",
            Self::Lost => "lost",
            Self::Unknown => "unknown",
        }
    }
}

/// Event moment paired with whoever asserted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTime {
    /// Unix epoch milliseconds.
    pub timestamp_ms: i64,
    /// Source of the asserted time (site, user, parser...).
    pub provenance: Option<String>,
}

/// Where the event happened.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub address: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    /// How the coordinates were obtained (geocoder, GPS, manual...).
    pub coords_provenance: Option<String>,
}

/// Contact details of the card author. Name, emails, phones and websites are
/// treated as sensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: Option<String>,
    pub comment: Option<String>,
    #[serde(default)]
    pub email: Vec<String>,
    #[serde(default)]
    pub tel: Vec<String>,
    #[serde(default)]
    pub website: Vec<String>,
}

impl ContactInfo {
    /// Drops personally identifying fields, keeping the free-form comment.
    pub fn redact(&mut self) {
        self.name = None;
        self.email.clear();
        self.tel.clear();
        self.website.clear();
    }
}

/// Lost/found pet record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PetCard {
    pub provenance_url: Option<String>,
    pub animal: Animal,
    pub animal_sex: Sex,
    pub card_type: CardType,
    pub event_time: Option<EventTime>,
    /// Unix epoch milliseconds.
    pub card_creation_time: Option<i64>,
    pub location: Option<Location>,
    pub contact_info: Option<ContactInfo>,
    /// Feature-set tag to vector.
    #[serde(default)]
    pub features: BTreeMap<Identifier, FeatureVector>,
}
