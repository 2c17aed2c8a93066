//! Entity field <-> column encodings.
//!
//! Pure functions and `ToSql`/`FromSql` impls; no I/O.
//!
//! # Invariants
//! - Enumeration codes: `1`/`2` for the named variants, `0` for unknown.
//!   Unrecognized codes decode to unknown.
//! - Event time is one tuple column `[epoch_ms, provenance]`.
//! - Location and contact info are composite JSON values.
//! - Feature vectors hold finite numbers only.

use super::{RepoError, RepoResult};
use crate::model::card::{Animal, CardType, ContactInfo, EventTime, FeatureVector, Location, Sex};
use crate::model::identifier::Identifier;
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;

const F64_WIDTH: usize = std::mem::size_of::<f64>();

pub fn animal_to_db(animal: Animal) -> i64 {
    match animal {
        Animal::Cat => 1,
        Animal::Dog => 2,
        Animal::Unknown => 0,
    }
}

pub fn animal_from_db(code: i64) -> Animal {
    match code {
        1 => Animal::Cat,
        2 => Animal::Dog,
        _ => Animal::Unknown,
    }
}

pub fn sex_to_db(sex: Sex) -> i64 {
    match sex {
        Sex::Female => 1,
        Sex::Male => 2,
        Sex::Unknown => 0,
    }
}

pub fn sex_from_db(code: i64) -> Sex {
    match code {
        1 => Sex::Female,
        2 => Sex::Male,
        _ => Sex::Unknown,
    }
}

pub fn card_type_to_db(card_type: CardType) -> i64 {
    match card_type {
        CardType::Found => 1,
        CardType::Lost => 2,
        CardType::Unknown => 0,
    }
}

pub fn card_type_from_db(code: i64) -> CardType {
    match code {
        1 => CardType::Found,
        2 => CardType::Lost,
        _ => CardType::Unknown,
    }
}

impl ToSql for EventTime {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        json_output(&(self.timestamp_ms, &self.provenance))
    }
}

impl FromSql for EventTime {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let (timestamp_ms, provenance) = json_column::<(i64, Option<String>)>(value)?;
        Ok(Self {
            timestamp_ms,
            provenance,
        })
    }
}

impl ToSql for Location {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        json_output(self)
    }
}

impl FromSql for Location {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        json_column(value)
    }
}

impl ToSql for ContactInfo {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        json_output(self)
    }
}

impl FromSql for ContactInfo {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        json_column(value)
    }
}

fn json_output<T: Serialize + ?Sized>(value: &T) -> rusqlite::Result<ToSqlOutput<'static>> {
    serde_json::to_string(value)
        .map(ToSqlOutput::from)
        .map_err(|err| rusqlite::Error::ToSqlConversionFailure(Box::new(err)))
}

fn json_column<T: DeserializeOwned>(value: ValueRef<'_>) -> FromSqlResult<T> {
    serde_json::from_str(value.as_str()?).map_err(|err| FromSqlError::Other(Box::new(err)))
}

/// Rejects NaN and infinities, which neither JSON nor similarity search
/// can use.
pub fn ensure_finite(features: &[f64]) -> RepoResult<()> {
    match features.iter().position(|value| !value.is_finite()) {
        Some(index) => Err(RepoError::InvalidInput(format!(
            "feature value at index {index} is not finite"
        ))),
        None => Ok(()),
    }
}

/// JSON array form used inside the card features map.
pub fn encode_features_json(features: &[f64]) -> RepoResult<String> {
    ensure_finite(features)?;
    serde_json::to_string(features).map_err(|err| RepoError::InvalidInput(err.to_string()))
}

pub fn encode_features_map(
    features: &BTreeMap<Identifier, FeatureVector>,
) -> RepoResult<String> {
    for vector in features.values() {
        ensure_finite(vector)?;
    }
    serde_json::to_string(features).map_err(|err| RepoError::InvalidInput(err.to_string()))
}

pub fn decode_features_map(text: &str) -> RepoResult<BTreeMap<Identifier, FeatureVector>> {
    serde_json::from_str(text).map_err(|err| {
        RepoError::InvalidData(format!("invalid features map in cards_by_id.features: {err}"))
    })
}

/// Little-endian `f64` sequence used by the photo features table.
pub fn encode_features_blob(features: &[f64]) -> RepoResult<Vec<u8>> {
    ensure_finite(features)?;
    Ok(features
        .iter()
        .flat_map(|value| value.to_le_bytes())
        .collect())
}

pub fn decode_features_blob(bytes: &[u8]) -> RepoResult<FeatureVector> {
    if bytes.len() % F64_WIDTH != 0 {
        return Err(RepoError::InvalidData(format!(
            "feature blob length {} is not a multiple of {F64_WIDTH}",
            bytes.len()
        )));
    }

    let mut features = Vec::with_capacity(bytes.len() / F64_WIDTH);
    for chunk in bytes.chunks_exact(F64_WIDTH) {
        let mut raw = [0_u8; F64_WIDTH];
        raw.copy_from_slice(chunk);
        features.push(f64::from_le_bytes(raw));
    }
    Ok(features)
}
