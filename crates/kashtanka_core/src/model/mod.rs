//! Domain model for pet cards and their photographs.
//!
//! # Responsibility
//! - Define the identifier, card and photo types shared by every layer.
//!
//! # Invariants
//! - Keys entering the storage layer are always `Identifier`s.
//! - Original photos are tied to derived data by their stable `PhotoId`.

pub mod card;
pub mod identifier;
pub mod photo;
