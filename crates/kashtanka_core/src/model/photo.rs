//! Photo domain model.
//!
//! # Responsibility
//! - Describe original photos, processed variants and their stable handles.
//! - Model the "all photos" delete selector explicitly.
//!
//! # Invariants
//! - `PhotoId` is minted once per original photo and never changes.
//! - A processed variant is addressed by `(PhotoId, processing tag)`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable handle of an original photo, shared by all derived data.
pub type PhotoId = Uuid;

/// Image payload shared by originals and processed variants.
///
/// `image` is optional so metadata-only projections can reuse the type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PetPhoto {
    pub image: Option<Vec<u8>>,
    pub mime_type: Option<String>,
}

impl PetPhoto {
    pub fn new(image: impl Into<Vec<u8>>, mime_type: impl Into<String>) -> Self {
        Self {
            image: Some(image.into()),
            mime_type: Some(mime_type.into()),
        }
    }
}

/// Position of an original photo within its card, plus its stable handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OriginalPhotoRef {
    pub uuid: PhotoId,
    pub image_num: i32,
}

/// Original photo with its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginalPhoto {
    #[serde(flatten)]
    pub reference: OriginalPhotoRef,
    #[serde(flatten)]
    pub photo: PetPhoto,
}

/// Result of a conditional original-photo insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddedPhoto {
    /// Handle of the stored photo: freshly minted, or the pre-existing one.
    pub uuid: PhotoId,
    /// `false` when a photo already occupied the key.
    pub created: bool,
}

/// Which original photos of a card a delete targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhotoSelector {
    All,
    Single(i32),
}

impl PhotoSelector {
    /// Ordinal the boundary layer passes when the caller omits one.
    pub const ALL_SENTINEL: i32 = -1;

    /// Maps a boundary ordinal to a selector. Both the sentinel and `0`
    /// (an omitted route segment) mean "every photo".
    pub fn from_ordinal(ordinal: i32) -> Self {
        if ordinal == Self::ALL_SENTINEL || ordinal == 0 {
            Self::All
        } else {
            Self::Single(ordinal)
        }
    }
}

impl From<Option<i32>> for PhotoSelector {
    fn from(value: Option<i32>) -> Self {
        value.map_or(Self::All, Self::from_ordinal)
    }
}
