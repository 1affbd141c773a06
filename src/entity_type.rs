use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ts_rs::TS;

/// Kind of filing unit an [`Entity`](crate::model_family::Entity) represents.
///
/// Labels and icons are derived with exhaustive matches so that adding a
/// variant forces every presentation mapping to be updated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/", rename_all = "lowercase")]
pub enum EntityType {
    Individual,
    Spouse,
    Family,
    Huf,
    Joint,
    Business,
}

impl EntityType {
    pub const ALL: [EntityType; 6] = [
        EntityType::Individual,
        EntityType::Spouse,
        EntityType::Family,
        EntityType::Huf,
        EntityType::Joint,
        EntityType::Business,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            EntityType::Individual => "individual",
            EntityType::Spouse => "spouse",
            EntityType::Family => "family",
            EntityType::Huf => "huf",
            EntityType::Joint => "joint",
            EntityType::Business => "business",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            EntityType::Individual => "Individual",
            EntityType::Spouse => "Spouse",
            EntityType::Family => "Family",
            EntityType::Huf => "HUF",
            EntityType::Joint => "Joint",
            EntityType::Business => "Business",
        }
    }

    pub const fn icon(self) -> &'static str {
        match self {
            EntityType::Individual => "👤",
            EntityType::Spouse => "💑",
            EntityType::Family => "👨‍👩‍👧‍👦",
            EntityType::Huf => "🏠",
            EntityType::Joint => "🤝",
            EntityType::Business => "🏢",
        }
    }

    /// Whether the entity form offers member selection for this type.
    ///
    /// Individual entities are linked to their member through the PAN field
    /// instead. This is a presentation rule only; the store accepts any
    /// mapping.
    pub const fn accepts_manual_members(self) -> bool {
        match self {
            EntityType::Individual => false,
            EntityType::Spouse
            | EntityType::Family
            | EntityType::Huf
            | EntityType::Joint
            | EntityType::Business => true,
        }
    }

    pub fn iter() -> impl Iterator<Item = EntityType> {
        Self::ALL.into_iter()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid entity type: {value}")]
pub struct EntityTypeError {
    value: String,
}

impl EntityTypeError {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl FromStr for EntityType {
    type Err = EntityTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "individual" => Ok(EntityType::Individual),
            "spouse" => Ok(EntityType::Spouse),
            "family" => Ok(EntityType::Family),
            "huf" => Ok(EntityType::Huf),
            "joint" => Ok(EntityType::Joint),
            "business" => Ok(EntityType::Business),
            _ => Err(EntityTypeError::new(s)),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
