use serde::{Deserialize, Deserializer, Serialize};
use ts_rs::TS;

use crate::entity_type::EntityType;
use crate::validation::iso_to_display;

pub const VALIDATION_REQUIRED_FIELD: &str = "VALIDATION/REQUIRED_FIELD";
pub const VALIDATION_INVALID_PAN: &str = "VALIDATION/INVALID_PAN";
pub const VALIDATION_INVALID_AADHAAR: &str = "VALIDATION/INVALID_AADHAAR";
pub const VALIDATION_INVALID_DOB: &str = "VALIDATION/INVALID_DOB";
pub const VALIDATION_INVALID_ENTITY_TYPE: &str = "VALIDATION/INVALID_ENTITY_TYPE";
pub const VALIDATION_MEMBER_MISSING: &str = "VALIDATION/MEMBER_NOT_FOUND";
pub const VALIDATION_ENTITY_MISSING: &str = "VALIDATION/ENTITY_NOT_FOUND";
pub const PERSIST_WRITE_FAILED: &str = "PERSIST/WRITE_FAILED";

fn default_active() -> bool {
    true
}

/// Stored documents written by older front ends use `""` for absent values.
fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

/// Treats a stored `null` list the same as a missing one.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct Entity {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional)]
    pub pan: Option<String>,
    #[serde(default)]
    pub net_worth: f64,
    #[serde(default)]
    pub created_at: String,
}

impl Entity {
    pub fn is_individual(&self) -> bool {
        self.entity_type == EntityType::Individual
    }

    /// Form values for re-editing this entity.
    pub fn to_input(&self) -> EntityInput {
        EntityInput {
            name: self.name.clone(),
            entity_type: self.entity_type.as_str().to_string(),
            pan: self.pan.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct FamilyMember {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub relationship: String,
    /// ISO `yyyy-mm-dd`.
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional)]
    pub dob: Option<String>,
    #[serde(default)]
    pub gender: String,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional)]
    pub pan: Option<String>,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    #[ts(optional)]
    pub aadhaar: Option<String>,
    #[serde(rename = "isHUF", default)]
    pub is_huf: bool,
    #[serde(default)]
    pub notes: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl FamilyMember {
    pub fn has_pan(&self) -> bool {
        self.pan.is_some()
    }

    /// Form values for re-editing this member; the date of birth is shown
    /// back in `dd/mm/yyyy`.
    pub fn to_input(&self) -> MemberInput {
        MemberInput {
            name: self.name.clone(),
            relationship: self.relationship.clone(),
            dob: self.dob.as_deref().map(iso_to_display).unwrap_or_default(),
            gender: self.gender.clone(),
            pan: self.pan.clone().unwrap_or_default(),
            aadhaar: self.aadhaar.clone().unwrap_or_default(),
            is_huf: self.is_huf,
            notes: self.notes.clone(),
            active: self.active,
        }
    }
}

/// Join record between one entity and the members filing under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct EntityMapping {
    pub id: String,
    pub entity_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub member_ids: Vec<String>,
    #[serde(default)]
    pub created_at: String,
}

impl EntityMapping {
    pub fn references(&self, member_id: &str) -> bool {
        self.member_ids.iter().any(|id| id == member_id)
    }
}

/// Member form submission. Dates are in display form (`dd/mm/yyyy`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemberInput {
    pub name: String,
    pub relationship: String,
    pub dob: String,
    pub gender: String,
    pub pan: String,
    pub aadhaar: String,
    #[serde(alias = "isHUF")]
    pub is_huf: bool,
    pub notes: String,
    pub active: bool,
}

impl Default for MemberInput {
    fn default() -> Self {
        Self {
            name: String::new(),
            relationship: String::new(),
            dob: String::new(),
            gender: String::new(),
            pan: String::new(),
            aadhaar: String::new(),
            is_huf: false,
            notes: String::new(),
            active: default_active(),
        }
    }
}

/// Entity form submission; the selected member ids travel separately.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EntityInput {
    pub name: String,
    #[serde(rename = "type", alias = "entityType")]
    pub entity_type: String,
    pub pan: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entity_reads_legacy_empty_pan_and_missing_fields() {
        let payload = json!({
            "id": "id-1",
            "name": "Acme",
            "type": "business",
            "pan": ""
        });
        let entity: Entity = serde_json::from_value(payload).unwrap();
        assert_eq!(entity.pan, None);
        assert_eq!(entity.net_worth, 0.0);
        assert_eq!(entity.entity_type, EntityType::Business);
    }

    #[test]
    fn entity_serializes_with_storage_field_names() {
        let entity = Entity {
            id: "e1".into(),
            name: "Asha".into(),
            entity_type: EntityType::Individual,
            pan: Some("ABCDE1234F".into()),
            net_worth: 0.0,
            created_at: "2024-01-01T00:00:00.000Z".into(),
        };
        let value = serde_json::to_value(&entity).unwrap();
        assert_eq!(value["type"], "individual");
        assert_eq!(value["netWorth"], 0.0);
        assert_eq!(value["createdAt"], "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn member_defaults_to_active_and_keeps_huf_flag_name() {
        let payload = json!({
            "id": "m1",
            "name": "Ravi",
            "relationship": "Self",
            "isHUF": true
        });
        let member: FamilyMember = serde_json::from_value(payload).unwrap();
        assert!(member.active);
        assert!(member.is_huf);

        let value = serde_json::to_value(&member).unwrap();
        assert_eq!(value["isHUF"], true);
        assert!(value.get("pan").is_none());
    }

    #[test]
    fn member_to_input_shows_display_date() {
        let member = FamilyMember {
            id: "m1".into(),
            name: "Ravi".into(),
            relationship: "Son".into(),
            dob: Some("2020-03-05".into()),
            gender: "male".into(),
            pan: None,
            aadhaar: Some("123456789012".into()),
            is_huf: false,
            notes: String::new(),
            active: true,
        };
        let input = member.to_input();
        assert_eq!(input.dob, "05/03/2020");
        assert_eq!(input.pan, "");
        assert_eq!(input.aadhaar, "123456789012");
    }

    #[test]
    fn entity_input_accepts_type_alias() {
        let input: EntityInput =
            serde_json::from_value(json!({ "name": "Home", "entityType": "family" })).unwrap();
        assert_eq!(input.entity_type, "family");
        assert_eq!(input.pan, "");
    }
}
