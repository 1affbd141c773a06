//! Keeps family members, their auto-created individual entities and the
//! entity mappings consistent.
//!
//! A member with a PAN owns (at most) one `individual` entity, reached through
//! a mapping whose `member_ids` contains the member. The rules per member
//! edit, keyed on the PAN before and after the submission:
//!
//! | before | after | effect |
//! |---|---|---|
//! | any | PAN, no individual mapping | create entity + mapping |
//! | PAN | PAN, mapping | refresh entity name and PAN |
//! | PAN | no PAN, mapping | drop mapping, drop entity if unreferenced |
//! | no PAN | no PAN | nothing |
//!
//! Every operation validates its whole input before touching the store, so a
//! rejected submission leaves no partial state behind.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    entity_type::EntityType,
    id::new_uuid_v7,
    model_family::{
        Entity, EntityInput, EntityMapping, FamilyMember, MemberInput,
        VALIDATION_ENTITY_MISSING, VALIDATION_INVALID_ENTITY_TYPE, VALIDATION_MEMBER_MISSING,
    },
    store::DomainStore,
    time::now_rfc3339,
    validation::{check_aadhaar, check_dob, check_pan, require},
    AppError, AppResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ReconcilePolicy {
    /// Delete mappings whose last member was deleted. Off by default: member
    /// deletion only strips the id and leaves the mapping in place.
    pub prune_empty_mappings: bool,
}

/// What a member submission did to the member's individual entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PanLink {
    Unchanged,
    Created {
        entity_id: String,
        mapping_id: String,
    },
    Updated {
        entity_id: String,
    },
    Removed {
        entity_id: String,
        mapping_id: String,
        entity_deleted: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberChange {
    pub member: FamilyMember,
    pub created: bool,
    pub pan_link: PanLink,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRemoval {
    pub member: FamilyMember,
    pub mappings_touched: usize,
    pub mappings_pruned: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityChange {
    pub entity: Entity,
    pub created: bool,
    pub mapping: Option<EntityMapping>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRemoval {
    pub entity: Entity,
    pub mappings_removed: usize,
}

struct ValidMember {
    name: String,
    relationship: String,
    dob: Option<String>,
    gender: String,
    pan: Option<String>,
    aadhaar: Option<String>,
    is_huf: bool,
    notes: String,
    active: bool,
}

impl ValidMember {
    fn apply_to(self, member: &mut FamilyMember) {
        member.name = self.name;
        member.relationship = self.relationship;
        member.dob = self.dob;
        member.gender = self.gender;
        member.pan = self.pan;
        member.aadhaar = self.aadhaar;
        member.is_huf = self.is_huf;
        member.notes = self.notes;
        member.active = self.active;
    }

    fn into_member(self, id: String) -> FamilyMember {
        let mut member = FamilyMember {
            id,
            name: String::new(),
            relationship: String::new(),
            dob: None,
            gender: String::new(),
            pan: None,
            aadhaar: None,
            is_huf: false,
            notes: String::new(),
            active: true,
        };
        self.apply_to(&mut member);
        member
    }
}

fn validate_member(input: &MemberInput) -> AppResult<ValidMember> {
    require("name", &input.name, "Name")?;
    require("relationship", &input.relationship, "Relationship")?;
    let dob = check_dob(&input.dob)?;
    let pan = check_pan(&input.pan)?;
    let aadhaar = check_aadhaar(&input.aadhaar)?;

    Ok(ValidMember {
        name: input.name.trim().to_string(),
        relationship: input.relationship.trim().to_string(),
        dob,
        gender: input.gender.trim().to_string(),
        pan,
        aadhaar,
        is_huf: input.is_huf,
        notes: input.notes.clone(),
        active: input.active,
    })
}

struct ValidEntity {
    name: String,
    entity_type: EntityType,
    pan: Option<String>,
}

fn validate_entity(input: &EntityInput) -> AppResult<ValidEntity> {
    require("name", &input.name, "Name")?;
    require("type", &input.entity_type, "Entity type")?;
    let entity_type = input.entity_type.parse::<EntityType>().map_err(|err| {
        AppError::new(VALIDATION_INVALID_ENTITY_TYPE, "Entity type not recognised.")
            .with_context("type", err.value().to_string())
    })?;
    let pan = check_pan(&input.pan)?;
    Ok(ValidEntity {
        name: input.name.trim().to_string(),
        entity_type,
        pan,
    })
}

fn member_missing(member_id: &str) -> AppError {
    AppError::new(VALIDATION_MEMBER_MISSING, "Family member not found.")
        .with_context("member_id", member_id.to_string())
}

fn entity_missing(entity_id: &str) -> AppError {
    AppError::new(VALIDATION_ENTITY_MISSING, "Entity not found.")
        .with_context("entity_id", entity_id.to_string())
}

/// De-duplicates the selection (first occurrence wins) and checks that each
/// id names an existing member.
fn resolve_selection(store: &DomainStore, selected: &[String]) -> AppResult<Vec<String>> {
    let mut seen = HashSet::new();
    let mut ids = Vec::with_capacity(selected.len());
    for raw in selected {
        let id = raw.trim();
        if id.is_empty() || !seen.insert(id.to_string()) {
            continue;
        }
        if store.member(id).is_none() {
            return Err(member_missing(id));
        }
        ids.push(id.to_string());
    }
    Ok(ids)
}

/// First mapping that lists `member_id` and points at an existing
/// `individual` entity, as `(mapping_id, entity_id)`.
pub fn find_individual_mapping(store: &DomainStore, member_id: &str) -> Option<(String, String)> {
    store
        .mappings_referencing(member_id)
        .find(|mapping| {
            store
                .entity(&mapping.entity_id)
                .map(Entity::is_individual)
                .unwrap_or(false)
        })
        .map(|mapping| (mapping.id.clone(), mapping.entity_id.clone()))
}

fn link_new_individual(store: &mut DomainStore, member_id: &str, name: &str, pan: &str) -> PanLink {
    let now = now_rfc3339();
    let entity = Entity {
        id: new_uuid_v7(),
        name: name.to_string(),
        entity_type: EntityType::Individual,
        pan: Some(pan.to_string()),
        net_worth: 0.0,
        created_at: now.clone(),
    };
    let mapping = EntityMapping {
        id: new_uuid_v7(),
        entity_id: entity.id.clone(),
        member_ids: vec![member_id.to_string()],
        created_at: now,
    };
    let link = PanLink::Created {
        entity_id: entity.id.clone(),
        mapping_id: mapping.id.clone(),
    };
    store.insert_entity(entity);
    store.upsert_mapping(mapping);
    link
}

fn unlink_individual(store: &mut DomainStore, mapping_id: String, entity_id: String) -> PanLink {
    store.remove_mapping(&mapping_id);
    let entity_deleted = if store.is_entity_mapped(&entity_id) {
        false
    } else {
        store.remove_entity(&entity_id).is_some()
    };
    PanLink::Removed {
        entity_id,
        mapping_id,
        entity_deleted,
    }
}

/// Creates a member (`member_id == None`) or replaces an existing member's
/// fields, then reconciles the member's individual entity.
pub fn create_or_update_member(
    store: &mut DomainStore,
    member_id: Option<&str>,
    input: &MemberInput,
) -> AppResult<MemberChange> {
    let valid = validate_member(input)?;

    let Some(member_id) = member_id else {
        let member = valid.into_member(new_uuid_v7());
        store.insert_member(member.clone());
        let pan_link = match member.pan.as_deref() {
            Some(pan) => link_new_individual(store, &member.id, &member.name, pan),
            None => PanLink::Unchanged,
        };
        log_pan_link(&member.id, &pan_link);
        return Ok(MemberChange {
            member,
            created: true,
            pan_link,
        });
    };

    let existing = store
        .member_mut(member_id)
        .ok_or_else(|| member_missing(member_id))?;
    let had_pan = existing.has_pan();
    valid.apply_to(existing);
    let member = existing.clone();

    let pan_link = match (
        had_pan,
        member.pan.as_deref(),
        find_individual_mapping(store, member_id),
    ) {
        (_, Some(pan), None) => link_new_individual(store, member_id, &member.name, pan),
        (_, Some(pan), Some((_, entity_id))) => {
            if let Some(entity) = store.entity_mut(&entity_id) {
                entity.name = member.name.clone();
                entity.pan = Some(pan.to_string());
            }
            PanLink::Updated { entity_id }
        }
        (true, None, Some((mapping_id, entity_id))) => {
            unlink_individual(store, mapping_id, entity_id)
        }
        (_, None, _) => PanLink::Unchanged,
    };
    log_pan_link(member_id, &pan_link);

    Ok(MemberChange {
        member,
        created: false,
        pan_link,
    })
}

fn log_pan_link(member_id: &str, link: &PanLink) {
    match link {
        PanLink::Unchanged => {}
        PanLink::Created { entity_id, .. } => info!(
            target: "fincent",
            area = "family",
            event = "individual_entity_created",
            member_id,
            entity_id = entity_id.as_str()
        ),
        PanLink::Updated { entity_id } => debug!(
            target: "fincent",
            area = "family",
            event = "individual_entity_refreshed",
            member_id,
            entity_id = entity_id.as_str()
        ),
        PanLink::Removed {
            entity_id,
            entity_deleted,
            ..
        } => info!(
            target: "fincent",
            area = "family",
            event = "individual_entity_unlinked",
            member_id,
            entity_id = entity_id.as_str(),
            entity_deleted = *entity_deleted
        ),
    }
}

/// Removes a member and strips it from every mapping. Mappings left empty
/// survive unless the policy prunes them.
pub fn delete_member(
    store: &mut DomainStore,
    member_id: &str,
    policy: ReconcilePolicy,
) -> AppResult<MemberRemoval> {
    let member = store
        .remove_member(member_id)
        .ok_or_else(|| member_missing(member_id))?;
    let mappings_touched = store.strip_member_from_mappings(member_id);
    let mappings_pruned = if policy.prune_empty_mappings {
        store.remove_empty_mappings()
    } else {
        0
    };
    Ok(MemberRemoval {
        member,
        mappings_touched,
        mappings_pruned,
    })
}

/// Creates or edits an entity and replaces its mapping wholesale with
/// `selected_member_ids`. An empty selection leaves the entity unmapped.
pub fn create_or_update_entity(
    store: &mut DomainStore,
    entity_id: Option<&str>,
    input: &EntityInput,
    selected_member_ids: &[String],
) -> AppResult<EntityChange> {
    let valid = validate_entity(input)?;
    let member_ids = resolve_selection(store, selected_member_ids)?;

    let (entity, created) = match entity_id {
        Some(entity_id) => {
            let entity = store
                .entity_mut(entity_id)
                .ok_or_else(|| entity_missing(entity_id))?;
            entity.name = valid.name;
            entity.entity_type = valid.entity_type;
            entity.pan = valid.pan;
            (entity.clone(), false)
        }
        None => {
            let entity = Entity {
                id: new_uuid_v7(),
                name: valid.name,
                entity_type: valid.entity_type,
                pan: valid.pan,
                net_worth: 0.0,
                created_at: now_rfc3339(),
            };
            store.insert_entity(entity.clone());
            (entity, true)
        }
    };

    let mapping = if member_ids.is_empty() {
        store.remove_mappings_for_entity(&entity.id);
        None
    } else {
        let mapping = EntityMapping {
            id: new_uuid_v7(),
            entity_id: entity.id.clone(),
            member_ids,
            created_at: now_rfc3339(),
        };
        store.upsert_mapping(mapping.clone());
        Some(mapping)
    };

    Ok(EntityChange {
        entity,
        created,
        mapping,
    })
}

/// Removes an entity and its mapping. Members are untouched.
pub fn delete_entity(store: &mut DomainStore, entity_id: &str) -> AppResult<EntityRemoval> {
    let entity = store
        .remove_entity(entity_id)
        .ok_or_else(|| entity_missing(entity_id))?;
    let mappings_removed = store.remove_mappings_for_entity(entity_id);
    Ok(EntityRemoval {
        entity,
        mappings_removed,
    })
}

/// Members listed on the entity's mapping, skipping ids whose member no
/// longer exists.
pub fn mapped_members<'a>(store: &'a DomainStore, entity_id: &str) -> Vec<&'a FamilyMember> {
    store
        .mapping_for_entity(entity_id)
        .map(|mapping| {
            mapping
                .member_ids
                .iter()
                .filter_map(|id| store.member(id))
                .collect()
        })
        .unwrap_or_default()
}

/// Creates `name` as the first entity when the collection is empty.
pub fn seed_default_entity(
    store: &mut DomainStore,
    name: &str,
    entity_type: EntityType,
) -> Option<Entity> {
    if !store.entities().is_empty() {
        return None;
    }
    let entity = Entity {
        id: new_uuid_v7(),
        name: name.to_string(),
        entity_type,
        pan: None,
        net_worth: 0.0,
        created_at: now_rfc3339(),
    };
    store.insert_entity(entity.clone());
    info!(
        target: "fincent",
        area = "entities",
        event = "default_entity_seeded",
        entity_id = entity.id.as_str()
    );
    Some(entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model_family::{VALIDATION_INVALID_PAN, VALIDATION_REQUIRED_FIELD};
    use crate::persistence::Persistence;
    use crate::storage::MemoryStore;
    use crate::store::StorageKeys;
    use std::sync::Arc;

    fn store() -> DomainStore {
        DomainStore::hydrate(
            Persistence::new(Arc::new(MemoryStore::new())),
            StorageKeys::default(),
        )
    }

    fn member_input(name: &str, pan: &str) -> MemberInput {
        MemberInput {
            name: name.into(),
            relationship: "Self".into(),
            pan: pan.into(),
            ..MemberInput::default()
        }
    }

    fn entity_input(name: &str, kind: &str) -> EntityInput {
        EntityInput {
            name: name.into(),
            entity_type: kind.into(),
            pan: String::new(),
        }
    }

    #[test]
    fn creating_member_with_pan_links_individual_entity() {
        let mut store = store();
        let change = create_or_update_member(&mut store, None, &member_input("Asha", "ABCDE1234F"))
            .unwrap();
        assert!(change.created);
        let PanLink::Created { entity_id, .. } = &change.pan_link else {
            panic!("expected created link, got {:?}", change.pan_link);
        };
        let entity = store.entity(entity_id).unwrap();
        assert_eq!(entity.entity_type, EntityType::Individual);
        assert_eq!(entity.pan.as_deref(), Some("ABCDE1234F"));
        assert_eq!(
            store.mapping_for_entity(entity_id).unwrap().member_ids,
            vec![change.member.id.clone()]
        );
    }

    #[test]
    fn member_without_pan_creates_nothing_else() {
        let mut store = store();
        let change = create_or_update_member(&mut store, None, &member_input("Ravi", "")).unwrap();
        assert_eq!(change.pan_link, PanLink::Unchanged);
        assert!(store.entities().is_empty());
        assert!(store.mappings().is_empty());
    }

    #[test]
    fn rejected_submission_leaves_store_untouched() {
        let mut store = store();
        let err = create_or_update_member(&mut store, None, &member_input("Asha", "abcde1234f"))
            .unwrap_err();
        assert_eq!(err.code(), VALIDATION_INVALID_PAN);

        let mut missing_relationship = member_input("Asha", "ABCDE1234F");
        missing_relationship.relationship = "  ".into();
        let err = create_or_update_member(&mut store, None, &missing_relationship).unwrap_err();
        assert_eq!(err.code(), VALIDATION_REQUIRED_FIELD);

        assert!(store.members().is_empty());
        assert!(store.entities().is_empty());
    }

    #[test]
    fn edit_with_invalid_dob_does_not_touch_member() {
        let mut store = store();
        let member = create_or_update_member(&mut store, None, &member_input("Asha", ""))
            .unwrap()
            .member;
        let mut input = member.to_input();
        input.name = "Changed".into();
        input.dob = "40/01/2000".into();
        assert!(create_or_update_member(&mut store, Some(&member.id), &input).is_err());
        assert_eq!(store.member(&member.id).unwrap().name, "Asha");
    }

    #[test]
    fn pan_change_refreshes_existing_entity() {
        let mut store = store();
        let member = create_or_update_member(&mut store, None, &member_input("Asha", "ABCDE1234F"))
            .unwrap()
            .member;

        let mut input = member.to_input();
        input.name = "Asha Rao".into();
        input.pan = "ZZZZZ9999Z".into();
        let change = create_or_update_member(&mut store, Some(&member.id), &input).unwrap();

        let PanLink::Updated { entity_id } = change.pan_link else {
            panic!("expected update");
        };
        assert_eq!(store.entities().len(), 1);
        let entity = store.entity(&entity_id).unwrap();
        assert_eq!(entity.name, "Asha Rao");
        assert_eq!(entity.pan.as_deref(), Some("ZZZZZ9999Z"));
        assert_eq!(store.mappings().len(), 1);
    }

    #[test]
    fn manual_mapping_of_pan_less_member_survives_edit() {
        let mut store = store();
        let member = create_or_update_member(&mut store, None, &member_input("Ravi", ""))
            .unwrap()
            .member;
        let entity = create_or_update_entity(
            &mut store,
            None,
            &entity_input("Ravi", "individual"),
            &[member.id.clone()],
        )
        .unwrap()
        .entity;

        let change =
            create_or_update_member(&mut store, Some(&member.id), &member.to_input()).unwrap();
        assert_eq!(change.pan_link, PanLink::Unchanged);
        assert!(store.entity(&entity.id).is_some());
        assert!(store.mapping_for_entity(&entity.id).is_some());
    }

    #[test]
    fn entity_selection_is_deduplicated_and_checked() {
        let mut store = store();
        let a = create_or_update_member(&mut store, None, &member_input("A", ""))
            .unwrap()
            .member;
        let change = create_or_update_entity(
            &mut store,
            None,
            &entity_input("Home", "family"),
            &[a.id.clone(), a.id.clone(), " ".into()],
        )
        .unwrap();
        assert_eq!(change.mapping.unwrap().member_ids, vec![a.id.clone()]);

        let err = create_or_update_entity(
            &mut store,
            None,
            &entity_input("Other", "joint"),
            &["ghost".to_string()],
        )
        .unwrap_err();
        assert_eq!(err.code(), VALIDATION_MEMBER_MISSING);
        assert_eq!(store.entities().len(), 1);
    }

    #[test]
    fn entity_type_must_be_known() {
        let mut store = store();
        let err = create_or_update_entity(&mut store, None, &entity_input("X", "trust"), &[])
            .unwrap_err();
        assert_eq!(err.code(), VALIDATION_INVALID_ENTITY_TYPE);
    }

    #[test]
    fn empty_selection_clears_mapping() {
        let mut store = store();
        let a = create_or_update_member(&mut store, None, &member_input("A", ""))
            .unwrap()
            .member;
        let entity = create_or_update_entity(
            &mut store,
            None,
            &entity_input("Home", "family"),
            &[a.id.clone()],
        )
        .unwrap()
        .entity;
        let change =
            create_or_update_entity(&mut store, Some(&entity.id), &entity.to_input(), &[]).unwrap();
        assert!(change.mapping.is_none());
        assert!(store.mappings().is_empty());
    }

    #[test]
    fn deleting_entity_drops_mapping_but_keeps_members() {
        let mut store = store();
        let member = create_or_update_member(&mut store, None, &member_input("Asha", "ABCDE1234F"))
            .unwrap()
            .member;
        let entity_id = store.entities()[0].id.clone();
        let removal = delete_entity(&mut store, &entity_id).unwrap();
        assert_eq!(removal.mappings_removed, 1);
        assert!(store.member(&member.id).is_some());
        assert!(store.mappings().is_empty());

        let err = delete_entity(&mut store, &entity_id).unwrap_err();
        assert_eq!(err.code(), VALIDATION_ENTITY_MISSING);
    }

    #[test]
    fn kept_pan_without_mapping_relinks() {
        let mut store = store();
        let member = create_or_update_member(&mut store, None, &member_input("Asha", "ABCDE1234F"))
            .unwrap()
            .member;
        let entity_id = store.entities()[0].id.clone();
        delete_entity(&mut store, &entity_id).unwrap();

        let change =
            create_or_update_member(&mut store, Some(&member.id), &member.to_input()).unwrap();
        assert!(matches!(change.pan_link, PanLink::Created { .. }));
        assert_eq!(store.entities().len(), 1);
    }

    #[test]
    fn prune_policy_removes_emptied_mappings() {
        let mut store = store();
        let member = create_or_update_member(&mut store, None, &member_input("Asha", "ABCDE1234F"))
            .unwrap()
            .member;
        let removal = delete_member(
            &mut store,
            &member.id,
            ReconcilePolicy {
                prune_empty_mappings: true,
            },
        )
        .unwrap();
        assert_eq!(removal.mappings_touched, 1);
        assert_eq!(removal.mappings_pruned, 1);
        assert!(store.mappings().is_empty());
        assert_eq!(store.entities().len(), 1);
    }

    #[test]
    fn mapped_members_skip_orphans() {
        let mut store = store();
        let a = create_or_update_member(&mut store, None, &member_input("A", ""))
            .unwrap()
            .member;
        let entity = create_or_update_entity(
            &mut store,
            None,
            &entity_input("Home", "family"),
            &[a.id.clone()],
        )
        .unwrap()
        .entity;
        store.upsert_mapping(EntityMapping {
            id: "manual".into(),
            entity_id: entity.id.clone(),
            member_ids: vec!["ghost".into(), a.id.clone()],
            created_at: String::new(),
        });
        let names: Vec<_> = mapped_members(&store, &entity.id)
            .into_iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["A"]);
    }

    #[test]
    fn default_entity_is_seeded_only_once() {
        let mut store = store();
        assert!(seed_default_entity(&mut store, "Household", EntityType::Family).is_some());
        assert!(seed_default_entity(&mut store, "Household", EntityType::Family).is_none());
        assert_eq!(store.entities().len(), 1);
    }
}
