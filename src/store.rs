use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    model_family::{Entity, EntityMapping, FamilyMember},
    persistence::Persistence,
};

/// Storage keys of the three persisted documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct StorageKeys {
    pub entities: String,
    pub family_members: String,
    pub entity_mappings: String,
}

impl Default for StorageKeys {
    fn default() -> Self {
        Self {
            entities: "entities".into(),
            family_members: "familyMembers".into(),
            entity_mappings: "entityMappings".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
    Entities,
    FamilyMembers,
    EntityMappings,
}

/// Copy of all three collections handed to refresh listeners.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub entities: Vec<Entity>,
    pub family_members: Vec<FamilyMember>,
    pub entity_mappings: Vec<EntityMapping>,
}

/// In-memory collections hydrated once from storage and written back in
/// full by [`flush`](Self::flush).
pub struct DomainStore {
    persistence: Persistence,
    keys: StorageKeys,
    entities: Vec<Entity>,
    members: Vec<FamilyMember>,
    mappings: Vec<EntityMapping>,
}

impl DomainStore {
    pub fn hydrate(persistence: Persistence, keys: StorageKeys) -> Self {
        let mut store = Self {
            persistence,
            keys,
            entities: Vec::new(),
            members: Vec::new(),
            mappings: Vec::new(),
        };
        store.reload();
        store
    }

    pub fn reload(&mut self) {
        self.entities = self.persistence.load_records(&self.keys.entities);
        self.members = self.persistence.load_records(&self.keys.family_members);
        self.mappings = self.persistence.load_records(&self.keys.entity_mappings);
        info!(
            target: "fincent",
            event = "store_hydrated",
            entities = self.entities.len(),
            members = self.members.len(),
            mappings = self.mappings.len()
        );
    }

    /// Writes every collection. Returns `false` if any write failed; the
    /// in-memory state is kept either way.
    pub fn flush(&self) -> bool {
        let entities = self.persistence.save(&self.keys.entities, &self.entities);
        let members = self.persistence.save(&self.keys.family_members, &self.members);
        let mappings = self
            .persistence
            .save(&self.keys.entity_mappings, &self.mappings);
        debug!(
            target: "fincent",
            event = "store_flushed",
            entities,
            members,
            mappings
        );
        entities && members && mappings
    }

    /// Re-reads the collection stored under `key` after another writer
    /// changed it. Unrelated keys are ignored.
    pub fn apply_storage_change(&mut self, key: &str) -> Option<Collection> {
        let collection = self.collection_for_key(key)?;
        match collection {
            Collection::Entities => {
                self.entities = self.persistence.load_records(&self.keys.entities)
            }
            Collection::FamilyMembers => {
                self.members = self.persistence.load_records(&self.keys.family_members)
            }
            Collection::EntityMappings => {
                self.mappings = self.persistence.load_records(&self.keys.entity_mappings)
            }
        }
        info!(target: "fincent", event = "store_reloaded_key", key);
        Some(collection)
    }

    pub fn collection_for_key(&self, key: &str) -> Option<Collection> {
        if key == self.keys.entities {
            Some(Collection::Entities)
        } else if key == self.keys.family_members {
            Some(Collection::FamilyMembers)
        } else if key == self.keys.entity_mappings {
            Some(Collection::EntityMappings)
        } else {
            None
        }
    }

    pub fn keys(&self) -> &StorageKeys {
        &self.keys
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            entities: self.entities.clone(),
            family_members: self.members.clone(),
            entity_mappings: self.mappings.clone(),
        }
    }

    // Entities

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.iter().find(|entity| entity.id == id)
    }

    pub fn entity_mut(&mut self, id: &str) -> Option<&mut Entity> {
        self.entities.iter_mut().find(|entity| entity.id == id)
    }

    pub fn insert_entity(&mut self, entity: Entity) {
        self.entities.push(entity);
    }

    pub fn remove_entity(&mut self, id: &str) -> Option<Entity> {
        let index = self.entities.iter().position(|entity| entity.id == id)?;
        Some(self.entities.remove(index))
    }

    // Members

    pub fn members(&self) -> &[FamilyMember] {
        &self.members
    }

    pub fn member(&self, id: &str) -> Option<&FamilyMember> {
        self.members.iter().find(|member| member.id == id)
    }

    pub fn member_mut(&mut self, id: &str) -> Option<&mut FamilyMember> {
        self.members.iter_mut().find(|member| member.id == id)
    }

    pub fn insert_member(&mut self, member: FamilyMember) {
        self.members.push(member);
    }

    pub fn remove_member(&mut self, id: &str) -> Option<FamilyMember> {
        let index = self.members.iter().position(|member| member.id == id)?;
        Some(self.members.remove(index))
    }

    // Mappings

    pub fn mappings(&self) -> &[EntityMapping] {
        &self.mappings
    }

    pub fn mapping_for_entity(&self, entity_id: &str) -> Option<&EntityMapping> {
        self.mappings
            .iter()
            .find(|mapping| mapping.entity_id == entity_id)
    }

    pub fn mappings_referencing<'a>(
        &'a self,
        member_id: &'a str,
    ) -> impl Iterator<Item = &'a EntityMapping> + 'a {
        self.mappings
            .iter()
            .filter(move |mapping| mapping.references(member_id))
    }

    pub fn is_entity_mapped(&self, entity_id: &str) -> bool {
        self.mapping_for_entity(entity_id).is_some()
    }

    /// Stores `mapping` as the single mapping of its entity, replacing any
    /// earlier one in place.
    pub fn upsert_mapping(&mut self, mapping: EntityMapping) {
        let entity_id = mapping.entity_id.clone();
        match self
            .mappings
            .iter()
            .position(|existing| existing.entity_id == entity_id)
        {
            Some(index) => {
                self.mappings[index] = mapping;
                let mut seen = false;
                self.mappings.retain(|existing| {
                    if existing.entity_id != entity_id {
                        return true;
                    }
                    let keep = !seen;
                    seen = true;
                    keep
                });
            }
            None => self.mappings.push(mapping),
        }
    }

    pub fn remove_mapping(&mut self, id: &str) -> Option<EntityMapping> {
        let index = self.mappings.iter().position(|mapping| mapping.id == id)?;
        Some(self.mappings.remove(index))
    }

    pub fn remove_mappings_for_entity(&mut self, entity_id: &str) -> usize {
        let before = self.mappings.len();
        self.mappings
            .retain(|mapping| mapping.entity_id != entity_id);
        before - self.mappings.len()
    }

    /// Drops `member_id` from every mapping and returns how many mappings
    /// changed. Mappings left empty are kept.
    pub fn strip_member_from_mappings(&mut self, member_id: &str) -> usize {
        let mut touched = 0;
        for mapping in &mut self.mappings {
            let before = mapping.member_ids.len();
            mapping.member_ids.retain(|id| id != member_id);
            if mapping.member_ids.len() != before {
                touched += 1;
            }
        }
        touched
    }

    pub fn remove_empty_mappings(&mut self) -> usize {
        let before = self.mappings.len();
        self.mappings.retain(|mapping| !mapping.member_ids.is_empty());
        before - self.mappings.len()
    }
}
