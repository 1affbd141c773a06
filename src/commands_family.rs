use std::sync::Arc;

use serde_json::json;

use crate::{
    config::AppConfig,
    family_logging::{Area, LogScope},
    model_family::{
        Entity, EntityInput, EntityMapping, FamilyMember, MemberInput, PERSIST_WRITE_FAILED,
    },
    persistence::Persistence,
    reconcile::{
        self, EntityChange, EntityRemoval, MemberChange, MemberRemoval, ReconcilePolicy,
    },
    storage::open_backend,
    store::{DomainStore, Snapshot},
    AppError, AppResult,
};

/// Receives the full collections after every committed change.
pub trait RefreshListener: Send + Sync {
    fn on_refresh(&self, snapshot: &Snapshot);
}

/// Result of a committed mutation. `persisted == false` means storage
/// rejected the write and the in-memory state is ahead of it until the next
/// successful flush.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied<T> {
    pub value: T,
    pub persisted: bool,
}

impl<T> Applied<T> {
    /// Turns an unpersisted result into a `PERSIST/WRITE_FAILED` error for
    /// callers that treat it as fatal.
    pub fn require_persisted(self) -> AppResult<T> {
        if self.persisted {
            Ok(self.value)
        } else {
            Err(AppError::new(
                PERSIST_WRITE_FAILED,
                "Changes were applied but could not be saved. They will be saved with the next change.",
            ))
        }
    }
}

/// The operations offered to the presentation layer.
pub struct FamilyService {
    store: DomainStore,
    policy: ReconcilePolicy,
    listeners: Vec<Arc<dyn RefreshListener>>,
}

impl FamilyService {
    pub fn new(store: DomainStore, policy: ReconcilePolicy) -> Self {
        Self {
            store,
            policy,
            listeners: Vec::new(),
        }
    }

    /// Opens the configured backend, hydrates the store and seeds the
    /// configured default entity if the store has none.
    pub fn open(config: &AppConfig) -> AppResult<Self> {
        let data_dir = config.data_dir();
        let backend = open_backend(config.backend, &data_dir, config.quota_bytes)?;
        let store = DomainStore::hydrate(Persistence::new(backend), config.keys.clone());
        let mut service = Self::new(store, config.policy);

        if let Some(default) = &config.default_entity {
            let scope = LogScope::new("entity_seed_default", Area::Entities, None);
            if let Some(entity) =
                reconcile::seed_default_entity(&mut service.store, &default.name, default.entity_type)
            {
                let persisted = service.store.flush();
                scope.success(
                    Some(&entity.id),
                    json!({ "type": entity.entity_type.as_str(), "persisted": persisted }),
                );
            }
        }
        Ok(service)
    }

    pub fn subscribe(&mut self, listener: Arc<dyn RefreshListener>) {
        self.listeners.push(listener);
    }

    pub fn store(&self) -> &DomainStore {
        &self.store
    }

    pub fn policy(&self) -> ReconcilePolicy {
        self.policy
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    pub fn list_entities(&self) -> &[Entity] {
        self.store.entities()
    }

    pub fn list_members(&self) -> &[FamilyMember] {
        self.store.members()
    }

    pub fn list_mappings_for(&self, entity_id: &str) -> Vec<&EntityMapping> {
        self.store
            .mappings()
            .iter()
            .filter(|mapping| mapping.entity_id == entity_id)
            .collect()
    }

    pub fn members_of(&self, entity_id: &str) -> Vec<&FamilyMember> {
        reconcile::mapped_members(&self.store, entity_id)
    }

    pub fn create_or_update_member(
        &mut self,
        member_id: Option<&str>,
        input: &MemberInput,
    ) -> AppResult<Applied<MemberChange>> {
        let cmd = if member_id.is_some() {
            "member_update"
        } else {
            "member_create"
        };
        let scope = LogScope::new(cmd, Area::Family, member_id);
        match reconcile::create_or_update_member(&mut self.store, member_id, input) {
            Ok(change) => {
                scope.success(
                    Some(&change.member.id),
                    json!({ "pan_link": change.pan_link }),
                );
                Ok(self.commit(change, &scope))
            }
            Err(err) => {
                scope.fail(&err);
                Err(err)
            }
        }
    }

    pub fn delete_member(&mut self, member_id: &str) -> AppResult<Applied<MemberRemoval>> {
        let scope = LogScope::new("member_delete", Area::Family, Some(member_id));
        match reconcile::delete_member(&mut self.store, member_id, self.policy) {
            Ok(removal) => {
                scope.success(
                    None,
                    json!({
                        "mappings_touched": removal.mappings_touched,
                        "mappings_pruned": removal.mappings_pruned,
                    }),
                );
                Ok(self.commit(removal, &scope))
            }
            Err(err) => {
                scope.fail(&err);
                Err(err)
            }
        }
    }

    pub fn create_or_update_entity(
        &mut self,
        entity_id: Option<&str>,
        input: &EntityInput,
        selected_member_ids: &[String],
    ) -> AppResult<Applied<EntityChange>> {
        let cmd = if entity_id.is_some() {
            "entity_update"
        } else {
            "entity_create"
        };
        let scope = LogScope::new(cmd, Area::Entities, entity_id);
        match reconcile::create_or_update_entity(
            &mut self.store,
            entity_id,
            input,
            selected_member_ids,
        ) {
            Ok(change) => {
                scope.success(
                    Some(&change.entity.id),
                    json!({
                        "type": change.entity.entity_type.as_str(),
                        "members": change.mapping.as_ref().map(|m| m.member_ids.len()).unwrap_or(0),
                    }),
                );
                Ok(self.commit(change, &scope))
            }
            Err(err) => {
                scope.fail(&err);
                Err(err)
            }
        }
    }

    pub fn delete_entity(&mut self, entity_id: &str) -> AppResult<Applied<EntityRemoval>> {
        let scope = LogScope::new("entity_delete", Area::Entities, Some(entity_id));
        match reconcile::delete_entity(&mut self.store, entity_id) {
            Ok(removal) => {
                scope.success(None, json!({ "mappings_removed": removal.mappings_removed }));
                Ok(self.commit(removal, &scope))
            }
            Err(err) => {
                scope.fail(&err);
                Err(err)
            }
        }
    }

    /// Reloads after another writer changed `key` and notifies listeners.
    /// Returns `false` for keys this store does not own.
    pub fn storage_changed(&mut self, key: &str) -> bool {
        match self.store.apply_storage_change(key) {
            Some(_) => {
                self.notify();
                true
            }
            None => false,
        }
    }

    fn commit<T>(&mut self, value: T, scope: &LogScope) -> Applied<T> {
        let persisted = self.store.flush();
        if !persisted {
            scope.warn(json!({
                "code": PERSIST_WRITE_FAILED,
                "message": "in-memory state is ahead of storage",
            }));
        }
        self.notify();
        Applied { value, persisted }
    }

    fn notify(&self) {
        if self.listeners.is_empty() {
            return;
        }
        let snapshot = self.store.snapshot();
        for listener in &self.listeners {
            listener.on_refresh(&snapshot);
        }
    }
}
