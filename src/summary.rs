//! Read models derived from the store for list screens and the PAN status
//! report.

use serde::Serialize;
use ts_rs::TS;

use crate::{
    entity_type::EntityType,
    model_family::{Entity, FamilyMember},
    store::DomainStore,
    time::current_year,
    validation::age_in_year,
};

pub const PAN_NOT_PROVIDED: &str = "Not Provided";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct EntitySummary {
    pub total: usize,
    pub individual: usize,
    pub spouse: usize,
    pub family: usize,
    pub huf: usize,
    pub joint: usize,
    pub business: usize,
}

impl EntitySummary {
    pub fn count(&self, entity_type: EntityType) -> usize {
        match entity_type {
            EntityType::Individual => self.individual,
            EntityType::Spouse => self.spouse,
            EntityType::Family => self.family,
            EntityType::Huf => self.huf,
            EntityType::Joint => self.joint,
            EntityType::Business => self.business,
        }
    }
}

pub fn entity_summary(entities: &[Entity]) -> EntitySummary {
    let mut summary = EntitySummary {
        total: entities.len(),
        ..EntitySummary::default()
    };
    for entity in entities {
        let slot = match entity.entity_type {
            EntityType::Individual => &mut summary.individual,
            EntityType::Spouse => &mut summary.spouse,
            EntityType::Family => &mut summary.family,
            EntityType::Huf => &mut summary.huf,
            EntityType::Joint => &mut summary.joint,
            EntityType::Business => &mut summary.business,
        };
        *slot += 1;
    }
    summary
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct FamilySummary {
    pub total: usize,
    pub with_pan: usize,
    pub huf: usize,
    pub active: usize,
}

pub fn family_summary(members: &[FamilyMember]) -> FamilySummary {
    FamilySummary {
        total: members.len(),
        with_pan: members.iter().filter(|m| m.has_pan()).count(),
        huf: members.iter().filter(|m| m.is_huf).count(),
        active: members.iter().filter(|m| m.active).count(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum RecordKind {
    Entity,
    Member,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub enum PanStatus {
    Submitted,
    Pending,
}

impl PanStatus {
    fn of(pan: Option<&str>) -> Self {
        if pan.is_some() {
            PanStatus::Submitted
        } else {
            PanStatus::Pending
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct PanStatusRow {
    pub kind: RecordKind,
    pub name: String,
    pub details: String,
    pub pan: String,
    pub status: PanStatus,
}

/// Entities first, then members, each in stored order.
pub fn pan_status(store: &DomainStore) -> Vec<PanStatusRow> {
    let entities = store.entities().iter().map(|entity| PanStatusRow {
        kind: RecordKind::Entity,
        name: entity.name.clone(),
        details: entity.entity_type.label().to_string(),
        pan: entity.pan.clone().unwrap_or_else(|| PAN_NOT_PROVIDED.into()),
        status: PanStatus::of(entity.pan.as_deref()),
    });
    let members = store.members().iter().map(|member| PanStatusRow {
        kind: RecordKind::Member,
        name: member.name.clone(),
        details: member.relationship.clone(),
        pan: member.pan.clone().unwrap_or_else(|| PAN_NOT_PROVIDED.into()),
        status: PanStatus::of(member.pan.as_deref()),
    });
    entities.chain(members).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRow {
    pub id: String,
    pub icon: &'static str,
    pub name: String,
    pub type_label: &'static str,
    pub member_count: usize,
    pub pan: Option<String>,
    pub accepts_manual_members: bool,
}

pub fn entity_rows(store: &DomainStore) -> Vec<EntityRow> {
    store
        .entities()
        .iter()
        .map(|entity| EntityRow {
            id: entity.id.clone(),
            icon: entity.entity_type.icon(),
            name: entity.name.clone(),
            type_label: entity.entity_type.label(),
            member_count: store
                .mapping_for_entity(&entity.id)
                .map(|mapping| mapping.member_ids.len())
                .unwrap_or(0),
            pan: entity.pan.clone(),
            accepts_manual_members: entity.entity_type.accepts_manual_members(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberRow {
    pub id: String,
    pub name: String,
    pub relationship: String,
    pub age: Option<i32>,
    pub pan: Option<String>,
    pub active: bool,
}

pub fn member_rows(store: &DomainStore) -> Vec<MemberRow> {
    let year = current_year();
    store
        .members()
        .iter()
        .map(|member| MemberRow {
            id: member.id.clone(),
            name: member.name.clone(),
            relationship: member.relationship.clone(),
            age: member
                .dob
                .as_deref()
                .and_then(|dob| age_in_year(dob, year)),
            pan: member.pan.clone(),
            active: member.active,
        })
        .collect()
}
