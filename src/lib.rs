//! Entities, family members and the mappings between them, with PAN-driven
//! reconciliation and pluggable key/value persistence.

pub mod commands_family;
pub mod config;
pub mod entity_type;
pub mod error;
pub mod family_logging;
pub mod id;
pub mod logging;
pub mod model_family;
pub mod persistence;
pub mod reconcile;
pub mod storage;
pub mod store;
pub mod summary;
pub mod time;
pub mod validation;

pub use commands_family::{Applied, FamilyService, RefreshListener};
pub use config::AppConfig;
pub use entity_type::EntityType;
pub use error::{AppError, AppResult};
pub use logging::init_logging;
pub use model_family::{Entity, EntityInput, EntityMapping, FamilyMember, MemberInput};
