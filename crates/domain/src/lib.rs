//! Domain entities, the differ and the audit history model.

#![forbid(unsafe_code)]

mod audit;
mod dashboard;
mod dataset;
mod entity;
mod homepage;
mod topic_area;

pub use audit::{
    AuditEventKind, AuditLogEntry, AuditLogEntryInput, BOOKKEEPING_PROPERTIES, HistoryLabel,
    OrderingKey, PropertyChange, STATE_PROPERTY, diff, diff_properties,
};
pub use dashboard::{Dashboard, DashboardState};
pub use dataset::{DataClassification, Dataset, DatasetStorageKeys};
pub use entity::{AuditedEntity, EntityKey, EntityType, EntityVariant};
pub use homepage::Homepage;
pub use topic_area::TopicArea;
