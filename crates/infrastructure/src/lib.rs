//! Infrastructure adapters for the audit log repository port.

#![forbid(unsafe_code)]

mod in_memory_audit_log_repository;
mod postgres_audit_log_repository;

pub use in_memory_audit_log_repository::InMemoryAuditLogRepository;
pub use postgres_audit_log_repository::{AuditTableName, PostgresAuditLogRepository};
