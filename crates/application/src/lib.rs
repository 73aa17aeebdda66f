//! Change-data-capture audit pipeline: codec, factory, ports and stream processor.

#![forbid(unsafe_code)]

mod audit_log_factory;
mod audit_log_ports;
mod change_feed;
pub mod entity_codec;
mod stream_processor;

pub use audit_log_factory::{AuditLogFactory, Tiebreaker};
pub use audit_log_ports::{AppendOutcome, AuditLogRepository};
pub use change_feed::{
    AttributeValue, ChangeBatch, ChangeRecord, DISCRIMINATOR_ATTRIBUTE, FeedEventName,
    PARTITION_KEY_ATTRIBUTE, Row, SORT_KEY_ATTRIBUTE, StreamRecord,
};
pub use stream_processor::{
    BatchReport, BatchSummary, DEFAULT_MAX_CONCURRENCY, DiscardReason, RecordOutcome,
    RecordReport, StreamProcessor,
};
