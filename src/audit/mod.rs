//! Tamper-evident audit trail
//!
//! - **entry**: `AuditEntry` and its chained hash
//! - **chain**: per-scope append, linkage validation, integrity checks
//! - **store**: `AuditStore` trait with in-memory and JSONL backends
//! - **forward**: non-critical delivery to external sinks

pub mod chain;
pub mod entry;
pub mod forward;
pub mod store;

pub use chain::{validate_chain, verify_integrity, AuditChain, ChainValidation};
pub use entry::{details_hash, AuditEntry, NewAuditEntry};
pub use forward::{AuditForwarder, AuditSink, MemoryAuditSink};
pub use store::{AuditStore, JsonlAuditStore, MemoryAuditStore};
