//! # nf525-chain
//!
//! SHA-256 hash chains for the three NF525 event families: sales, daily
//! closures and audit-log entries.
//!
//! ## Overview
//!
//! Every record stores the hash of its own canonical fields chained onto
//! the previous record's hash.  Editing any historical record breaks the
//! chain from that point on, and `verify_chain` reports the first break.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nf525_chain::{ChainWriter, InMemoryChainStore, ScanControl};
//! use nf525_contracts::SaleEvent;
//!
//! let writer = ChainWriter::new(InMemoryChainStore::<SaleEvent>::new());
//! writer.append(SaleEvent::new("T-001", "2024-01-15T10:00:00.000Z", 20.0))?;
//!
//! let report = writer.verify::<SaleEvent>(&ScanControl::new())?;
//! assert!(report.valid);
//! ```

pub mod chain;
pub mod file;
pub mod memory;
pub mod verify;
pub mod writer;

pub use chain::{
    compute_audit_hash, compute_closure_hash, compute_sale_hash, hash_record, seal, sha256_hex,
};
pub use file::JsonFileStore;
pub use memory::InMemoryChainStore;
pub use verify::{verify_chain, verify_store, ScanControl};
pub use writer::ChainWriter;

// ── Tests ─────────────────────────────────────────────────────────────────────
