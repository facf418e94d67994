//! # nf525-contracts
//!
//! Shared types and encoding contracts for the NF525 fiscal integrity chain.
//!
//! All crates in the workspace import from here.  No hashing or storage
//! lives in this crate, only the event shapes, the canonical field
//! encoding each family hashes, the verification report, and the error
//! type.

pub mod canonical;
pub mod error;
pub mod event;
pub mod report;

pub use error::{ChainError, ChainResult};
pub use event::{AuditEvent, ChainFamily, ChainRecord, ClosureEvent, SaleEvent};
pub use report::{BreakKind, IntegrityReport};
