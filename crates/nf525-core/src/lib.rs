//! # nf525-core
//!
//! The trust seams of the fiscal integrity chain.
//!
//! This crate provides the two collaborator traits the chain crates are
//! written against:
//! - `ChainStore`: ordered reads and guarded appends for one family
//! - `Clock`: the source of the ISO-8601 stamps fed into hashes
//!
//! ## Usage
//!
//! ```rust,ignore
//! use nf525_core::traits::{ChainStore, Clock, SystemClock};
//! ```

pub mod traits;

pub use traits::{ChainStore, Clock, SystemClock};
