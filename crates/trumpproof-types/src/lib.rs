//! TrumpProof Types - Canonical types for the receipts-native kernel
//!
//! This crate contains the foundational types shared by every TrumpProof
//! crate, with zero dependencies on other trumpproof crates:
//!
//! - Receipt types and the receipt wire format
//! - Governance domains
//! - Cycle identity, state and stoprule severity
//!
//! # Invariants
//!
//! 1. No receipt, no fact: every observed fact enters the system as a receipt
//! 2. Receipts are write-once; no field is mutated after append
//! 3. Every receipt belongs to exactly one producing domain

pub mod cycle;
pub mod domain;
pub mod error;
pub mod identity;
pub mod receipt;

pub use cycle::*;
pub use domain::*;
pub use error::*;
pub use identity::*;
pub use receipt::*;

/// Tenant identifier stamped on every receipt
pub const TENANT_ID: &str = "trumpproof";

/// Version of the receipt wire format
pub const WIRE_VERSION: &str = "1.0.0";
