//! # ExamVault Testkit
//!
//! Test utilities for ExamVault.
//!
//! This crate provides:
//! - Temporary stores and vaults wired to scripted secret sources
//! - Builders for legacy plaintext databases to migrate from
//! - Raw-byte inspection of store files
//! - Log capture for checking what reaches the tracing output
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use examvault_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_store() {
//!     with_temp_store(|store| {
//!         let vault = store.create(SCENARIO_SECRET);
//!         insert_patient(&vault, PATIENT_NAME);
//!         assert!(!store.raw_contains(PATIENT_NAME));
//!     });
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod logs;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::logs::*;
    pub use examvault_core::*;
}

pub use fixtures::*;
pub use generators::*;
pub use logs::*;
