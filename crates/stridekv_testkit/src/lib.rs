//! # StrideKV Testkit
//!
//! Test utilities for StrideKV.
//!
//! This crate provides:
//! - Test fixtures and database helpers
//! - Owned-result wrappers around the batch API
//! - Property-based test generators using proptest
//! - An ordered reference model for differential tests
//! - Stress testing utilities
//!
//! ## Usage
//!
//! ```rust
//! use stridekv_testkit::prelude::*;
//! use stridekv_core::DEFAULT_COLLECTION;
//!
//! with_temp_db(|db| {
//!     put_all(db, DEFAULT_COLLECTION, &[(1, b"one"), (2, b"two")]);
//!     assert_eq!(scan_keys(db, DEFAULT_COLLECTION, 0, 10), vec![1, 2]);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod model;
pub mod ops;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::model::*;
    pub use crate::ops::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use model::*;
pub use ops::*;
pub use stress::*;
