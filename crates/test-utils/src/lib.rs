//! Shared test utilities for heliowatch crates.
//!
//! This crate provides common test helpers to reduce boilerplate across test modules:
//!
//! - [`assert_eventually`] - Poll a condition until it's true or timeout
//! - [`fixtures`] - Ready-made drafts and records, and ledger seeding
//! - [`strategies`] - Proptest generators for drafts, records and their fields

#![deny(unsafe_code)]
// Test utilities are allowed to use unwrap for simplicity
#![allow(clippy::unwrap_used, clippy::expect_used)]

mod assertions;
pub use assertions::assert_eventually;

pub mod fixtures;
pub mod strategies;
