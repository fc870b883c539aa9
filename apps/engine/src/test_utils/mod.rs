//! Test utilities for unit and use case tests.
//!
//! This module provides:
//! - Test data factories for creating valid test fixtures
//! - In-memory implementations of the repository and port traits

mod billing_mocks;
mod factories;

pub use billing_mocks::*;
pub use factories::*;
