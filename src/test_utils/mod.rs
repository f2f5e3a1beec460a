//! Test utilities.
//!
//! This module provides:
//! - Test data factories for creating valid test fixtures
//! - In-memory implementations of the persistence, user and mail ports

mod factories;
mod mocks;

pub use factories::*;
pub use mocks::*;
