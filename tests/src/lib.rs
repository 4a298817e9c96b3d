//! Shared helpers for the cross-crate tests.

pub mod mocks;
pub mod setup;
