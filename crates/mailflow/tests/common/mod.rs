//! Shared test utilities for mailflow integration tests.
//!
//! This module provides:
//! - `AutomationHarness`, an automation instance over an in-memory store
//!   with a manual clock
//! - Test doubles for the mailer and classifier capabilities
//! - Builders for incoming emails and configs

pub mod builders;
pub mod doubles;
pub mod harness;

pub use builders::*;
pub use doubles::*;
pub use harness::AutomationHarness;
