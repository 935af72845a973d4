//! Shared test utilities for billmail integration tests.
//!
//! This module provides:
//! - `TestHarness` running the orchestrator over an in-memory store
//! - Fakes for the analyzer, the mail transport and a failing store
//! - Builders for raw emails, PDFs, images and ZIP archives

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::*;
