//! Shared utilities for feature modules
//!
//! - **validation**: input validation used by commands and queries

pub mod validation;

pub use validation::{validate_email, validate_subject_id, EmailValidationError};
