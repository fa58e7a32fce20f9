//! Readmit Server Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! HTTP API over the readmission warehouse.
//!
//! # Overview
//!
//! - **Uploads**: CSV files run through the shared [`readmit_etl::Pipeline`]
//! - **Patients**: warehouse rows decoded through the schema registry
//! - **Predictions**: readmission class and probability from a model
//!   service, logged to `prediction_log`
//! - **Care plans**: narrative plans in seven languages, spoken, rendered
//!   to a paginated document and mailed
//!
//! # Architecture
//!
//! Features are vertical slices under [`features`], each with commands,
//! queries and routes. External collaborators sit behind the traits in
//! [`services`] and are shared through [`state::AppState`].
//!
//! Every API route requires an `x-user-id` header set by the identity
//! provider in front of the server; care plans are stored per caller.

pub mod api;
pub mod care_plan;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod middleware;
pub mod patient;
pub mod services;
pub mod state;

pub use config::Config;
pub use error::{ApiResult, AppError};
pub use state::AppState;
