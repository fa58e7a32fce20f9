//! Feature modules implementing the readmit API
//!
//! Each feature is a vertical slice with its own commands, queries and
//! routes.
//!
//! # Features
//!
//! - **uploads**: CSV files through the ETL pipeline into the warehouse
//! - **patients**: Warehouse records with their risk category
//! - **predictions**: Readmission predictions, their log and analytics
//! - **care_plans**: Generated care plans, spoken, rendered and mailed
//! - **notifications**: Feed of care-plan emails
//!
//! # Architecture
//!
//! - `commands/` - Write operations and collaborator calls
//! - `queries/` - Read operations
//! - `routes.rs` - HTTP route definitions
//!
//! Every route requires the `x-user-id` header (see
//! [`CurrentUser`](crate::middleware::CurrentUser)).

pub mod care_plans;
pub mod notifications;
pub mod patients;
pub mod predictions;
pub mod shared;
pub mod uploads;

use axum::Router;

use crate::state::AppState;

/// Creates the API router with all feature routes mounted
///
/// - `/uploads` - CSV uploads
/// - `/patients` - Patient records
/// - `/predictions` - Predictions and analytics
/// - `/care-plans` - Care plans
/// - `/notifications` - Email feed
pub fn router(state: AppState) -> Router<()> {
    Router::new()
        .nest("/uploads", uploads::uploads_routes())
        .nest("/patients", patients::patients_routes())
        .nest("/predictions", predictions::predictions_routes())
        .nest("/care-plans", care_plans::care_plans_routes())
        .nest("/notifications", notifications::notifications_routes())
        .with_state(state)
}
