//! Readmission predictions and their log

pub mod commands;
pub mod queries;
pub mod routes;

pub use commands::{PredictReadmissionCommand, PredictReadmissionResponse};
pub use routes::predictions_routes;
