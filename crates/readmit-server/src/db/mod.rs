//! Database access for the API
//!
//! - [`patients`]: reads from the warehouse table the pipeline loads
//! - [`predictions`]: the prediction log and its analytics
//! - [`notifications`]: record of care-plan emails

use sqlx::PgPool;
use thiserror::Error;

pub mod notifications;
pub mod patients;
pub mod predictions;

/// Database operation errors with contextual information
#[derive(Error, Debug)]
pub enum DbError {
    /// SQL query or connection error
    #[error("Database query failed: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// The configured warehouse table name cannot be used in a query
    #[error("Invalid warehouse table: {0}")]
    InvalidTable(String),
}

pub type DbResult<T> = Result<T, DbError>;

pub async fn health_check(pool: &PgPool) -> DbResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map(|_| ())
        .map_err(DbError::from)
}
