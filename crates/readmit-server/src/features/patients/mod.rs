//! Patient records from the warehouse

pub mod queries;
pub mod routes;

pub use queries::{GetPatientQuery, ListPatientsQuery};
pub use routes::patients_routes;
