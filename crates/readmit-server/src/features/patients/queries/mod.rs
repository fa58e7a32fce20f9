pub mod get;
pub mod list;

pub use get::GetPatientQuery;
pub use list::ListPatientsQuery;
