//! Feed of care-plan emails sent from the API

pub mod queries;
pub mod routes;

pub use queries::RecentNotificationsQuery;
pub use routes::notifications_routes;
