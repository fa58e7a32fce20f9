pub mod recent;

pub use recent::RecentNotificationsQuery;
