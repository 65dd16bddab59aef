pub mod audit;
pub mod availability;
pub mod booking;
pub mod clock;
pub mod config;
pub mod escalation;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod store;
pub mod tenant;
pub mod wal;
