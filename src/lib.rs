pub mod calendar;
pub mod compactor;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod policy;
pub mod protocol;
pub mod store;
pub mod wal;
