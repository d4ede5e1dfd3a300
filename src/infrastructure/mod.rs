pub mod cache;
pub mod notifications;
pub mod schema;
pub mod storage;
pub mod store;
