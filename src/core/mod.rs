pub mod balance;
pub mod errors;
pub mod models;
pub mod money;
pub mod payments;
pub mod periods;
pub mod services;
pub mod settlement;
pub mod splits;
