pub mod config;
pub mod database;
pub mod error;
pub mod notification;
pub mod payment;
pub mod processor;
pub mod receipt;

#[cfg(feature = "sled-db")]
pub mod trigger;
