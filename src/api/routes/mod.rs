//! Route handlers

pub mod health;
pub mod telemetry;
pub mod users;
