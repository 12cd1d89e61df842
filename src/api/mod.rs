//! HTTP API layer

pub mod books;
pub mod health;
pub mod loans;
pub mod members;
pub mod metrics;
pub mod openapi;
