//! Domain models for the EV Service Center Platform
//!
//! The backend works directly on the shared crate's models and request types

pub use shared::models::*;
