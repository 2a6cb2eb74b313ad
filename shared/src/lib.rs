//! Shared types and domain rules for the EV Service Center Platform
//!
//! This crate contains the models, state machines and stock planning shared
//! between the backend and the browser-side helpers (via WASM). Nothing in here
//! performs I/O.

pub mod error;
pub mod models;
pub mod stock;
pub mod types;
pub mod validation;

pub use error::*;
pub use models::*;
pub use stock::*;
pub use types::*;
pub use validation::*;
