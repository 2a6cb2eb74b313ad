//! Domain models for the EV Service Center Platform

mod catalog;
mod checklist;
mod inventory;
mod transfer;
mod user;

pub use catalog::*;
pub use checklist::*;
pub use inventory::*;
pub use transfer::*;
pub use user::*;
