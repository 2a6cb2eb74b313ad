//! Business logic services for the EV Service Center Platform

pub mod catalog;
pub mod checklist;
pub mod inventory;
pub mod transfer;

pub use catalog::CatalogService;
pub use checklist::ChecklistService;
pub use inventory::InventoryService;
pub use transfer::TransferService;
