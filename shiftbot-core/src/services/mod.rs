// File: shiftbot-core/src/services/mod.rs

pub mod command_service;
pub mod reconciliation;
pub mod render;

pub use command_service::{ManualCommand, ManualCommandHandler};
pub use reconciliation::{CycleReport, ReconciliationEngine};
