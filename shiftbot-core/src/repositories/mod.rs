// File: shiftbot-core/src/repositories/mod.rs

pub mod file;
pub mod memory;

pub use file::JsonFileHistoryStore;
pub use memory::MemoryHistoryStore;
