// src/lib.rs

pub mod feed;
pub mod repositories;
pub mod routing;
pub mod services;
pub mod tasks;
pub mod platforms;
pub mod test_utils;

pub use shiftbot_common::error::{Error, Severity};
