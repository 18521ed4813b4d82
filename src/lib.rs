//! envboot - cached CI environment bootstrap
//!
//! Brings a persistent interpreter cache up to a declared environment,
//! creating only what is missing, then runs the test suite under a virtual
//! display with a hard timeout.

pub mod cache;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod pipeline;
pub mod plan;
pub mod runner;
pub mod toolchain;
pub mod ui;

pub use error::{EnvbootError, EnvbootResult};
