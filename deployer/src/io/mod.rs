//! I/O adapters for deployer operations.

pub mod adk;
pub mod config;
pub mod discovery;
pub mod git;
pub mod process;
pub mod pytest;
pub mod scratch;
