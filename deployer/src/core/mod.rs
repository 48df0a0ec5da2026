//! Deterministic, pure logic shared by the deployer.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod confirmation;
pub mod platform;
pub mod repo;
pub mod report;
pub mod service_url;
pub mod session;
pub mod types;
