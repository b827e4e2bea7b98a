//! fastmutex Harness - Contention harness for the fast mutex
//!
//! This crate provides:
//! - Layered configuration (file, environment, command line)
//! - Logging and Prometheus metrics setup
//! - In-process races and multi-process runs over a shared store

pub mod config;
pub mod harness;
pub mod metrics;
pub mod startup;
