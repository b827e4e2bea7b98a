//! Fast mutex over a shared key/value store
//!
//! This module provides:
//! - Lock statistics and acquisition states
//! - The lock coordinator (`FastMutex`) and its builder

mod model;
mod mutex;

pub use model::*;
pub use mutex::*;
