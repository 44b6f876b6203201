//! convertd - hinge angle, device mode and screen orientation for
//! convertible laptops with one accelerometer in the base and one in the lid
//!
//! ## Features
//!
//! - `mock`: Simulated hinge for hardware-free runs

pub mod config;
pub mod core;
pub mod devices;
pub mod error;
pub mod fusion;
pub mod streaming;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
