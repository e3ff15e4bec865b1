//! Mock platform implementation for testing and development.
//!
//! This module provides a simulated host system that can be controlled
//! programmatically without requiring a Bluetooth adapter.

pub mod platform;

pub use platform::{MockPlatform, MockPlatformHandle};
