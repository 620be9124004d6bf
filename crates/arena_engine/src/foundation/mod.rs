//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - 2D math types and operations
//! - Handle-based collections
//! - Time management

pub mod collections;
pub mod math;
pub mod time;
