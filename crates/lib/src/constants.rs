//! Constants used throughout the collection library.
//!
//! This module provides central definitions for size limits and default
//! classes. The values can be overridden per collection through
//! [`Config`](crate::Config).

/// Largest payload, in bytes, a single item may carry.
pub const MAX_DATA: usize = 65535;

/// Class assigned to a free-form collection.
pub const CLASS_DEFAULT: u32 = 0;

/// Number of ancestor frames an iterator reserves at a time.
pub const STACK_DEPTH_BLOCK: usize = 15;
