//! # Config - engine tuning knobs
//!
//! Sizing parameters for the buffers a document set allocates. Every value
//! has a default and can be overridden from the environment:
//!
//! | variable                  | field                    | default  |
//! |---------------------------|--------------------------|----------|
//! | `SUCCINCT_BLOCK_CAPACITY` | `initial_block_capacity` | 1024     |
//! | `SUCCINCT_MAX_GROWTH`     | `max_growth`             | 16384    |
//! | `SUCCINCT_ENUM_CAPACITY`  | `enum_capacity`          | 1024     |
//!
//! Unset or unparsable variables fall back to the default.

use buffer::{DEFAULT_CAPACITY, DEFAULT_MAX_GROWTH};

pub const BLOCK_CAPACITY_VAR: &str = "SUCCINCT_BLOCK_CAPACITY";
pub const MAX_GROWTH_VAR: &str = "SUCCINCT_MAX_GROWTH";
pub const ENUM_CAPACITY_VAR: &str = "SUCCINCT_ENUM_CAPACITY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Starting capacity of each block content buffer, in bytes.
    pub initial_block_capacity: usize,
    /// Largest single growth step of any buffer, in bytes.
    pub max_growth: usize,
    /// Starting capacity of each frozen enum table, in bytes.
    pub enum_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_block_capacity: DEFAULT_CAPACITY,
            max_growth: DEFAULT_MAX_GROWTH,
            enum_capacity: DEFAULT_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let d = Self::default();
        Self {
            initial_block_capacity: size_or(&lookup, BLOCK_CAPACITY_VAR, d.initial_block_capacity),
            max_growth: size_or(&lookup, MAX_GROWTH_VAR, d.max_growth).max(1),
            enum_capacity: size_or(&lookup, ENUM_CAPACITY_VAR, d.enum_capacity),
        }
    }
}

fn size_or<F>(lookup: &F, key: &str, default: usize) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, default, "ignoring unparsable size setting");
            default
        }),
    }
}
