//! Shared entity types for the parley persistence layer.

pub mod models;
pub mod patch;
