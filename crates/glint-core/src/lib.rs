//! glint core
//!
//! Shared building blocks for the glint renderer crates: logging setup,
//! profiling scopes, generational slot storage and integer geometry.

pub mod alloc;
pub mod geometry;
pub mod logging;
pub mod profiling;
