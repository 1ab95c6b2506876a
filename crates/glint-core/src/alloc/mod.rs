//! Allocation and collection types used across glint.
//!
//! - Re-exports of the AHash-backed hash collections
//! - [`SlotMap`], a generational store whose keys behave like weak references

pub mod slot_map;

pub use ahash::{AHashMap as HashMap, AHashSet as HashSet};
pub use slot_map::{SlotKey, SlotMap};
