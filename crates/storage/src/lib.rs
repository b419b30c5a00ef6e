//! Storage abstraction and implementations for LabMan.
//!
//! This crate provides a trait-based persistence interface with a JSON file
//! reference implementation and an in-memory backend.

#![warn(missing_docs)]

pub mod trait_;
pub mod json_storage;
pub mod memory;

pub use trait_::{ProgressFilter, Result, Storage, StorageError, SubmissionFilter};
pub use json_storage::JsonStorage;
pub use memory::MemoryStorage;
