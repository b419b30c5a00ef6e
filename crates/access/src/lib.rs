//! Access Control (Layer 1)
//!
//! The single authorization decision point. Every mutation path asks
//! [`AccessGate`] instead of re-deriving role/permission logic.

#![warn(missing_docs)]

pub mod gate;
pub mod action;

pub use gate::{can_access, AccessGate, AccessRequirement};
pub use action::Action;
