//! Request-shaped interface over the LabMan services.
//!
//! A transport (HTTP, CLI, socket) deserializes a [`Request`], supplies the
//! authenticated [`labman_core::Actor`], and serializes the [`ApiResponse`].

pub mod config;
pub mod dispatch;
pub mod error;
pub mod request;

pub use config::{ConfigError, LabmanConfig};
pub use dispatch::LabmanApi;
pub use error::ApiError;
pub use request::{ApiResponse, Request, Response};
pub use labman_submission::LifecycleConfig;
