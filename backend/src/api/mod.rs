//! Interface to the hosting service.
//!
//! The service owns the HTTP transport; this module provides what it
//! consumes: response payloads and the pipeline log stream.

pub mod logs;
pub mod types;

pub use logs::*;
pub use types::*;
