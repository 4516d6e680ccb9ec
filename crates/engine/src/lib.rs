//! Generation engine implementations for Chatline.
//!
//! All engines implement the `chatline_core::GenerationEngine` trait.
//! The loader selects the backend from configuration; the service owns the
//! loaded engine and its readiness.

pub mod loader;
#[cfg(feature = "local")]
pub mod local;
pub mod remote;
pub mod service;

pub use loader::load_engine;
#[cfg(feature = "local")]
pub use local::LocalEngine;
pub use remote::RemoteEngine;
pub use service::{EngineService, Readiness};
