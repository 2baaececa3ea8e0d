//! # epsim
//!
//! Server, CLI and audio pipeline around `epsim-core`.
//!
//! The library target exists so integration tests can drive the router
//! and the pipeline without spawning the binary.

pub mod api;
pub mod cli;
pub mod clock;
pub mod config;
pub mod pipeline;
