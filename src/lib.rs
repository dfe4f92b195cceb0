//! Streamforge - HLS transcoding job-queue service
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod encode;
pub mod error;
pub mod ladder;
pub mod notify;
pub mod pipeline;
pub mod probe;
pub mod queue;
pub mod server;
pub mod store;
pub mod tools;
pub mod validate;
