// ABOUTME: Library root for keel - container runtime detection and extraction adapters.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod diagnostics;
pub mod envfile;
pub mod error;
pub mod output;
pub mod runtime;
pub mod types;
