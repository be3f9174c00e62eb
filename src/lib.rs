//! zscp library
//!
//! Secure file copy to and from hosts reachable over an overlay network.
//! Exposes the core functionality for the binary and integration tests.

// Public modules for integration testing
pub mod config;
pub mod endpoint;
pub mod error;
pub mod oidc;
pub mod overlay;
pub mod sftp;
pub mod ssh;

// Public modules for the binary
pub mod app;
pub mod cli;
pub mod logging;

// Internal modules
pub(crate) mod security_log;
