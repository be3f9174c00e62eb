//! SSH session establishment over the overlay network
//!
//! Resolves credentials, negotiates the SSH connection over a dialed stream
//! and opens the SFTP subsystem on top of it.

pub mod auth;
pub mod client;
pub mod handler;

pub use auth::{Credential, CredentialResolver};
pub use client::{Session, SessionEstablisher, SessionParams, TransferSession};
