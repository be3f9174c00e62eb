//! SFTP remote filesystem and the transfer engine built on it.

pub mod remote;
pub mod transfer;

pub use remote::{RemoteEntry, RemoteFs, SftpRemote};
pub use transfer::{TransferSummary, execute};
