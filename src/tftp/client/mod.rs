//! TFTP client implementation
//!
//! - `client`: File-level get/put façade
//! - `config`: Client configuration
//! - `session`: Shared retry and transfer ID handling
//! - `download` / `upload`: The two transfer state machines

#[allow(clippy::module_inception)]
mod client;
mod config;
mod download;
mod session;
mod upload;

pub use client::Client;
pub use config::ClientConfig;
pub use download::download;
pub use session::{RetryPolicy, Session, TransferSummary};
pub use upload::upload;
