//! Shared building blocks for the tunnel IPC workspace.
//!
//! - **common** (this crate): error location tracking shared by every crate
//! - **tunnel-core**: tunnel abstraction and the send-message operation
//! - **tunnel-probe**: diagnostic CLI wiring everything together

pub mod error;

pub use error::error_location::ErrorLocation;

#[cfg(test)]
mod tests;
