//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor thread polling a non-blocking listener
//! - Fixed worker pool fed through a bounded channel
//! - Commands routed through LedgerStore

mod server;
mod connection;
mod client;

pub use server::Server;
pub use connection::Connection;
pub use client::Client;
