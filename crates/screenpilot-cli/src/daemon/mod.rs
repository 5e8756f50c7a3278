//! Daemon process holding pointer handles between CLI invocations.

pub mod client;
pub mod paths;
pub mod server;

pub use client::DaemonClient;
pub use server::DaemonServer;
