//! SMS Relay - ephemeral carrier-to-browser message relay
//!
//! Inbound SMS arrive through the carrier's webhook and wait in a bounded
//! in-memory buffer until a client polls them out. Outbound SMS go straight
//! to the carrier's REST API.

pub mod message;
pub mod relay;
pub mod phone;
pub mod carrier;
pub mod server;
pub mod client;
pub mod poller;
pub mod config;
pub mod error;

pub use error::{Error, Result};
