//! Configuration and constants

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

/// Maximum number of undelivered inbound messages held by the relay
pub const DEFAULT_RELAY_CAPACITY: usize = 100;

/// Client poll cadence
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2000;

pub const DEFAULT_CARRIER_BASE_URL: &str = "https://api.twilio.com";

pub const DEFAULT_BIND_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 3000));

/// All configurable addresses, credentials and limits
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub relay_capacity: usize,
    pub poll_interval_ms: u64,
    pub carrier_base_url: String,
    pub carrier_account_sid: String,
    pub carrier_auth_token: String,
    pub carrier_from_number: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR,
            relay_capacity: DEFAULT_RELAY_CAPACITY,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            carrier_base_url: DEFAULT_CARRIER_BASE_URL.to_string(),
            carrier_account_sid: String::new(),
            carrier_auth_token: String::new(),
            carrier_from_number: String::new(),
        }
    }
}

impl Config {
    /// Create config for testing against a mock carrier
    pub fn for_test(carrier_base_url: &str) -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            relay_capacity: DEFAULT_RELAY_CAPACITY,
            poll_interval_ms: 50,
            carrier_base_url: carrier_base_url.trim_end_matches('/').to_string(),
            carrier_account_sid: "ACtest".to_string(),
            carrier_auth_token: "test-token".to_string(),
            carrier_from_number: "+15550000000".to_string(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject settings the relay cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.relay_capacity == 0 {
            return Err(crate::Error::Config(
                "relay capacity must be at least 1".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(crate::Error::Config(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if self.carrier_base_url.is_empty() {
            return Err(crate::Error::Config("carrier base URL is empty".to_string()));
        }
        Ok(())
    }

    /// Whether outbound credentials have been supplied
    pub fn has_carrier_credentials(&self) -> bool {
        !self.carrier_account_sid.is_empty()
            && !self.carrier_auth_token.is_empty()
            && !self.carrier_from_number.is_empty()
    }
}
