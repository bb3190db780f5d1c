use std::time::Duration;

/// Per-connection settings shared by every [`Client`](crate::Client).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Capacity of the bounded outbound queue. When it is full the newest
    /// message is dropped.
    pub outbound_capacity: usize,

    /// How often the writer task sends a transport ping.
    pub keepalive_interval: Duration,

    /// Token-bucket capacity for inbound frames. 0 disables rate limiting.
    pub rate_limit_burst: u32,

    /// Time to refill one token.
    pub rate_limit_refill: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            outbound_capacity: 256,
            keepalive_interval: Duration::from_secs(20),
            rate_limit_burst: 1,
            rate_limit_refill: Duration::from_secs(5),
        }
    }
}
