//! Client configuration.

use std::time::Duration;

use crate::transport::TlsPolicy;

/// Default server port (TLS).
pub const DEFAULT_PORT: u16 = 9443;

/// Configuration recognized by the session controller.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server hostname or IP address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// How long TCP connect plus TLS negotiation may take before the
    /// attempt is converted into a `Connect` failure.
    pub connect_timeout: Duration,
    /// Per-request deadline; pending requests past it fail with `Timeout`.
    pub response_timeout: Duration,
    /// Keep-alive PING cadence.
    pub ping_interval: Duration,
    /// First reconnect delay; grows by 1.5x per attempt.
    pub reconnect_base_delay: Duration,
    /// Upper bound on the reconnect delay.
    pub reconnect_max_delay: Duration,
    /// Reconnect attempts per outage before giving up.
    pub max_reconnect_attempts: u32,
    /// Server certificate verification policy.
    pub tls: TlsPolicy,
}

impl Config {
    /// Configuration for `host` with default timings and the accept-any
    /// TLS policy (servers commonly run self-signed).
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(10),
            ping_interval: Duration::from_secs(10),
            reconnect_base_delay: Duration::from_secs(2),
            reconnect_max_delay: Duration::from_secs(30),
            max_reconnect_attempts: 10,
            tls: TlsPolicy::AcceptAny,
        }
    }

    /// Delay before reconnect attempt `n` (1-based):
    /// `base * 1.5^(n-1)`, capped at `reconnect_max_delay`.
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let factor = 1.5f64.powi(attempt.saturating_sub(1) as i32);
        let delay = self.reconnect_base_delay.mul_f64(factor);
        delay.min(self.reconnect_max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::new("blynk.example.org");
        assert_eq!(config.host, "blynk.example.org");
        assert_eq!(config.port, 9443);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.response_timeout, Duration::from_secs(10));
        assert_eq!(config.ping_interval, Duration::from_secs(10));
        assert_eq!(config.reconnect_base_delay, Duration::from_secs(2));
        assert_eq!(config.reconnect_max_delay, Duration::from_secs(30));
        assert_eq!(config.max_reconnect_attempts, 10);
    }

    #[test]
    fn test_reconnect_delay_ladder() {
        let config = Config::new("h");
        assert_eq!(config.reconnect_delay(1), Duration::from_secs(2));
        assert_eq!(config.reconnect_delay(2), Duration::from_secs(3));
        assert_eq!(config.reconnect_delay(3), Duration::from_millis(4500));
        assert_eq!(config.reconnect_delay(4), Duration::from_millis(6750));
    }

    #[test]
    fn test_reconnect_delay_capped() {
        let config = Config::new("h");
        // 2 * 1.5^9 ≈ 76.9s, well past the 30s cap.
        assert_eq!(config.reconnect_delay(10), Duration::from_secs(30));
        assert_eq!(config.reconnect_delay(100), Duration::from_secs(30));
    }
}
