//! Request and connect timeouts.

use std::fmt;
use std::time::Duration;

/// Default request (read) timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Timeouts applied by the transport to a single call.
///
/// Compared by value: two timeouts with the same durations are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timeout {
    /// Total time allowed for the request, response body included.
    pub request: Duration,
    /// Time allowed to establish the connection.
    ///
    /// Transports with a pooled connector may fix this value at build time;
    /// `HyperTransport` uses its `TransportConfig::connect_timeout` instead.
    pub connect: Duration,
}

impl Timeout {
    /// Create a timeout from explicit durations.
    #[must_use]
    pub const fn new(request: Duration, connect: Duration) -> Self {
        Self { request, connect }
    }

    /// Replace the request timeout.
    #[must_use]
    pub const fn with_request(mut self, request: Duration) -> Self {
        self.request = request;
        self
    }

    /// Replace the connect timeout.
    #[must_use]
    pub const fn with_connect(mut self, connect: Duration) -> Self {
        self.connect = connect;
        self
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT, DEFAULT_CONNECT_TIMEOUT)
    }
}

impl From<Duration> for Timeout {
    fn from(request: Duration) -> Self {
        Self::default().with_request(request)
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "request={:.1}s connect={:.1}s",
            self.request.as_secs_f64(),
            self.connect.as_secs_f64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeout() {
        let timeout = Timeout::default();
        assert_eq!(timeout.request, Duration::from_secs(30));
        assert_eq!(timeout.connect, Duration::from_secs(15));
    }

    #[test]
    fn timeout_value_equality() {
        let a = Timeout::new(Duration::from_secs(5), Duration::from_secs(1));
        let b = Timeout::default()
            .with_request(Duration::from_secs(5))
            .with_connect(Duration::from_secs(1));
        assert_eq!(a, b);
        assert_ne!(a, Timeout::default());
    }

    #[test]
    fn timeout_from_duration_keeps_connect() {
        let timeout = Timeout::from(Duration::from_millis(500));
        assert_eq!(timeout.request, Duration::from_millis(500));
        assert_eq!(timeout.connect, DEFAULT_CONNECT_TIMEOUT);
    }

    #[test]
    fn timeout_display() {
        assert_eq!(Timeout::default().to_string(), "request=30.0s connect=15.0s");
    }
}
