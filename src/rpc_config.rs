//! Timeout configuration for the RPC broker.
//!
//! Transport and reconnection settings live with whatever implements
//! [`Connection`](crate::Connection); this type only carries the deadlines
//! the broker enforces locally.

use std::time::Duration;

/// Deadlines enforced by the broker.
///
/// # Example
///
/// ```
/// use busrpc::RpcConfig;
/// use std::time::Duration;
///
/// let config = RpcConfig::default()
///     .with_ack_timeout(Duration::from_secs(1))
///     .with_response_timeout(Duration::from_secs(5));
///
/// assert_eq!(config.subscription_timeout, Duration::from_secs(2));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcConfig {
    // ---
    /// How long a SUBSCRIBE or UNSUBSCRIBE for a provider name may wait for
    /// its ACK before an [`AckTimeout`](crate::ClientEventKind::AckTimeout)
    /// event is emitted.
    ///
    /// Default: 2 seconds
    pub subscription_timeout: Duration,

    /// How long an outbound request may wait for its ACK.
    ///
    /// Default: 6 seconds
    pub ack_timeout: Duration,

    /// How long an outbound request may wait for its RESPONSE, counted from
    /// the moment the request is made.
    ///
    /// Default: 10 seconds
    pub response_timeout: Duration,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            subscription_timeout: Duration::from_secs(2),
            ack_timeout: Duration::from_secs(6),
            response_timeout: Duration::from_secs(10),
        }
    }
}

impl RpcConfig {
    /// Use one duration for every deadline.
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            subscription_timeout: timeout,
            ack_timeout: timeout,
            response_timeout: timeout,
        }
    }

    /// Set the subscribe/unsubscribe acknowledgment timeout.
    pub fn with_subscription_timeout(mut self, timeout: Duration) -> Self {
        self.subscription_timeout = timeout;
        self
    }

    /// Set the per-request acknowledgment timeout.
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Set the per-request response timeout. Both per-request deadlines run
    /// from the moment the request is made, so this must not be shorter than
    /// the ack timeout.
    pub fn with_response_timeout(mut self, timeout: Duration) -> Self {
        self.response_timeout = timeout;
        self
    }

    /// Reject deadlines that could never be met.
    pub(crate) fn validate(&self) -> crate::Result<()> {
        // ---
        for (label, value) in [
            ("subscription_timeout", self.subscription_timeout),
            ("ack_timeout", self.ack_timeout),
            ("response_timeout", self.response_timeout),
        ] {
            if value.is_zero() {
                return Err(crate::RpcError::InvalidArgument(format!(
                    "{label} must be greater than zero"
                )));
            }
        }
        if self.response_timeout < self.ack_timeout {
            return Err(crate::RpcError::InvalidArgument(format!(
                "response_timeout ({:?}) must not be shorter than ack_timeout ({:?})",
                self.response_timeout, self.ack_timeout
            )));
        }
        Ok(())
    }
}
