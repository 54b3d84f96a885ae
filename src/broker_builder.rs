//! RPC broker builder.
//!
//! Fluent configuration of an [`RpcBroker`]: timeouts, payload codec and
//! correlation id source.

use std::sync::Arc;
use std::time::Duration;

use crate::protocol::{CodecPtr, TypedCodec};
use crate::{ConnectionPtr, IdGeneratorPtr, Result, RpcBroker, RpcConfig, UuidIds};

/// Builder for [`RpcBroker`].
///
/// # Examples
///
/// ## Defaults
/// ```
/// use busrpc::{create_memory_connection, RpcBrokerBuilder};
///
/// # fn example() -> busrpc::Result<()> {
/// let (connection, _outbox) = create_memory_connection();
/// let broker = RpcBrokerBuilder::new(connection).build()?;
/// assert_eq!(broker.pending_calls(), 0);
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
///
/// ## Tight deadlines and readable ids
/// ```
/// use busrpc::{create_memory_connection, RpcBrokerBuilder, SequentialIds};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # fn example() -> busrpc::Result<()> {
/// let (connection, _outbox) = create_memory_connection();
/// let broker = RpcBrokerBuilder::new(connection)
///     .ack_timeout(Duration::from_millis(500))
///     .response_timeout(Duration::from_secs(2))
///     .id_generator(Arc::new(SequentialIds::new("u")))
///     .build()?;
/// assert_eq!(broker.config().ack_timeout, Duration::from_millis(500));
/// # Ok(())
/// # }
/// # example().unwrap();
/// ```
pub struct RpcBrokerBuilder {
    // ---
    connection: ConnectionPtr,
    config: RpcConfig,
    codec: Option<CodecPtr>,
    ids: Option<IdGeneratorPtr>,
}

impl RpcBrokerBuilder {
    /// Start from the default [`RpcConfig`], the typed codec and UUID ids.
    pub fn new(connection: ConnectionPtr) -> Self {
        Self {
            connection,
            config: RpcConfig::default(),
            codec: None,
            ids: None,
        }
    }

    /// Replace the whole timeout configuration.
    pub fn config(mut self, config: RpcConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the subscribe/unsubscribe ack timeout.
    ///
    /// Default: 2s.
    pub fn subscription_timeout(mut self, timeout: Duration) -> Self {
        self.config.subscription_timeout = timeout;
        self
    }

    /// Set the per-request ack timeout.
    ///
    /// Default: 6s.
    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.config.ack_timeout = timeout;
        self
    }

    /// Set the per-request response timeout.
    ///
    /// Default: 10s.
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.config.response_timeout = timeout;
        self
    }

    /// Use a different payload codec.
    pub fn codec(mut self, codec: CodecPtr) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Use a different correlation id source.
    pub fn id_generator(mut self, ids: IdGeneratorPtr) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Build the broker (consumes self).
    ///
    /// # Errors
    ///
    /// `RpcError::InvalidArgument` if any timeout is zero.
    pub fn build(self) -> Result<RpcBroker> {
        // ---
        self.config.validate()?;

        let codec = self.codec.unwrap_or_else(|| Arc::new(TypedCodec));
        let ids = self.ids.unwrap_or_else(|| Arc::new(UuidIds));

        Ok(RpcBroker::new(self.connection, codec, ids, self.config))
    }
}
