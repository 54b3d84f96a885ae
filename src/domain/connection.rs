// src/domain/connection.rs

//! Connection abstraction.
//!
//! The broker talks to the server through one shared, ordered connection. It
//! never reads from it: inbound frames are pushed into
//! [`RpcBroker::handle`](crate::RpcBroker::handle) by whoever owns the read
//! side (see [`run`](crate::run)). Connecting, reconnecting and buffering
//! while offline are the implementation's business.

use std::sync::Arc;

use super::Frame;
use crate::Result;

/// Outbound half of the shared connection.
///
/// Implementations must preserve the order of `send_frame` calls made from a
/// single task and must not block on the remote side; queueing the frame is
/// enough for `send_frame` to return `Ok`.
///
/// # Notes
///
/// This trait uses `async_trait`; the rendered signature shows a boxed
/// future. Treat it as a normal `async fn`.
#[async_trait::async_trait]
pub trait Connection: Send + Sync {
    /// Queue one frame for delivery.
    async fn send_frame(&self, frame: Frame) -> Result<()>;
}

/// Shared connection pointer.
///
/// Cheap to clone; every clone writes to the same underlying connection.
pub type ConnectionPtr = Arc<dyn Connection>;
