// src/transport/memory.rs

//! In-memory connection.
//!
//! Stands in for a real server connection in tests and local wiring: every
//! frame the broker sends is stamped with its wire text and handed to an
//! unbounded channel, in send order, where the test (or a fake server) reads
//! it. Nothing is delivered back automatically; inbound frames are fed to
//! [`RpcBroker::handle`](crate::RpcBroker::handle) or through
//! [`run`](crate::run) by the owner of the receiving end.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::protocol::wire;
use crate::{Connection, ConnectionPtr, Frame, Result, RpcError};

struct MemoryConnection {
    outbox: mpsc::UnboundedSender<Frame>,
}

#[async_trait::async_trait]
impl Connection for MemoryConnection {
    /// Queue the frame on the outbox.
    ///
    /// Fails with `RpcError::Transport` once the receiving end is dropped.
    async fn send_frame(&self, mut frame: Frame) -> Result<()> {
        // ---
        frame.raw = Some(wire::encode(&frame));
        log_debug!("memory connection: send {:?} {:?}", frame.action, frame.data);

        self.outbox
            .send(frame)
            .map_err(|_| RpcError::Transport("memory connection closed".into()))
    }
}

/// Create an in-memory connection and the receiver of everything sent on it.
pub fn create_memory_connection() -> (ConnectionPtr, mpsc::UnboundedReceiver<Frame>) {
    // ---
    let (outbox, rx) = mpsc::unbounded_channel();
    (Arc::new(MemoryConnection { outbox }), rx)
}
