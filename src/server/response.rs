//! Provider response handle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::protocol::CodecPtr;
use crate::{Action, ConnectionPtr, CorrelationId, Frame, Result, RpcError};

/// Answer channel for one inbound request, bound to its name and correlation id.
///
/// Cheap to clone; all clones share one state, so the request is completed at
/// most once across them. Completion is any of [`respond`](Self::respond),
/// [`reject`](Self::reject) or [`decline`](Self::decline); a second
/// completion returns [`RpcError::MultipleResponse`] and sends nothing.
///
/// The ACK is separate from completion. It is sent automatically right after
/// the provider callback returns, unless the callback turned that off with
/// [`set_auto_ack(false)`](Self::set_auto_ack), and `respond` sends it first
/// if it is still outstanding. Repeated `ack` calls before completion are
/// no-ops.
#[derive(Clone)]
pub struct RpcResponse {
    inner: Arc<ResponseInner>,
}

struct ResponseInner {
    // ---
    connection: ConnectionPtr,
    codec: CodecPtr,
    name: String,
    correlation_id: CorrelationId,
    auto_ack: AtomicBool,
    acknowledged: AtomicBool,
    completed: AtomicBool,
}

impl RpcResponse {
    pub(crate) fn new(
        connection: ConnectionPtr,
        codec: CodecPtr,
        name: impl Into<String>,
        correlation_id: CorrelationId,
    ) -> Self {
        // ---
        Self {
            inner: Arc::new(ResponseInner {
                connection,
                codec,
                name: name.into(),
                correlation_id,
                auto_ack: AtomicBool::new(true),
                acknowledged: AtomicBool::new(false),
                completed: AtomicBool::new(false),
            }),
        }
    }

    /// RPC name of the request.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Correlation id of the request.
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.inner.correlation_id
    }

    /// Whether the request has been answered.
    pub fn is_complete(&self) -> bool {
        self.inner.completed.load(Ordering::Acquire)
    }

    /// Turn the automatic ACK on or off. Only effective when called inside
    /// the provider callback, before it returns its future.
    pub fn set_auto_ack(&self, enabled: bool) {
        self.inner.auto_ack.store(enabled, Ordering::Release);
    }

    pub(crate) fn auto_ack(&self) -> bool {
        self.inner.auto_ack.load(Ordering::Acquire)
    }

    /// Acknowledge the request without answering it yet.
    ///
    /// # Errors
    ///
    /// `MultipleResponse` if the request is already complete, or the
    /// connection's error if the frame cannot be queued.
    pub async fn ack(&self) -> Result<()> {
        // ---
        if self.is_complete() {
            return Err(self.multiple_response());
        }
        self.send_ack_once().await
    }

    /// Answer the request with `payload`.
    ///
    /// # Errors
    ///
    /// `MultipleResponse` on a second completion; `Serialization` or
    /// `Encoding` if the payload cannot be encoded (the request then stays
    /// open); or the connection's error.
    pub async fn respond<T>(&self, payload: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        // ---
        let value = serde_json::to_value(payload)?;
        let typed = self.inner.codec.encode(&value)?;

        self.claim()?;
        self.send_ack_once().await?;
        self.send(
            Action::Response,
            vec![self.name().into(), self.correlation_id().to_string(), typed],
        )
        .await
    }

    /// Fail the request with an error code, delivered to the caller as an
    /// ERROR frame.
    pub async fn reject(&self, code: impl Into<String>) -> Result<()> {
        // ---
        self.claim()?;
        self.inner.acknowledged.store(true, Ordering::Release);
        self.send(
            Action::Error,
            vec![code.into(), self.name().into(), self.correlation_id().to_string()],
        )
        .await
    }

    /// Hand the request back to the server so it can try another provider.
    pub async fn decline(&self) -> Result<()> {
        // ---
        self.claim()?;
        self.inner.acknowledged.store(true, Ordering::Release);
        self.send(
            Action::Rejection,
            vec![self.name().into(), self.correlation_id().to_string()],
        )
        .await
    }

    fn claim(&self) -> Result<()> {
        if self.inner.completed.swap(true, Ordering::AcqRel) {
            Err(self.multiple_response())
        } else {
            Ok(())
        }
    }

    async fn send_ack_once(&self) -> Result<()> {
        // ---
        if self.inner.acknowledged.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.send(
            Action::Ack,
            vec![self.name().into(), self.correlation_id().to_string()],
        )
        .await
    }

    async fn send(&self, action: Action, data: Vec<String>) -> Result<()> {
        self.inner
            .connection
            .send_frame(Frame::rpc(action, data))
            .await
    }

    fn multiple_response(&self) -> RpcError {
        RpcError::MultipleResponse {
            name: self.inner.name.clone(),
            correlation_id: self.inner.correlation_id.to_string(),
        }
    }
}

impl std::fmt::Debug for RpcResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcResponse")
            .field("name", &self.inner.name)
            .field("correlation_id", &self.inner.correlation_id)
            .field("complete", &self.is_complete())
            .finish()
    }
}
