// src/client/mod.rs
//! Caller side: outbound calls awaiting resolution.
//!
//! Each [`RpcBroker::make`](crate::RpcBroker::make) creates a `Call`, indexes
//! it by a fresh correlation id and hands the caller a [`PendingCall`]. The
//! call's outcome travels back through a oneshot channel, so it can be
//! delivered at most once no matter which of ACK timer, response timer,
//! RESPONSE or ERROR gets there first.

mod call;
mod pending;

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::{CorrelationId, Result, RpcError};

pub use call::CallState;
pub(crate) use call::{Call, Expiry};
pub(crate) use pending::CallTable;

/// Outcome of one outbound request.
///
/// Resolves to the decoded response payload, or to the error that ended the
/// call: `AckTimeout`, `ResponseTimeout`, `NoProviderAvailable`, `Remote`, or
/// `Closed` when the broker is dropped first.
///
/// Dropping a `PendingCall` does not cancel the call. Its timers keep running
/// and the outcome is discarded when it arrives.
#[derive(Debug)]
pub struct PendingCall {
    correlation_id: CorrelationId,
    rx: oneshot::Receiver<Result<Value>>,
}

impl PendingCall {
    pub(crate) fn new(correlation_id: CorrelationId, rx: oneshot::Receiver<Result<Value>>) -> Self {
        Self { correlation_id, rx }
    }

    /// Correlation id the request was sent with.
    pub fn correlation_id(&self) -> &CorrelationId {
        &self.correlation_id
    }
}

impl Future for PendingCall {
    type Output = Result<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // ---
        Pin::new(&mut self.rx).poll(cx).map(|received| match received {
            Ok(outcome) => outcome,
            Err(_) => Err(RpcError::Closed),
        })
    }
}
