//! Inbound receive loop.
//!
//! Glue between whatever reads the connection and a [`FrameConsumer`] such
//! as [`RpcBroker`](crate::RpcBroker). The reader pushes frames (or raw wire
//! chunks) into an mpsc channel; the loop spawned here feeds them to the
//! consumer one at a time, in arrival order, awaiting each before taking the
//! next.
//!
//! Errors returned by the consumer are logged and the loop carries on, the
//! same way a single bad message must not take down a message-bus consumer.
//! The loop ends when every sender of the channel is dropped.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::protocol::wire;
use crate::{Frame, Result, RpcError};

/// A consumer of inbound frames.
#[async_trait::async_trait]
pub trait FrameConsumer: Send + Sync {
    /// Handle a single inbound frame.
    ///
    /// Returning an error does not stop the receive loop.
    async fn handle_frame(&self, frame: Frame) -> Result<()>;

    /// Called for a wire message that could not be parsed into a frame.
    fn report_parse_error(&self, _err: RpcError) {
        log_warn!("dropping unparseable message: {_err}");
    }
}

/// Spawn a receive loop over parsed frames.
///
/// The returned handle completes once `inbox` is closed and drained.
pub fn run<T>(consumer: T, mut inbox: mpsc::Receiver<Frame>) -> JoinHandle<()>
where
    T: FrameConsumer + 'static,
{
    // ---
    tokio::spawn(async move {
        while let Some(frame) = inbox.recv().await {
            deliver(&consumer, frame).await;
        }
        log_debug!("frame inbox closed, receive loop stopped");
    })
}

/// Spawn a receive loop over raw wire chunks, each of which may hold
/// several messages.
pub fn run_wire<T>(consumer: T, mut inbox: mpsc::Receiver<String>) -> JoinHandle<()>
where
    T: FrameConsumer + 'static,
{
    // ---
    tokio::spawn(async move {
        while let Some(chunk) = inbox.recv().await {
            for parsed in wire::parse(&chunk) {
                match parsed {
                    Ok(frame) => deliver(&consumer, frame).await,
                    Err(err) => consumer.report_parse_error(err),
                }
            }
        }
        log_debug!("wire inbox closed, receive loop stopped");
    })
}

async fn deliver<T: FrameConsumer>(consumer: &T, frame: Frame) {
    if let Err(_err) = consumer.handle_frame(frame).await {
        log_warn!("frame consumer error: {_err}");
    }
}
