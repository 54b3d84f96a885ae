//! Lifecycle of one outbound request.
//!
//! ```text
//! AwaitingAck ──ack──▶ AwaitingResponse ──response──▶ Resolved
//!      │                      │
//!      ├──ack timer──▶ Failed(AckTimeout)
//!      │                      ├──response timer──▶ Failed(ResponseTimeout)
//!      └──────────error frame (any live state)──────▶ Failed(code)
//! ```
//!
//! Both timers start when the call is made. Whichever fires while the call
//! is still awaiting its ACK fails it with `AckTimeout`.
//!
//! A `Call` is only ever reachable through the broker's call index. Every
//! terminal transition starts with removing it from that index, so exactly
//! one resolution path gets hold of the `Call` and the others find nothing.
//! The terminal methods consume `self`, and the reply sender is a oneshot, so
//! the caller's outcome is delivered at most once.

use serde_json::Value;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::{Result, RpcError};

/// Where a call is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    AwaitingAck,
    AwaitingResponse,
    Resolved,
    Failed,
}

impl CallState {
    pub fn is_terminal(self) -> bool {
        matches!(self, CallState::Resolved | CallState::Failed)
    }
}

/// Which of a call's timers went off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Expiry {
    Ack,
    Response,
}

pub(crate) type Reply = oneshot::Sender<Result<Value>>;

pub(crate) struct Call {
    // ---
    name: String,

    /// Distinguishes this call from an earlier one that held the same
    /// correlation id, for timers that outlive their call.
    serial: u64,

    state: CallState,
    reply: Option<Reply>,
    ack_timer: Option<JoinHandle<()>>,
    response_timer: Option<JoinHandle<()>>,
}

impl Call {
    pub(crate) fn new(name: impl Into<String>, serial: u64, reply: Reply) -> Self {
        // ---
        Self {
            name: name.into(),
            serial,
            state: CallState::AwaitingAck,
            reply: Some(reply),
            ack_timer: None,
            response_timer: None,
        }
    }

    /// Hand the call its two deadline tasks.
    pub(crate) fn arm(&mut self, ack_timer: JoinHandle<()>, response_timer: JoinHandle<()>) {
        self.ack_timer = Some(ack_timer);
        self.response_timer = Some(response_timer);
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn serial(&self) -> u64 {
        self.serial
    }

    pub(crate) fn state(&self) -> CallState {
        self.state
    }

    /// Whether a timer of kind `expiry` still applies to this call.
    pub(crate) fn is_expirable_by(&self, expiry: Expiry) -> bool {
        match expiry {
            Expiry::Ack => self.state == CallState::AwaitingAck,
            Expiry::Response => !self.state.is_terminal(),
        }
    }

    /// The error a timer expiry ends this call with. A call that never saw
    /// its ACK fails with `AckTimeout` whichever timer went off.
    pub(crate) fn timeout_error(&self) -> RpcError {
        match self.state {
            CallState::AwaitingAck => RpcError::AckTimeout,
            _ => RpcError::ResponseTimeout,
        }
    }

    /// Record the server's ACK.
    ///
    /// Returns `false` for a duplicate ACK, which changes nothing.
    pub(crate) fn acknowledge(&mut self) -> bool {
        // ---
        if self.state != CallState::AwaitingAck {
            return false;
        }
        if let Some(timer) = self.ack_timer.take() {
            timer.abort();
        }
        self.state = CallState::AwaitingResponse;
        true
    }

    /// Terminal: deliver the decoded response.
    pub(crate) fn resolve(mut self, value: Value) {
        self.finish(CallState::Resolved, Ok(value));
    }

    /// Terminal: deliver a failure.
    pub(crate) fn fail(mut self, err: RpcError) {
        self.finish(CallState::Failed, Err(err));
    }

    fn finish(&mut self, state: CallState, outcome: Result<Value>) {
        // ---
        self.cancel_timers();
        self.state = state;

        if let Some(reply) = self.reply.take() {
            if reply.send(outcome).is_err() {
                log_debug!(
                    "RPC {} (serial {}) resolved after its caller went away",
                    self.name,
                    self.serial
                );
            }
        }
    }

    fn cancel_timers(&mut self) {
        if let Some(timer) = self.ack_timer.take() {
            timer.abort();
        }
        if let Some(timer) = self.response_timer.take() {
            timer.abort();
        }
    }
}

impl Drop for Call {
    fn drop(&mut self) {
        self.cancel_timers();
    }
}
