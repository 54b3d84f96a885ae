// src/domain/frame.rs

//! Protocol frames.
//!
//! A [`Frame`] is the raw unit exchanged with the connection: a topic, an
//! action and an ordered list of string fields. Field layout depends on the
//! action, so inbound RPC frames are parsed once, at the boundary, into an
//! [`RpcMessage`] with named fields. Dispatch logic never indexes `data`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{CorrelationId, Result, RpcError};

/// Message topic. Only [`Topic::Rpc`] is handled by this crate; the others
/// exist so that frames of a shared connection can be parsed and skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    Connection,
    Auth,
    Error,
    Event,
    Record,
    Rpc,
    Presence,
}

impl Topic {
    /// Wire code of the topic.
    pub fn code(self) -> &'static str {
        match self {
            Topic::Connection => "C",
            Topic::Auth => "A",
            Topic::Error => "X",
            Topic::Event => "E",
            Topic::Record => "R",
            Topic::Rpc => "P",
            Topic::Presence => "U",
        }
    }

    /// Look up a topic by its wire code.
    pub fn from_code(code: &str) -> Option<Self> {
        let topic = match code {
            "C" => Topic::Connection,
            "A" => Topic::Auth,
            "X" => Topic::Error,
            "E" => Topic::Event,
            "R" => Topic::Record,
            "P" => Topic::Rpc,
            "U" => Topic::Presence,
            _ => return None,
        };
        Some(topic)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Frame action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Ack,
    Request,
    Response,
    Error,
    Rejection,
    Subscribe,
    Unsubscribe,
}

impl Action {
    /// Wire code of the action.
    pub fn code(self) -> &'static str {
        match self {
            Action::Ack => "A",
            Action::Request => "REQ",
            Action::Response => "RES",
            Action::Error => "E",
            Action::Rejection => "REJ",
            Action::Subscribe => "S",
            Action::Unsubscribe => "US",
        }
    }

    /// Look up an action by its wire code.
    pub fn from_code(code: &str) -> Option<Self> {
        let action = match code {
            "A" => Action::Ack,
            "REQ" => Action::Request,
            "RES" => Action::Response,
            "E" => Action::Error,
            "REJ" => Action::Rejection,
            "S" => Action::Subscribe,
            "US" => Action::Unsubscribe,
            _ => return None,
        };
        Some(action)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// One discrete protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    // ---
    pub topic: Topic,
    pub action: Action,

    /// Action-specific fields, in wire order.
    pub data: Vec<String>,

    /// Source text, when the frame was parsed from (or encoded to) the wire.
    /// Always one whole message, terminator included.
    pub raw: Option<String>,
}

impl Frame {
    pub fn new(topic: Topic, action: Action, data: Vec<String>) -> Self {
        Self {
            topic,
            action,
            data,
            raw: None,
        }
    }

    /// Shorthand for an RPC-topic frame.
    pub fn rpc(action: Action, data: Vec<String>) -> Self {
        Self::new(Topic::Rpc, action, data)
    }

    /// Field at `index`, if present.
    pub fn field(&self, index: usize) -> Option<&str> {
        self.data.get(index).map(String::as_str)
    }
}

/// An inbound RPC frame with its fields resolved by action.
///
/// ERROR frames carry the error code first, so their name and correlation id
/// sit one position later than in ACK and RESPONSE frames. That asymmetry is
/// handled here and nowhere else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcMessage {
    /// A remote caller asks a local provider to answer.
    Request {
        name: String,
        correlation_id: CorrelationId,
        payload: String,
    },

    /// The server confirms a SUBSCRIBE or UNSUBSCRIBE for a provider name.
    SubscriptionAck { action: Action, name: String },

    /// The server accepted an outbound request.
    Ack {
        name: String,
        correlation_id: CorrelationId,
    },

    /// Result of an outbound request.
    Response {
        name: String,
        correlation_id: CorrelationId,
        payload: String,
    },

    /// An outbound request failed remotely.
    Error {
        code: String,
        name: String,
        correlation_id: CorrelationId,
    },
}

impl RpcMessage {
    /// Parse an RPC-topic frame.
    ///
    /// # Errors
    ///
    /// Returns `RpcError::InvalidFrame` when the frame is not on the RPC
    /// topic, carries an action a client never receives, or has too few
    /// fields for its action.
    pub fn parse(frame: &Frame) -> Result<Self> {
        // ---
        if frame.topic != Topic::Rpc {
            return Err(RpcError::InvalidFrame(format!(
                "expected topic {}, got {}",
                Topic::Rpc,
                frame.topic
            )));
        }

        let field = |index: usize| -> Result<String> {
            frame.field(index).map(str::to_owned).ok_or_else(|| {
                RpcError::InvalidFrame(format!(
                    "{} frame needs field {index}, has {}",
                    frame.action,
                    frame.data.len()
                ))
            })
        };

        let message = match frame.action {
            Action::Request => RpcMessage::Request {
                name: field(0)?,
                correlation_id: field(1)?.into(),
                payload: field(2)?,
            },
            Action::Ack => {
                let first = field(0)?;
                match Action::from_code(&first) {
                    Some(action @ (Action::Subscribe | Action::Unsubscribe)) => {
                        RpcMessage::SubscriptionAck {
                            action,
                            name: field(1)?,
                        }
                    }
                    _ => RpcMessage::Ack {
                        name: first,
                        correlation_id: field(1)?.into(),
                    },
                }
            }
            Action::Response => RpcMessage::Response {
                name: field(0)?,
                correlation_id: field(1)?.into(),
                payload: field(2)?,
            },
            Action::Error => RpcMessage::Error {
                code: field(0)?,
                name: field(1)?,
                correlation_id: field(2)?.into(),
            },
            other => {
                return Err(RpcError::InvalidFrame(format!(
                    "unexpected inbound action {other}"
                )))
            }
        };

        Ok(message)
    }

    /// Correlation id of the outbound call this message resolves, if any.
    pub fn correlation_id(&self) -> Option<&CorrelationId> {
        match self {
            RpcMessage::Ack { correlation_id, .. }
            | RpcMessage::Response { correlation_id, .. }
            | RpcMessage::Error { correlation_id, .. } => Some(correlation_id),
            RpcMessage::Request { .. } | RpcMessage::SubscriptionAck { .. } => None,
        }
    }
}
