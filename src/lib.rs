//! Request/response correlation for RPC over one shared message-bus
//! connection.
//!
//! Many callers issue calls concurrently and many local providers answer
//! calls from other clients, all over a single ordered connection carrying
//! short frames that may resolve out of order. [`RpcBroker`] tracks every
//! call in flight by correlation id, routes each inbound frame to the call,
//! provider or subscription it belongs to, and enforces ack and response
//! deadlines without blocking the connection.
//!
//! The connection itself, the server's choice of provider, and reconnection
//! are outside this crate: plug a connection in through [`Connection`] and
//! feed inbound frames to [`RpcBroker::handle`] (or [`run`]).

#[macro_use]
mod macros;

mod ack_timeout;
mod broker;
mod broker_builder;
mod client;
mod correlation;
mod domain;
mod error;
mod events;
mod rpc_config;
mod server;
mod sync;
mod transport;

pub mod protocol;

// Re-export main types
pub use broker::RpcBroker;
pub use broker_builder::RpcBrokerBuilder;
pub use client::{CallState, PendingCall};
pub use server::RpcResponse;

pub use rpc_config::RpcConfig;

pub use correlation::{CorrelationId, IdGenerator, IdGeneratorPtr, SequentialIds, UuidIds};
pub use error::{Result, RpcError, NO_RPC_PROVIDER};
pub use events::{ClientEvent, ClientEventKind};

pub use transport::{create_memory_connection, run, run_wire, FrameConsumer};

// --- public re-exports
pub use domain::{
    //
    Action,
    Connection,
    ConnectionPtr,
    Frame,
    RpcMessage,
    Topic,
};
