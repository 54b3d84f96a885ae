//! Connection implementations and the inbound receive loop.
//!
//! Broker code depends only on the [`Connection`](crate::Connection) trait;
//! concrete connections are exposed through constructor functions.

mod memory;
mod runner;

pub use memory::create_memory_connection;
pub use runner::{run, run_wire, FrameConsumer};
