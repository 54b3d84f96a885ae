//! Domain layer public interface.
//!
//! Frame types and the connection seam, independent of any concrete
//! transport or wire format. Consumers import through this module rather
//! than the individual files.

mod connection;
mod frame;

pub use connection::{Connection, ConnectionPtr};
pub use frame::{Action, Frame, RpcMessage, Topic};
