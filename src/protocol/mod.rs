/// Wire-level encodings.
///
/// `wire` turns frames into protocol text and back; `typed` is the payload
/// encoding used inside REQUEST and RESPONSE fields.
pub mod typed;
pub mod wire;

pub use typed::{Codec, CodecPtr, TypedCodec};
