//! Text wire format.
//!
//! A message is `TOPIC␟ACTION(␟FIELD)*␞`, with U+001F between parts and
//! U+001E closing each message. One chunk read from the connection may hold
//! several messages.

use crate::{Action, Frame, Result, RpcError, Topic};

/// Separates the parts of one message.
pub const PART_SEPARATOR: char = '\u{1f}';

/// Terminates a message.
pub const MESSAGE_SEPARATOR: char = '\u{1e}';

/// Encode a frame, including the trailing message separator.
pub fn encode(frame: &Frame) -> String {
    // ---
    let mut out = String::with_capacity(
        8 + frame.data.iter().map(|field| field.len() + 1).sum::<usize>(),
    );
    out.push_str(frame.topic.code());
    out.push(PART_SEPARATOR);
    out.push_str(frame.action.code());
    for field in &frame.data {
        out.push(PART_SEPARATOR);
        out.push_str(field);
    }
    out.push(MESSAGE_SEPARATOR);
    out
}

/// Parse every message in a chunk.
///
/// Each message yields its own result so that one malformed message does not
/// hide the well-formed ones around it. Empty segments are skipped.
pub fn parse(chunk: &str) -> Vec<Result<Frame>> {
    chunk
        .split(MESSAGE_SEPARATOR)
        .filter(|message| !message.is_empty())
        .map(parse_message)
        .collect()
}

fn parse_message(message: &str) -> Result<Frame> {
    // ---
    let mut parts = message.split(PART_SEPARATOR);

    let (topic, action) = match (parts.next(), parts.next()) {
        (Some(topic), Some(action)) => (topic, action),
        _ => {
            return Err(RpcError::InvalidFrame(format!(
                "message has fewer than two parts: {message:?}"
            )))
        }
    };

    let topic = Topic::from_code(topic)
        .ok_or_else(|| RpcError::InvalidFrame(format!("unknown topic {topic:?}")))?;
    let action = Action::from_code(action)
        .ok_or_else(|| RpcError::InvalidFrame(format!("unknown action {action:?}")))?;

    let mut frame = Frame::new(topic, action, parts.map(str::to_owned).collect());
    frame.raw = Some(format!("{message}{MESSAGE_SEPARATOR}"));
    Ok(frame)
}
