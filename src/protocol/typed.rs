//! Typed payload encoding.
//!
//! Payload fields carry a one-character type prefix followed by the value:
//!
//! | prefix | value                         |
//! |--------|-------------------------------|
//! | `S`    | string, verbatim              |
//! | `N`    | number                        |
//! | `T`    | `true`                        |
//! | `F`    | `false`                       |
//! | `L`    | `null`                        |
//! | `O`    | JSON object or array          |
//! | `U`    | undefined (decodes to `null`) |

use std::sync::Arc;

use serde_json::{Number, Value};

use crate::{Result, RpcError};

/// Payload encoding seam used by the broker and by provider responses.
pub trait Codec: Send + Sync {
    /// Encode a payload into a frame field.
    fn encode(&self, value: &Value) -> Result<String>;

    /// Decode a frame field into a payload.
    fn decode(&self, field: &str) -> Result<Value>;
}

/// Shared codec pointer.
pub type CodecPtr = Arc<dyn Codec>;

/// The prefix-tagged encoding described in the module docs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TypedCodec;

impl Codec for TypedCodec {
    fn encode(&self, value: &Value) -> Result<String> {
        // ---
        let encoded = match value {
            Value::String(s) => format!("S{s}"),
            Value::Number(n) => format!("N{n}"),
            Value::Bool(true) => "T".to_string(),
            Value::Bool(false) => "F".to_string(),
            Value::Null => "L".to_string(),
            Value::Object(_) | Value::Array(_) => format!("O{}", serde_json::to_string(value)?),
        };
        Ok(encoded)
    }

    fn decode(&self, field: &str) -> Result<Value> {
        // ---
        let mut chars = field.chars();
        let prefix = chars
            .next()
            .ok_or_else(|| RpcError::Encoding("empty typed value".into()))?;
        let rest = chars.as_str();

        let value = match prefix {
            'S' => Value::String(rest.to_string()),
            'N' => {
                let n: Number = serde_json::from_str(rest)
                    .map_err(|e| RpcError::Encoding(format!("bad number {rest:?}: {e}")))?;
                Value::Number(n)
            }
            'T' => Value::Bool(true),
            'F' => Value::Bool(false),
            'L' | 'U' => Value::Null,
            'O' => serde_json::from_str(rest)?,
            other => {
                return Err(RpcError::Encoding(format!("unknown type prefix {other:?}")));
            }
        };
        Ok(value)
    }
}
