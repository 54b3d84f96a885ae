use thiserror::Error;

/// Error code the server reports when no provider is registered for a
/// requested RPC name.
pub const NO_RPC_PROVIDER: &str = "NO_RPC_PROVIDER";

/// Errors that can occur during RPC operations.
///
/// Structural misuse (`AlreadyRegistered`, `MultipleResponse`) is returned
/// synchronously to the offending caller. Asynchronous outcomes of a call
/// (`AckTimeout`, `ResponseTimeout`, `NoProviderAvailable`, `Remote`) are
/// delivered once, through the [`PendingCall`](crate::PendingCall) of that call.
#[derive(Error, Debug)]
pub enum RpcError {
    /// A provider is already registered locally under this name.
    #[error("RPC {0} already registered")]
    AlreadyRegistered(String),

    /// No acknowledgment arrived for an outbound request in time.
    #[error("no ACK received in time")]
    AckTimeout,

    /// No response arrived for an outbound request in time.
    #[error("no response received in time")]
    ResponseTimeout,

    /// The server found no provider for the requested name.
    #[error("no provider available")]
    NoProviderAvailable,

    /// Any other error code reported by the server or by the remote provider.
    #[error("remote error: {0}")]
    Remote(String),

    /// A provider tried to answer the same request more than once.
    #[error("RPC {name} ({correlation_id}) already completed")]
    MultipleResponse {
        name: String,
        correlation_id: String,
    },

    /// Inbound frame with a field layout that does not match its action.
    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    /// Typed payload encoding or decoding failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The connection refused an outbound frame.
    #[error("transport error: {0}")]
    Transport(String),

    /// The broker went away before the call was resolved.
    #[error("broker closed before the call was resolved")]
    Closed,

    /// The id generator kept returning ids that are still in use.
    #[error("could not generate a unique correlation id")]
    IdCollision,

    /// A caller passed an unusable argument (empty name, zero timeout).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl RpcError {
    /// Map an error code carried by an inbound ERROR frame.
    pub fn from_remote_code(code: &str) -> Self {
        // ---
        if code == NO_RPC_PROVIDER {
            RpcError::NoProviderAvailable
        } else {
            RpcError::Remote(code.to_string())
        }
    }

    /// `true` for the two local liveness failures.
    pub fn is_timeout(&self) -> bool {
        matches!(self, RpcError::AckTimeout | RpcError::ResponseTimeout)
    }
}

/// Result type alias for RPC operations.
pub type Result<T> = std::result::Result<T, RpcError>;
