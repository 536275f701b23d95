/// Errors that can occur in the transport layer.
///
/// Every variant is fatal to the connection it happened on, except a
/// [`FrameTooLarge`](Self::FrameTooLarge) from a send: the frame was refused
/// before any byte went out, so the stream is still intact.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Connecting to a server failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] std::io::Error),

    /// A frame exceeded the configured size cap.
    #[error("frame exceeds {limit} bytes")]
    FrameTooLarge { limit: usize },
}
