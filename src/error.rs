/// Errors that might occur when using the library.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Attempted to create a post with no text or attachments.
    #[error("post is empty (no text or attachments)")]
    EmptyPost,

    /// Attempted to create a post with an [`Attachment`][`crate::Attachment`] marked as failed.
    #[error("attempted to use post with failed attachment")]
    FailedAttachment,

    /// The attachment content is not an image type Bluesky accepts.
    #[error("unsupported media: {0}")]
    UnsupportedMedia(String),

    /// A handle resolved to an empty DID.
    #[error("handle {0:?} resolved to an empty identifier")]
    EmptyIdentifier(String),

    /// The server answered an XRPC call with a failure status.
    #[error("xrpc error ({status}): {error}: {message}")]
    Xrpc {
        /// HTTP status code.
        status: reqwest::StatusCode,
        /// Error name reported by the server, e.g. `AuthenticationRequired`.
        error: String,
        /// Human readable message, or the raw response body if it could not be decoded.
        message: String,
    },

    /// An error while decoding or re-encoding an image.
    #[cfg(feature = "resize")]
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// An I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// An HTTP client error.
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
}

impl Error {
    /// Returns true if the server rejected the request's credentials.
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        match self {
            Error::Xrpc { status, .. } => *status == reqwest::StatusCode::UNAUTHORIZED,
            Error::Request(err) => err.status() == Some(reqwest::StatusCode::UNAUTHORIZED),
            _ => false,
        }
    }
}
