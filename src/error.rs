//! Error types for building, sending and decoding requests.
//!
//! Errors fall into four groups: configuration errors captured while a
//! [`Request`](crate::Request) is being built, transport errors raised while
//! sending, cancellation, and decode errors raised while reading a
//! [`Response`](crate::Response) body. A status code that differs from the
//! expected one is never an error at this layer.

use std::fmt;

/// The body encoding an encode or decode error relates to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `application/json`
    Json,
    /// `application/xml`
    Xml,
    /// UTF-8 text
    Text,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Json => f.write_str("JSON"),
            Format::Xml => f.write_str("XML"),
            Format::Text => f.write_str("text"),
        }
    }
}

/// The main error type of the crate.
///
/// # Examples
///
/// ```no_run
/// use chainreq::{Client, Error};
///
/// # async fn example() -> Result<(), Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// match client.get("/widgets").text().await {
///     Ok(body) => println!("Body: {}", body),
///     Err(Error::Network(e)) => eprintln!("Could not reach the server: {}", e),
///     Err(Error::SerializationFailed { format, message }) => {
///         eprintln!("Could not encode {} body: {}", format, message);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// A network-level error raised by the reqwest transport (connection
    /// refused, DNS failure, broken stream, ...).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// A failure raised by a custom [`Transport`](crate::Transport).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The transport gave up waiting for the server.
    #[error("Request timed out")]
    Timeout,

    /// The cancellation token attached with
    /// [`Request::with_context`](crate::Request::with_context) fired while a
    /// send was in flight.
    #[error("Request cancelled")]
    Cancelled,

    /// The target URL (`base_url + path`) could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Invalid configuration was provided, such as a malformed header name or
    /// an out-of-range status code.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The request body could not be encoded.
    ///
    /// Captured by [`Request::with_json`](crate::Request::with_json) or
    /// [`Request::with_xml`](crate::Request::with_xml) and reported by every
    /// terminal method.
    #[error("Failed to serialize {format} request body: {message}")]
    SerializationFailed {
        /// The encoding that failed
        format: Format,
        /// The encoder's error message
        message: String,
    },

    /// The response body could not be decoded into the requested shape.
    #[error("Failed to decode {format} response body: {message}")]
    Decode {
        /// The decoding that failed
        format: Format,
        /// The decoder's error message
        message: String,
    },

    /// The response body was already drained by an earlier decode call, or
    /// the response was closed.
    #[error("Response body already consumed")]
    BodyConsumed,
}

impl Error {
    /// Returns `true` for errors captured while configuring a request.
    ///
    /// These are reported without the transport ever being invoked.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::ConfigurationError(_) | Error::SerializationFailed { .. } | Error::InvalidUrl(_)
        )
    }

    /// Returns `true` for errors raised by the transport while sending.
    ///
    /// # Examples
    ///
    /// ```
    /// use chainreq::Error;
    ///
    /// assert!(Error::Timeout.is_transport());
    /// assert!(Error::Transport("connection reset".to_string()).is_transport());
    /// assert!(!Error::BodyConsumed.is_transport());
    /// ```
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Network(_) | Error::Transport(_) | Error::Timeout | Error::Cancelled
        )
    }

    pub(crate) fn decode(format: Format, err: impl fmt::Display) -> Self {
        Error::Decode {
            format,
            message: err.to_string(),
        }
    }

    pub(crate) fn serialization(format: Format, err: impl fmt::Display) -> Self {
        Error::SerializationFailed {
            format,
            message: err.to_string(),
        }
    }

    /// Maps a reqwest error, splitting out timeouts like the rest of the crate
    /// reports them.
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else {
            Error::Network(err)
        }
    }
}

/// A specialized `Result` type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_are_classified() {
        let err = Error::serialization(Format::Json, "key must be a string");
        assert!(err.is_configuration());
        assert!(!err.is_transport());
        assert_eq!(
            err.to_string(),
            "Failed to serialize JSON request body: key must be a string"
        );
    }

    #[test]
    fn test_decode_error_message() {
        let err = Error::decode(Format::Xml, "unexpected end of input");
        assert!(!err.is_configuration());
        assert_eq!(
            err.to_string(),
            "Failed to decode XML response body: unexpected end of input"
        );
    }

    #[test]
    fn test_cancelled_is_transport() {
        assert!(Error::Cancelled.is_transport());
    }
}
