//! Response wrapper with typed, single-shot body decoding.
//!
//! A [`Response`] owns the body stream of the final attempt. Any one of
//! [`bytes`](Response::bytes), [`text`](Response::text),
//! [`json`](Response::json) or [`xml`](Response::xml) drains it; after that
//! every decode call fails with [`Error::BodyConsumed`]. The stream is
//! released by [`close`](Response::close) or when the response is dropped.
//! If the request carried a cancellation token, draining races it.

use crate::error::Format;
use crate::transport::{BodyStream, TransportResponse};
use crate::{Error, Result};
use bytes::{Bytes, BytesMut};
use futures_util::TryStreamExt;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

/// An HTTP response whose body has not been read yet.
///
/// # Examples
///
/// ```no_run
/// use chainreq::Client;
///
/// # async fn example() -> Result<(), chainreq::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// let mut response = client.get("/widgets/1").send().await?;
/// println!("Status: {}", response.status());
/// println!("Attempts: {}", response.attempts());
///
/// let body = response.text().await?;
/// println!("Body: {}", body);
///
/// // The body is gone now.
/// assert!(response.bytes().await.is_err());
/// response.close();
/// # Ok(())
/// # }
/// ```
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    attempts: usize,
    body: Option<BodyStream>,
    cancellation: Option<CancellationToken>,
}

impl Response {
    pub(crate) fn new(response: TransportResponse, attempts: usize) -> Self {
        Self {
            status: response.status,
            headers: response.headers,
            attempts,
            body: Some(response.body),
            cancellation: None,
        }
    }

    pub(crate) fn with_cancellation(mut self, token: Option<CancellationToken>) -> Self {
        self.cancellation = token;
        self
    }

    /// The HTTP status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns a header value by name, if present and valid text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)?.to_str().ok()
    }

    /// The number of sends it took to get this response.
    ///
    /// This will be `1` for requests that were not retried.
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Returns `true` if the request was sent more than once.
    pub fn was_retried(&self) -> bool {
        self.attempts > 1
    }

    /// Returns `true` once the body has been drained or released.
    pub fn is_consumed(&self) -> bool {
        self.body.is_none()
    }

    /// Drains the body into a contiguous buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BodyConsumed`] if the body was already read or the
    /// response was closed, the transport's error if the stream breaks, or
    /// [`Error::Cancelled`] if the request's cancellation token fires while
    /// reading. The body counts as consumed in every case.
    pub async fn bytes(&mut self) -> Result<Bytes> {
        let body = self.body.take().ok_or(Error::BodyConsumed)?;
        let drain = body.try_fold(BytesMut::new(), |mut buf, chunk| async move {
            buf.extend_from_slice(&chunk);
            Ok::<_, Error>(buf)
        });
        let buf = match &self.cancellation {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(Error::Cancelled),
                    result = drain => result?,
                }
            }
            None => drain.await?,
        };
        Ok(buf.freeze())
    }

    /// Drains the body and converts it to a `String`.
    ///
    /// # Errors
    ///
    /// As [`bytes`](Response::bytes), plus a decode error if the body is not
    /// valid UTF-8.
    pub async fn text(&mut self) -> Result<String> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec()).map_err(|e| Error::decode(Format::Text, e))
    }

    /// Drains the body and deserializes it as JSON.
    pub async fn json<T>(&mut self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let bytes = self.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            tracing::debug!(status = self.status.as_u16(), error = %e, "Failed to decode JSON body");
            Error::decode(Format::Json, e)
        })
    }

    /// Drains the body and deserializes it as XML.
    pub async fn xml<T>(&mut self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let bytes = self.bytes().await?;
        let text = std::str::from_utf8(&bytes).map_err(|e| Error::decode(Format::Xml, e))?;
        quick_xml::de::from_str(text).map_err(|e| {
            tracing::debug!(status = self.status.as_u16(), error = %e, "Failed to decode XML body");
            Error::decode(Format::Xml, e)
        })
    }

    /// Releases the body stream without reading it.
    ///
    /// Safe to call on a drained response and safe to call more than once.
    pub fn close(&mut self) {
        self.body = None;
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("attempts", &self.attempts)
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream::{self, StreamExt};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Widget {
        id: u32,
        name: String,
    }

    fn response(body: &'static str) -> Response {
        Response::new(
            TransportResponse::from_bytes(StatusCode::OK, HeaderMap::new(), body),
            1,
        )
    }

    #[tokio::test]
    async fn test_bytes_joins_chunks() {
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"hel")),
            Ok(Bytes::from_static(b"lo")),
        ];
        let mut response = Response::new(
            TransportResponse {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body: stream::iter(chunks).boxed(),
            },
            1,
        );

        assert_eq!(response.bytes().await.unwrap(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_body_read() {
        let token = CancellationToken::new();
        let mut response = Response::new(
            TransportResponse {
                status: StatusCode::OK,
                headers: HeaderMap::new(),
                body: stream::pending().boxed(),
            },
            1,
        )
        .with_cancellation(Some(token.clone()));

        token.cancel();

        assert!(matches!(response.bytes().await, Err(Error::Cancelled)));
        assert!(response.is_consumed());
    }

    #[tokio::test]
    async fn test_uncancelled_token_reads_body() {
        let mut response =
            response("hello").with_cancellation(Some(CancellationToken::new()));
        assert_eq!(response.text().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_second_decode_is_an_error() {
        let mut response = response("hello");
        assert_eq!(response.bytes().await.unwrap(), Bytes::from_static(b"hello"));
        assert!(response.is_consumed());
        assert!(matches!(response.text().await, Err(Error::BodyConsumed)));
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let mut response = response("unread");
        response.close();
        response.close();
        assert!(matches!(response.bytes().await, Err(Error::BodyConsumed)));
    }

    #[tokio::test]
    async fn test_json_decode() {
        let mut response = response(r#"{"id":7,"name":"sprocket"}"#);
        let widget: Widget = response.json().await.unwrap();
        assert_eq!(
            widget,
            Widget {
                id: 7,
                name: "sprocket".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_json_shape_mismatch() {
        let mut response = response(r#"{"id":"seven"}"#);
        let result = response.json::<Widget>().await;
        assert!(matches!(
            result,
            Err(Error::Decode {
                format: Format::Json,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_xml_decode() {
        let mut response = response("<Widget><id>3</id><name>gear</name></Widget>");
        let widget: Widget = response.xml().await.unwrap();
        assert_eq!(widget.id, 3);
        assert_eq!(widget.name, "gear");
    }

    #[tokio::test]
    async fn test_text_rejects_invalid_utf8() {
        let mut response = Response::new(
            TransportResponse::from_bytes(StatusCode::OK, HeaderMap::new(), vec![0xff, 0xfe]),
            1,
        );
        assert!(matches!(
            response.text().await,
            Err(Error::Decode {
                format: Format::Text,
                ..
            })
        ));
    }
}
