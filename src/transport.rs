//! The seam between the request builder and whatever sends bytes on the wire.
//!
//! A [`Transport`] takes a fully materialized [`TransportRequest`] and returns
//! a [`TransportResponse`] whose body is a single-consumption byte stream.
//! [`ReqwestTransport`] is the implementation used by
//! [`Client`](crate::Client) unless another one is injected.

use crate::{Error, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt, TryStreamExt};
use http::{HeaderMap, Method, StatusCode};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// A response body: a forward-only stream of byte chunks.
pub type BodyStream = BoxStream<'static, Result<Bytes>>;

/// A request ready to be handed to a [`Transport`].
///
/// The body is fully buffered, so cloning the request is cheap and every
/// clone sends identical bytes.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// The HTTP method.
    pub method: Method,
    /// The absolute target URL.
    pub url: Url,
    /// All headers to send, one value per name.
    pub headers: HeaderMap,
    /// The request body, if any.
    pub body: Option<Bytes>,
    /// The caller's cancellation token, if one was attached.
    pub cancellation: Option<CancellationToken>,
}

/// What a [`Transport`] hands back for one send.
pub struct TransportResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The response headers.
    pub headers: HeaderMap,
    /// The response body.
    pub body: BodyStream,
}

impl TransportResponse {
    /// Builds a response with an in-memory body.
    ///
    /// Handy for custom transports and tests.
    pub fn from_bytes(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        Self {
            status,
            headers,
            body: stream::once(async move { Ok::<_, Error>(body) }).boxed(),
        }
    }
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Sends one request and returns one response.
///
/// Implementations report connection-level failures as errors; any status
/// code, including 4xx and 5xx, is a successful send.
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use chainreq::{Result, Transport, TransportRequest, TransportResponse};
/// use http::{HeaderMap, StatusCode};
///
/// struct AlwaysTeapot;
///
/// #[async_trait]
/// impl Transport for AlwaysTeapot {
///     async fn send(&self, _request: TransportRequest) -> Result<TransportResponse> {
///         Ok(TransportResponse::from_bytes(
///             StatusCode::IM_A_TEAPOT,
///             HeaderMap::new(),
///             "short and stout",
///         ))
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request.
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse>;
}

/// A [`Transport`] backed by a `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: reqwest::Client,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    /// Wraps an existing `reqwest::Client`.
    pub fn new(http_client: reqwest::Client) -> Self {
        Self {
            http_client,
            timeout: None,
        }
    }

    /// Applies a timeout to every request sent through this transport.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
        let mut builder = self
            .http_client
            .request(request.method, request.url)
            .headers(request.headers);

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(Error::from_reqwest)?;

        Ok(TransportResponse {
            status: response.status(),
            headers: response.headers().clone(),
            body: response.bytes_stream().map_err(Error::from_reqwest).boxed(),
        })
    }
}
