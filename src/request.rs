//! The fluent request builder.
//!
//! A [`Request`] is created by a [`Client`](crate::Client), configured through
//! chained `with_*` calls and finished by one terminal method that sends it
//! and, for most terminals, decodes the body.
//!
//! Configuration errors do not interrupt the chain. The first one is kept and
//! every later configuration call is ignored; the terminal method then
//! returns that error without sending anything.

use crate::error::Format;
use crate::retry::{self, status_matches, RetryPolicy};
use crate::transport::{Transport, TransportRequest};
use crate::{Error, Response, Result};
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Result of a `*_with_error` terminal: which shape the body was decoded
/// into.
///
/// The terminals fill each arm with the decode result, so the branch taken
/// survives a malformed body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E> {
    /// The status matched the expected one (or none was set).
    Expected(T),
    /// The status differed from the expected one; the body is the error shape.
    Unexpected(E),
}

impl<T, E> Outcome<T, E> {
    /// Returns `true` for [`Outcome::Expected`].
    pub fn is_expected(&self) -> bool {
        matches!(self, Outcome::Expected(_))
    }

    /// Converts into a `std::result::Result`, `Err` holding the error shape.
    pub fn into_result(self) -> std::result::Result<T, E> {
        match self {
            Outcome::Expected(value) => Ok(value),
            Outcome::Unexpected(err) => Err(err),
        }
    }
}

/// A request under construction.
///
/// # Examples
///
/// ```no_run
/// use chainreq::Client;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize)]
/// struct NewWidget { name: String }
///
/// #[derive(Deserialize)]
/// struct Widget { id: u64, name: String }
///
/// # async fn example() -> Result<(), chainreq::Error> {
/// let client = Client::builder()
///     .base_url("https://api.example.com")?
///     .build()?;
///
/// let widget: Widget = client
///     .post("/widgets")
///     .with_json(&NewWidget { name: "foo".to_string() })
///     .with_header("X-Request-Id", "abc123")
///     .with_expected_status(201)
///     .with_retry(2)
///     .json()
///     .await?;
/// println!("Created widget {}", widget.id);
/// # Ok(())
/// # }
/// ```
pub struct Request {
    transport: Arc<dyn Transport>,
    state: std::result::Result<RequestParts, Error>,
}

struct RequestParts {
    method: Method,
    url: String,
    headers: HeaderMap,
    expected_status: Option<StatusCode>,
    retries: usize,
    body: Option<Bytes>,
    cancellation: Option<CancellationToken>,
}

impl Request {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        method: Method,
        url: String,
        headers: HeaderMap,
    ) -> Self {
        Self {
            transport,
            state: Ok(RequestParts {
                method,
                url,
                headers,
                expected_status: None,
                retries: 0,
                body: None,
                cancellation: None,
            }),
        }
    }

    /// Applies `f` to the parts unless an earlier step already failed.
    fn configure<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut RequestParts) -> Result<()>,
    {
        if let Ok(parts) = &mut self.state {
            if let Err(e) = f(parts) {
                tracing::debug!(error = %e, "Request configuration failed");
                self.state = Err(e);
            }
        }
        self
    }

    /// Returns the first configuration error, if any occurred.
    pub fn error(&self) -> Option<&Error> {
        self.state.as_ref().err()
    }

    /// Sets the body to the given bytes, verbatim.
    pub fn with_bytes(self, body: impl Into<Bytes>) -> Self {
        let body = body.into();
        self.configure(|parts| {
            parts.body = Some(body);
            Ok(())
        })
    }

    /// Sets the body to the given text, verbatim.
    pub fn with_string(self, body: impl Into<String>) -> Self {
        self.with_bytes(body.into())
    }

    /// Encodes `body` as JSON and sets `Content-Type: application/json`.
    ///
    /// An encoding failure is kept as the request's error.
    pub fn with_json<T>(self, body: &T) -> Self
    where
        T: Serialize + ?Sized,
    {
        self.with_content_type("application/json")
            .configure(|parts| {
                let encoded =
                    serde_json::to_vec(body).map_err(|e| Error::serialization(Format::Json, e))?;
                parts.body = Some(Bytes::from(encoded));
                Ok(())
            })
    }

    /// Encodes `body` as XML and sets `Content-Type: application/xml`.
    ///
    /// The root element is named after the serialized type. An encoding
    /// failure is kept as the request's error.
    pub fn with_xml<T>(self, body: &T) -> Self
    where
        T: Serialize + ?Sized,
    {
        self.with_content_type("application/xml").configure(|parts| {
            let encoded =
                quick_xml::se::to_string(body).map_err(|e| Error::serialization(Format::Xml, e))?;
            parts.body = Some(Bytes::from(encoded));
            Ok(())
        })
    }

    /// Attaches a cancellation token.
    ///
    /// Cancelling it aborts the send in flight and any later read of the
    /// response body with [`Error::Cancelled`].
    pub fn with_context(self, token: CancellationToken) -> Self {
        self.configure(|parts| {
            parts.cancellation = Some(token);
            Ok(())
        })
    }

    /// Sets the `Content-Type` header.
    pub fn with_content_type(self, content_type: impl AsRef<str>) -> Self {
        self.with_header(CONTENT_TYPE, content_type)
    }

    /// Sets a header, replacing any value already set under the same name.
    ///
    /// An invalid name or value is kept as the request's error.
    pub fn with_header(self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.configure(|parts| {
            let name = HeaderName::try_from(name.as_ref()).map_err(|e| {
                Error::ConfigurationError(format!("Invalid header name: {}", e))
            })?;
            let value = HeaderValue::try_from(value.as_ref()).map_err(|e| {
                Error::ConfigurationError(format!("Invalid header value: {}", e))
            })?;
            parts.headers.insert(name, value);
            Ok(())
        })
    }

    /// Sets the status code that counts as success.
    ///
    /// A different status triggers a retry if retries remain, and selects the
    /// error shape in [`json_with_error`](Request::json_with_error) and
    /// [`xml_with_error`](Request::xml_with_error). `0` clears the
    /// expectation.
    ///
    /// # Errors
    ///
    /// A code that is not a valid HTTP status (outside `100..=999`) is kept
    /// as the request's [`Error::ConfigurationError`]; every terminal method
    /// then returns it without sending.
    pub fn with_expected_status(self, code: u16) -> Self {
        self.configure(|parts| {
            parts.expected_status = match code {
                0 => None,
                code => Some(StatusCode::from_u16(code).map_err(|e| {
                    Error::ConfigurationError(format!("Invalid expected status {}: {}", code, e))
                })?),
            };
            Ok(())
        })
    }

    /// Sets how many additional attempts are allowed.
    ///
    /// Retries only happen when an expected status is set with
    /// [`with_expected_status`](Request::with_expected_status); transport
    /// errors are never retried.
    pub fn with_retry(self, count: usize) -> Self {
        self.configure(|parts| {
            parts.retries = count;
            Ok(())
        })
    }

    /// Materializes the request without sending it.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error, or [`Error::InvalidUrl`] if
    /// `base_url + path` does not parse.
    pub fn build(self) -> Result<TransportRequest> {
        self.into_parts().map(|(_, request, _)| request)
    }

    fn into_parts(self) -> Result<(Arc<dyn Transport>, TransportRequest, RetryPolicy)> {
        let parts = self.state?;
        let url = Url::parse(&parts.url)?;
        let request = TransportRequest {
            method: parts.method,
            url,
            headers: parts.headers,
            body: parts.body,
            cancellation: parts.cancellation,
        };
        let policy = RetryPolicy::new(parts.expected_status, parts.retries);
        Ok((self.transport, request, policy))
    }

    fn expected_status(&self) -> Option<StatusCode> {
        self.state.as_ref().ok().and_then(|parts| parts.expected_status)
    }

    /// Sends the request, retrying as configured, and returns the response
    /// without reading its body.
    ///
    /// The caller owns the returned [`Response`]; its body is released when
    /// it is closed or dropped.
    pub async fn send(self) -> Result<Response> {
        let (transport, request, policy) = self.into_parts()?;
        let executed = retry::execute(transport.as_ref(), &request, policy).await?;
        Ok(Response::new(executed.response, executed.attempts)
            .with_cancellation(request.cancellation))
    }

    /// Sends the request and returns the body as bytes.
    pub async fn bytes(self) -> Result<Bytes> {
        let mut response = self.send().await?;
        let body = response.bytes().await;
        response.close();
        body
    }

    /// Sends the request and returns the body as text.
    pub async fn text(self) -> Result<String> {
        let mut response = self.send().await?;
        let body = response.text().await;
        response.close();
        body
    }

    /// Sends the request and decodes the JSON body.
    pub async fn json<T>(self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let mut response = self.send().await?;
        let body = response.json().await;
        response.close();
        body
    }

    /// Sends the request and decodes the XML body.
    pub async fn xml<T>(self) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let mut response = self.send().await?;
        let body = response.xml().await;
        response.close();
        body
    }

    /// Sends the request and decodes the JSON body into `T` when the status
    /// matches the expected one, or into `E` when it does not.
    ///
    /// The branch is reported even when decoding fails: a malformed body on
    /// the expected status is `Outcome::Expected(Err(..))`, a malformed error
    /// page is `Outcome::Unexpected(Err(..))`. Only configuration and
    /// transport errors make the outer `Result` fail.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use chainreq::{Client, Outcome};
    /// use serde::Deserialize;
    ///
    /// #[derive(Deserialize)]
    /// struct Widget { id: u64 }
    ///
    /// #[derive(Deserialize)]
    /// struct ApiError { message: String }
    ///
    /// # async fn example() -> Result<(), chainreq::Error> {
    /// let client = Client::builder()
    ///     .base_url("https://api.example.com")?
    ///     .build()?;
    ///
    /// match client
    ///     .get("/widgets/1")
    ///     .with_expected_status(200)
    ///     .json_with_error::<Widget, ApiError>()
    ///     .await?
    /// {
    ///     Outcome::Expected(Ok(widget)) => println!("Widget {}", widget.id),
    ///     Outcome::Expected(Err(e)) => eprintln!("Malformed widget: {}", e),
    ///     Outcome::Unexpected(Ok(err)) => eprintln!("API error: {}", err.message),
    ///     Outcome::Unexpected(Err(e)) => eprintln!("Unreadable error body: {}", e),
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub async fn json_with_error<T, E>(self) -> Result<Outcome<Result<T>, Result<E>>>
    where
        T: DeserializeOwned,
        E: DeserializeOwned,
    {
        let expected = self.expected_status();
        let mut response = self.send().await?;
        let outcome = if status_matches(expected, response.status()) {
            Outcome::Expected(response.json().await)
        } else {
            Outcome::Unexpected(response.json().await)
        };
        response.close();
        Ok(outcome)
    }

    /// The XML counterpart of [`json_with_error`](Request::json_with_error).
    pub async fn xml_with_error<T, E>(self) -> Result<Outcome<Result<T>, Result<E>>>
    where
        T: DeserializeOwned,
        E: DeserializeOwned,
    {
        let expected = self.expected_status();
        let mut response = self.send().await?;
        let outcome = if status_matches(expected, response.status()) {
            Outcome::Expected(response.xml().await)
        } else {
            Outcome::Unexpected(response.xml().await)
        };
        response.close();
        Ok(outcome)
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.state {
            Ok(parts) => f
                .debug_struct("Request")
                .field("method", &parts.method)
                .field("url", &parts.url)
                .field("headers", &parts.headers)
                .field("expected_status", &parts.expected_status)
                .field("retries", &parts.retries)
                .field("body_len", &parts.body.as_ref().map(Bytes::len))
                .finish_non_exhaustive(),
            Err(e) => f.debug_struct("Request").field("error", e).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportResponse;
    use async_trait::async_trait;
    use serde::ser::Error as _;
    use serde::{Deserialize, Serializer};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Transport for Counting {
        async fn send(&self, _request: TransportRequest) -> Result<TransportResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(TransportResponse::from_bytes(
                StatusCode::OK,
                HeaderMap::new(),
                "{}",
            ))
        }
    }

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: Serializer>(&self, _serializer: S) -> std::result::Result<S::Ok, S::Error> {
            Err(S::Error::custom("refusing to encode"))
        }
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Widget {
        name: String,
    }

    fn request_with(transport: Arc<Counting>) -> Request {
        Request::new(
            transport,
            Method::POST,
            "http://localhost/widgets".to_string(),
            HeaderMap::new(),
        )
    }

    fn request() -> Request {
        request_with(Arc::new(Counting {
            calls: AtomicUsize::new(0),
        }))
    }

    #[test]
    fn test_string_body_verbatim() {
        let built = request().with_string("plain text").build().unwrap();
        assert_eq!(built.body.as_deref(), Some(&b"plain text"[..]));
        assert_eq!(built.url.as_str(), "http://localhost/widgets");
        assert_eq!(built.method, Method::POST);
    }

    #[test]
    fn test_last_body_wins() {
        let built = request()
            .with_json(&Widget {
                name: "foo".to_string(),
            })
            .with_bytes(vec![1, 2, 3])
            .build()
            .unwrap();
        assert_eq!(built.body.as_deref(), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn test_json_body_and_content_type() {
        let widget = Widget {
            name: "foo".to_string(),
        };
        let built = request().with_json(&widget).build().unwrap();

        assert_eq!(built.headers[CONTENT_TYPE], "application/json");
        let decoded: Widget = serde_json::from_slice(built.body.as_deref().unwrap()).unwrap();
        assert_eq!(decoded, widget);
    }

    #[test]
    fn test_xml_body_and_content_type() {
        let widget = Widget {
            name: "foo".to_string(),
        };
        let built = request().with_xml(&widget).build().unwrap();

        assert_eq!(built.headers[CONTENT_TYPE], "application/xml");
        let text = std::str::from_utf8(built.body.as_deref().unwrap()).unwrap();
        let decoded: Widget = quick_xml::de::from_str(text).unwrap();
        assert_eq!(decoded, widget);
    }

    #[test]
    fn test_header_overwrite() {
        let built = request()
            .with_header("X-Trace", "a")
            .with_header("X-Trace", "b")
            .build()
            .unwrap();
        let values: Vec<_> = built.headers.get_all("x-trace").iter().collect();
        assert_eq!(values, vec!["b"]);
    }

    #[test]
    fn test_first_error_is_sticky() {
        let request = request()
            .with_json(&Unencodable)
            .with_header("Bad Header", "x")
            .with_string("ignored");

        match request.error() {
            Some(Error::SerializationFailed { format, message }) => {
                assert_eq!(*format, Format::Json);
                assert!(message.contains("refusing to encode"));
            }
            other => panic!("Expected SerializationFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_header_name() {
        let request = request().with_header("Bad Header", "x");
        assert!(matches!(
            request.error(),
            Some(Error::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_expected_status_validation() {
        assert!(request().with_expected_status(0).error().is_none());
        assert!(request().with_expected_status(201).error().is_none());
        assert!(request().with_expected_status(42).error().is_some());
    }

    #[tokio::test]
    async fn test_invalid_expected_status_skips_transport() {
        let transport = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });

        let result = request_with(transport.clone())
            .with_expected_status(42)
            .with_retry(3)
            .send()
            .await;

        assert!(matches!(result, Err(Error::ConfigurationError(_))));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_url_reported_on_build() {
        let request = Request::new(
            Arc::new(Counting {
                calls: AtomicUsize::new(0),
            }),
            Method::GET,
            "not a url/widgets".to_string(),
            HeaderMap::new(),
        );
        assert!(matches!(request.build(), Err(Error::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_deferred_error_skips_transport() {
        let transport = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });

        let result = request_with(transport.clone())
            .with_xml(&Unencodable)
            .send()
            .await;
        assert!(matches!(
            result,
            Err(Error::SerializationFailed {
                format: Format::Xml,
                ..
            })
        ));

        let result = request_with(transport.clone())
            .with_json(&Unencodable)
            .json::<serde_json::Value>()
            .await;
        assert!(matches!(result, Err(Error::SerializationFailed { .. })));

        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_outcome_into_result() {
        let expected: Outcome<u8, &str> = Outcome::Expected(1);
        assert!(expected.is_expected());
        assert_eq!(expected.into_result(), Ok(1));

        let unexpected: Outcome<u8, &str> = Outcome::Unexpected("nope");
        assert!(!unexpected.is_expected());
        assert_eq!(unexpected.into_result(), Err("nope"));
    }
}
