//! # chainreq - A fluent HTTP request builder
//!
//! chainreq wraps an HTTP transport (by default `reqwest`) in a chainable
//! request builder. Configure method, path, headers, body encoding,
//! cancellation, expected status and retry count, then finish with a terminal
//! method that sends the request and decodes the response body as bytes,
//! text, JSON or XML.
//!
//! ## Quick Start
//!
//! ```no_run
//! use chainreq::Client;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize)]
//! struct NewWidget {
//!     name: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct Widget {
//!     id: u64,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), chainreq::Error> {
//!     let client = Client::builder()
//!         .base_url("https://api.example.com")?
//!         .build()?;
//!
//!     // POST a JSON body, re-sending up to twice until the server says 201.
//!     let widget: Widget = client
//!         .post("/widgets")
//!         .with_json(&NewWidget { name: "foo".to_string() })
//!         .with_expected_status(201)
//!         .with_retry(2)
//!         .json()
//!         .await?;
//!     println!("Created widget {} ({})", widget.id, widget.name);
//!
//!     // Or keep the response and decode it yourself.
//!     let mut response = client.get("/widgets").send().await?;
//!     println!("Status: {}", response.status());
//!     let body = response.text().await?;
//!     println!("Body: {}", body);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Retries
//!
//! Retries are driven only by the status code. With
//! [`Request::with_expected_status`] and [`Request::with_retry`] set, a
//! response carrying any other status is discarded and the request is sent
//! again immediately, up to the retry count. The body is buffered, so every
//! attempt sends the same bytes. Transport errors are returned at once and
//! never retried. When retries run out the last response is returned as is;
//! use [`Request::json_with_error`] or [`Request::xml_with_error`] to decode
//! a mismatched response into an error shape instead.
//!
//! ## Errors
//!
//! Encoding failures and invalid headers do not break the chain. The first
//! one is kept on the request, later configuration calls are ignored, and the
//! terminal method reports it without touching the network:
//!
//! ```no_run
//! use chainreq::{Client, Error};
//!
//! # async fn example() -> Result<(), Error> {
//! # let client = Client::builder().base_url("https://api.example.com")?.build()?;
//! let request = client.post("/widgets").with_header("Bad Header", "x");
//! assert!(request.error().is_some());
//!
//! match request.send().await {
//!     Err(Error::ConfigurationError(message)) => eprintln!("{}", message),
//!     other => panic!("unexpected: {:?}", other),
//! }
//! # Ok(())
//! # }
//! ```

mod client;
mod error;
mod request;
mod response;
pub mod retry;
pub mod transport;

pub use client::{Client, ClientBuilder};
pub use error::{Error, Format, Result};
pub use request::{Outcome, Request};
pub use response::Response;
pub use tokio_util::sync::CancellationToken;
pub use transport::{BodyStream, ReqwestTransport, Transport, TransportRequest, TransportResponse};
