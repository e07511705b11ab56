//! Status-gated retries.
//!
//! A request is re-sent only when an expected status is configured, the
//! response carries a different status, and retries remain. Transport errors
//! are returned immediately and never retried. Resends are immediate; there
//! is no delay between attempts.

use crate::transport::{Transport, TransportRequest, TransportResponse};
use crate::{Error, Result};
use http::StatusCode;
use std::time::Instant;

/// Returns `true` if `actual` counts as success under `expected`.
///
/// With no expectation every status matches. This one predicate drives both
/// retry gating and the `*_with_error` decode paths on
/// [`Request`](crate::Request).
///
/// # Examples
///
/// ```
/// use chainreq::retry::status_matches;
/// use http::StatusCode;
///
/// assert!(status_matches(None, StatusCode::INTERNAL_SERVER_ERROR));
/// assert!(status_matches(Some(StatusCode::CREATED), StatusCode::CREATED));
/// assert!(!status_matches(Some(StatusCode::CREATED), StatusCode::OK));
/// ```
pub fn status_matches(expected: Option<StatusCode>, actual: StatusCode) -> bool {
    match expected {
        Some(expected) => expected == actual,
        None => true,
    }
}

/// How many times to re-send, and on what condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    /// The status that ends the retry loop. `None` disables retries.
    pub expected_status: Option<StatusCode>,
    /// Additional attempts allowed after the first send.
    pub retries: usize,
}

impl RetryPolicy {
    /// Creates a policy.
    pub fn new(expected_status: Option<StatusCode>, retries: usize) -> Self {
        Self {
            expected_status,
            retries,
        }
    }

    /// Total number of sends this policy allows in the worst case.
    pub fn max_attempts(&self) -> usize {
        match self.expected_status {
            Some(_) => self.retries.saturating_add(1),
            None => 1,
        }
    }

    /// Returns `true` if a response with `status`, received on the 1-indexed
    /// `attempt`, should be discarded and the request sent again.
    pub fn should_retry(&self, status: StatusCode, attempt: usize) -> bool {
        !status_matches(self.expected_status, status) && attempt < self.max_attempts()
    }
}

/// The response of the final attempt, plus how many attempts it took.
#[derive(Debug)]
pub struct Executed {
    /// The last response received.
    pub response: TransportResponse,
    /// Number of sends performed, starting at 1.
    pub attempts: usize,
}

/// Sends `request` through `transport`, re-sending on status mismatch as
/// `policy` allows.
///
/// Every attempt sends a clone of `request`, so a buffered body is replayed
/// byte for byte. If a cancellation token is attached, each send races it and
/// a fired token yields [`Error::Cancelled`].
pub async fn execute(
    transport: &dyn Transport,
    request: &TransportRequest,
    policy: RetryPolicy,
) -> Result<Executed> {
    let start_time = Instant::now();
    let mut attempt = 0;

    loop {
        attempt += 1;

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            attempt = attempt,
            "Executing HTTP request"
        );

        let response = match send_once(transport, request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    method = %request.method,
                    url = %request.url,
                    "Request failed"
                );
                return Err(e);
            }
        };

        if policy.should_retry(response.status, attempt) {
            tracing::warn!(
                expected = policy.expected_status.map(|s| s.as_u16()),
                actual = response.status.as_u16(),
                remaining = policy.max_attempts() - attempt,
                "Unexpected status - retrying request"
            );
            // The discarded response's body is released here.
            drop(response);
            continue;
        }

        tracing::info!(
            status = response.status.as_u16(),
            latency_ms = start_time.elapsed().as_millis(),
            attempts = attempt,
            "Received HTTP response"
        );

        return Ok(Executed {
            response,
            attempts: attempt,
        });
    }
}

async fn send_once(
    transport: &dyn Transport,
    request: &TransportRequest,
) -> Result<TransportResponse> {
    match &request.cancellation {
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(Error::Cancelled),
                result = transport.send(request.clone()) => result,
            }
        }
        None => transport.send(request.clone()).await,
    }
}
