//! Transient-fault classification and linear back-off.
//!
//! [`is_retryable_fault`] is the single predicate deciding whether a
//! transport failure is worth another attempt. [`retry_with_linear_backoff`]
//! wraps any fallible async operation and sleeps `backoff_ms × attempt`
//! between attempts. Non-retriable errors are returned immediately without
//! consuming any of the attempt budget.

use std::error::Error as _;
use std::future::Future;
use std::time::Duration;

use crate::error::GeocodeError;

/// Error codes that always mean "try again".
const RETRYABLE_CODES: [&str; 4] = ["ECONNRESET", "ECONNABORTED", "ETIMEDOUT", "ESOCKETTIMEDOUT"];

/// Message fragments that mark a transient transport failure.
const RETRYABLE_MESSAGES: [&str; 6] = [
    "connection reset",
    "connection aborted",
    "timed out",
    "socket hang up",
    "timeout",
    "network",
];

/// Pure predicate over a transport error's code and message.
///
/// Connection resets and aborts, timeouts, hung-up sockets and anything
/// mentioning the network are retryable. Everything else (refused
/// connections, DNS failures, TLS errors) is not.
#[must_use]
pub fn is_retryable_fault(code: Option<&str>, message: &str) -> bool {
    if code.is_some_and(|c| RETRYABLE_CODES.iter().any(|r| r.eq_ignore_ascii_case(c))) {
        return true;
    }
    let lower = message.to_lowercase();
    RETRYABLE_MESSAGES.iter().any(|m| lower.contains(m))
}

/// Maps a `reqwest` failure onto a POSIX-style error code, when one applies.
fn transport_fault_code(err: &reqwest::Error) -> Option<&'static str> {
    if err.is_timeout() {
        return Some("ETIMEDOUT");
    }
    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            return match io.kind() {
                std::io::ErrorKind::ConnectionReset => Some("ECONNRESET"),
                std::io::ErrorKind::ConnectionAborted => Some("ECONNABORTED"),
                std::io::ErrorKind::TimedOut => Some("ETIMEDOUT"),
                std::io::ErrorKind::ConnectionRefused => Some("ECONNREFUSED"),
                _ => None,
            };
        }
        source = inner.source();
    }
    None
}

/// Joins the error's source chain. The top-level message is skipped because
/// it embeds the request URL, whose host name could match a keyword.
fn transport_fault_message(err: &reqwest::Error) -> String {
    let mut parts = Vec::new();
    let mut source = err.source();
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}

/// Applies [`is_retryable_fault`] to a `reqwest` transport error.
#[must_use]
pub fn is_retryable_transport(err: &reqwest::Error) -> bool {
    is_retryable_fault(transport_fault_code(err), &transport_fault_message(err))
}

/// Returns `true` for errors worth retrying after a back-off delay:
/// rate limiting and retryable transport faults.
pub(crate) fn is_retriable(err: &GeocodeError) -> bool {
    match err {
        GeocodeError::RateLimited { .. } => true,
        GeocodeError::Http(e) => is_retryable_transport(e),
        _ => false,
    }
}

/// Delay before the attempt following `attempt` (1-based): `unit × attempt`.
#[must_use]
pub(crate) fn linear_delay_ms(backoff_ms: u64, attempt: u32) -> u64 {
    backoff_ms.saturating_mul(u64::from(attempt))
}

/// Runs `operation` up to `max_attempts` times in total.
///
/// | Attempt failed | Sleep before next attempt |
/// |----------------|---------------------------|
/// | 1              | 1 × `backoff_ms`          |
/// | 2              | 2 × `backoff_ms`          |
/// | n              | n × `backoff_ms`          |
///
/// `max_attempts = 0` is treated as 1.
pub(crate) async fn retry_with_linear_backoff<T, F, Fut>(
    max_attempts: u32,
    backoff_ms: u64,
    label: &str,
    mut operation: F,
) -> Result<T, GeocodeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GeocodeError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_attempts {
                    return Err(err);
                }
                let delay_ms = linear_delay_ms(backoff_ms, attempt);
                tracing::warn!(
                    operation = label,
                    attempt,
                    max_attempts,
                    delay_ms,
                    error = %err,
                    "transient geocoding error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                attempt += 1;
            }
        }
    }
}
