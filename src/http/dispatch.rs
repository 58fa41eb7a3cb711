use std::error::Error as _;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{Client, Request};
use tokio::time::{Instant, timeout_at};
use tracing::debug;

use crate::metrics::{RequestRecord, ResponseHeaders};

/// Performs one request and turns whatever happens into a record.
///
/// Every HTTP status is a normal observation. Only the absence of a complete
/// response (connect failure, timeout, reset while reading the body) becomes
/// a transport failure. Nothing here returns an error.
///
/// `deadline` bounds the whole exchange independently of the client's own
/// timeout, so a dispatch always settles with a record of its own by then.
pub async fn dispatch(
    client: &Client,
    request: Request,
    relative_time: Duration,
    deadline: Instant,
) -> RequestRecord {
    let sent_at = Instant::now();
    match timeout_at(deadline, exchange(client, request, relative_time, sent_at)).await {
        Ok(record) => record,
        Err(_elapsed) => {
            debug!("Request gave up at its deadline");
            RequestRecord::transport_failure(
                sent_at.elapsed(),
                relative_time,
                format!(
                    "operation timed out after {:?}",
                    deadline.saturating_duration_since(sent_at)
                ),
                true,
            )
        }
    }
}

async fn exchange(
    client: &Client,
    request: Request,
    relative_time: Duration,
    sent_at: Instant,
) -> RequestRecord {
    match client.execute(request).await {
        Ok(response) => {
            let status = response.status().as_u16();
            let headers = ResponseHeaders::from_header_map(response.headers());
            match drain_response_body(response).await {
                Ok(_bytes) => {
                    RequestRecord::response(status, sent_at.elapsed(), relative_time, headers)
                }
                Err(err) => {
                    debug!("Failed to read response body: {}", err);
                    RequestRecord::transport_failure(
                        sent_at.elapsed(),
                        relative_time,
                        describe_error(&err),
                        err.is_timeout(),
                    )
                }
            }
        }
        Err(err) => {
            debug!("Request failed: {}", err);
            RequestRecord::transport_failure(
                sent_at.elapsed(),
                relative_time,
                describe_error(&err),
                err.is_timeout(),
            )
        }
    }
}

async fn drain_response_body(response: reqwest::Response) -> Result<u64, reqwest::Error> {
    let mut stream = response.bytes_stream();
    let mut total_bytes: u64 = 0;
    while let Some(chunk) = stream.next().await {
        let bytes = chunk?;
        total_bytes = total_bytes.saturating_add(u64::try_from(bytes.len()).unwrap_or(u64::MAX));
    }
    Ok(total_bytes)
}

/// Flattens the error chain; reqwest's top-level message rarely names the
/// actual cause.
fn describe_error(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    message
}
