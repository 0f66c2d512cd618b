//! Shared HTTP plumbing for streaming providers.
//!
//! Both wire protocols are line oriented, so every adapter reduces to a
//! per-line decoder plugged into [`spawn_line_pump`]. The pump frames the
//! response body on `\n` at the byte level (a multi-byte character split
//! across network chunks is reassembled before decoding) and stops reading,
//! dropping the upstream connection, as soon as the consumer goes away.

use futures::StreamExt;
use marionette_core::error::ProviderError;
use marionette_core::provider::TokenStream;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Fragments buffered between the network task and the consumer.
const FRAGMENT_BUFFER: usize = 32;

/// Connect and overall-response deadlines for upstream calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(5),
            read: Duration::from_secs(120),
        }
    }
}

impl From<&marionette_config::AutopilotConfig> for Timeouts {
    fn from(config: &marionette_config::AutopilotConfig) -> Self {
        Self {
            connect: config.connect_timeout(),
            read: config.read_timeout(),
        }
    }
}

/// Build the HTTP client shared by all providers.
pub fn build_client(timeouts: Timeouts) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .connect_timeout(timeouts.connect)
        .timeout(timeouts.read)
        .build()
        .map_err(|e| ProviderError::NotConfigured(format!("Failed to create HTTP client: {e}")))
}

/// Map a transport failure onto the provider error taxonomy.
pub fn classify(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(err.to_string())
    } else if err.is_connect() {
        ProviderError::Connection(err.to_string())
    } else if err.is_decode() {
        ProviderError::Decode(err.to_string())
    } else {
        ProviderError::StreamInterrupted(err.to_string())
    }
}

/// Turn a non-2xx response into a status error carrying the body head.
pub async fn ensure_success(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!(provider, status = status.as_u16(), body = %body, "Provider returned error");
    Err(ProviderError::status(status.as_u16(), &body))
}

/// What a decoder made of one wire line.
#[derive(Debug, PartialEq)]
pub(crate) enum LineOutcome {
    /// Keep-alives, comments, metadata, or undecodable noise.
    Skip,
    Fragment(String),
    /// End of reply, optionally with a last fragment.
    End(Option<String>),
    /// The upstream reported a failure in-band.
    Fail(ProviderError),
}

/// Byte-level `\n` framer.
#[derive(Debug, Default)]
pub(crate) struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    /// Add bytes and return every line they complete, without terminators.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            let line = &self.buffer[start..end];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            lines.push(String::from_utf8_lossy(line).into_owned());
            start = end + 1;
        }
        self.buffer.drain(..start);
        lines
    }

    /// The unterminated remainder, if any.
    pub(crate) fn finish(self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.buffer).into_owned())
        }
    }
}

/// Spawn a task that reads `response` line by line through `decode`.
pub(crate) fn spawn_line_pump<F>(
    provider: String,
    response: reqwest::Response,
    mut decode: F,
) -> TokenStream
where
    F: FnMut(&str) -> LineOutcome + Send + 'static,
{
    let (tx, rx) = mpsc::channel(FRAGMENT_BUFFER);

    tokio::spawn(async move {
        let mut body = response.bytes_stream();
        let mut framer = LineFramer::default();

        loop {
            let next = tokio::select! {
                _ = tx.closed() => {
                    debug!(provider = %provider, "Consumer dropped, cancelling upstream stream");
                    return;
                }
                next = body.next() => next,
            };

            let bytes = match next {
                Some(Ok(bytes)) => bytes,
                Some(Err(e)) => {
                    let _ = tx.send(Err(classify(e))).await;
                    return;
                }
                None => break,
            };

            for line in framer.push(&bytes) {
                if !deliver(&tx, decode(&line)).await {
                    return;
                }
            }
        }

        // Upstream closed without an explicit end marker
        if let Some(line) = framer.finish() {
            deliver(&tx, decode(&line)).await;
        }
        debug!(provider = %provider, "Upstream stream closed");
    });

    rx
}

/// Forward one decoded line. Returns whether the pump should keep reading.
async fn deliver(
    tx: &mpsc::Sender<Result<String, ProviderError>>,
    outcome: LineOutcome,
) -> bool {
    match outcome {
        LineOutcome::Skip => true,
        LineOutcome::Fragment(text) => text.is_empty() || tx.send(Ok(text)).await.is_ok(),
        LineOutcome::End(last) => {
            if let Some(text) = last.filter(|t| !t.is_empty()) {
                let _ = tx.send(Ok(text)).await;
            }
            false
        }
        LineOutcome::Fail(err) => {
            let _ = tx.send(Err(err)).await;
            false
        }
    }
}
