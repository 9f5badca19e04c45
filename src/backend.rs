//! Backend connection surface.
//!
//! [`BackendConnection`] is the capability this client consumes: one solve
//! operation per build plus a tag-apply operation. [`HttpBackend`] is the
//! wire implementation, dispatching the JSON solve request and forwarding the
//! backend's streamed status frames into the progress channel.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::Sender;

use crate::error::BuildError;
use crate::progress::ProgressEvent;
use crate::solve::SolveRequest;

/// Result of a completed solve, as reported by the backend's exporter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SolveOutput {
    #[serde(default)]
    pub exporter_response: BTreeMap<String, String>,
}

#[async_trait]
pub trait BackendConnection: Send + Sync {
    /// Executes one build. Status events are written into `progress` as they
    /// arrive; the sender is dropped when the call returns, which closes the
    /// relay's channel.
    async fn solve(
        &self,
        request: SolveRequest,
        progress: Option<Sender<ProgressEvent>>,
    ) -> Result<SolveOutput, BuildError>;

    /// Applies additional references to an existing image.
    async fn tag(&self, source: &str, targets: &[String]) -> Result<(), BuildError>;
}

/// One frame of the backend's newline-delimited solve response stream.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum SolveFrame {
    Status(ProgressEvent),
    Result(SolveOutput),
    Error(String),
}

#[derive(Serialize)]
struct TagRequest<'a> {
    source: &'a str,
    targets: &'a [String],
}

pub struct HttpBackend {
    endpoint: String,
    client: Client,
}

impl HttpBackend {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }
}

#[async_trait]
impl BackendConnection for HttpBackend {
    async fn solve(
        &self,
        request: SolveRequest,
        progress: Option<Sender<ProgressEvent>>,
    ) -> Result<SolveOutput, BuildError> {
        let url = format!("{}/v1/solve", self.endpoint);
        tracing::debug!(url = %url, "dispatching solve request");

        let mut response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|err| BuildError::Connection(err.into()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(BuildError::Solve(if text.is_empty() {
                status.to_string()
            } else {
                text
            }));
        }

        // The response body is a stream of newline-delimited frames: status
        // events in emission order, then exactly one result or error frame.
        let mut buf: Vec<u8> = Vec::new();
        let mut output: Option<SolveOutput> = None;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| BuildError::Solve(err.to_string()))?
        {
            buf.extend_from_slice(&chunk);
            while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let frame: SolveFrame = serde_json::from_str(line)
                    .map_err(|err| BuildError::Solve(format!("malformed solve frame: {}", err)))?;
                match frame {
                    SolveFrame::Status(event) => {
                        if let Some(ref tx) = progress {
                            // A vanished receiver means the relay already
                            // stopped; the build keeps running regardless.
                            if tx.send(event).await.is_err() {
                                tracing::debug!("progress receiver gone, discarding event");
                            }
                        }
                    }
                    SolveFrame::Result(out) => output = Some(out),
                    SolveFrame::Error(message) => return Err(BuildError::Solve(message)),
                }
            }
        }

        output.ok_or_else(|| BuildError::Solve("stream ended without a result".to_string()))
    }

    async fn tag(&self, source: &str, targets: &[String]) -> Result<(), BuildError> {
        let url = format!("{}/v1/tag", self.endpoint);
        let response = self
            .client
            .post(&url)
            .json(&TagRequest { source, targets })
            .send()
            .await
            .map_err(|err| BuildError::Connection(err.into()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(BuildError::Solve(if text.is_empty() {
                status.to_string()
            } else {
                text
            }));
        }
        Ok(())
    }
}
