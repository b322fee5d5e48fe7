//! Bundled renderer and sink implementations.
//!
//! - [`NoArtifactRenderer`]: no image, zero estimate
//! - [`LogSink`]: dry run, logs the summary instead of publishing
//! - [`WebhookSink`]: posts to a chat webhook (Discord-compatible payload)

use std::path::Path;

use reqwest::Client;
use reqwest::multipart::{Form, Part};
use tracing::info;

use crate::types::KillEvent;

use super::collaborators::{Artifact, Estimate, Rendered, Renderer, Sink};
use super::error::DeliveryError;

/// A renderer that produces no artifact and an all-zero estimate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoArtifactRenderer;

impl Renderer for NoArtifactRenderer {
    async fn render(&self, _event: &KillEvent) -> Result<Rendered, DeliveryError> {
        Ok(Rendered {
            artifact: Artifact::None,
            estimate: Estimate::default(),
        })
    }
}

/// A sink that only logs what it would have published.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl Sink for LogSink {
    async fn send(&self, artifact: &Artifact, summary: &str) -> Result<(), DeliveryError> {
        info!(
            has_artifact = !matches!(artifact, Artifact::None),
            summary, "Dry run: would publish event"
        );
        Ok(())
    }
}

/// Posts summaries (and artifacts, as attachments) to a webhook URL.
#[derive(Clone)]
pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        WebhookSink {
            client,
            url: url.into(),
        }
    }

    async fn attachment(path: &Path) -> Result<Part, DeliveryError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            DeliveryError::permanent(format!("cannot read artifact {}", path.display()))
                .with_source(e)
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "kill.png".to_string());
        Ok(Part::bytes(bytes).file_name(name))
    }
}

impl Sink for WebhookSink {
    async fn send(&self, artifact: &Artifact, summary: &str) -> Result<(), DeliveryError> {
        let payload = serde_json::json!({ "content": summary });

        let request = match artifact {
            Artifact::None => self.client.post(&self.url).json(&payload),
            Artifact::TempFile(path) => {
                let form = Form::new()
                    .text("payload_json", payload.to_string())
                    .part("files[0]", Self::attachment(path).await?);
                self.client.post(&self.url).multipart(form)
            }
        };

        let response = request.send().await.map_err(DeliveryError::from_reqwest)?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::from_status(status.as_u16(), &body))
    }
}

impl std::fmt::Debug for WebhookSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The URL embeds the webhook token.
        f.debug_struct("WebhookSink").finish_non_exhaustive()
    }
}
