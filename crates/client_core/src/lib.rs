//! Request dispatcher: gathers user-supplied parts into one multipart POST
//! per submission, routes the binary response to a local artifact save, and
//! opens/closes the distraction overlay around the call.

use std::{path::PathBuf, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client,
};
use shared::{
    domain::{FilePart, Notice, SubmissionOutcome, ToolKind, ToolRequest, MERGE_MIN_FILES},
    error::{SubmitError, ValidationError},
};
use tokio::sync::broadcast;
use tracing::{info, warn};

pub mod config;
pub use config::{ensure_download_dir, load_settings, prepare_server_url, Settings};

/// Fixed artifact name, deliberately without an extension; consumers sniff
/// the content the same way the processing endpoints do.
pub const RESULT_FILENAME: &str = "toolbox_result";

/// Visibility seam toward the mini-game. The dispatcher only ever toggles
/// it; the game has no dependency on the submission outcome.
#[async_trait]
pub trait DistractionOverlay: Send + Sync {
    async fn open(&self);
    async fn close(&self);
}

/// No-op overlay for headless use and dispatcher tests.
pub struct MissingOverlay;

#[async_trait]
impl DistractionOverlay for MissingOverlay {
    async fn open(&self) {}
    async fn close(&self) {}
}

#[async_trait]
impl DistractionOverlay for overlay::Overlay {
    async fn open(&self) {
        overlay::Overlay::open(self).await;
    }

    async fn close(&self) {
        overlay::Overlay::close(self).await;
    }
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    SubmissionStarted {
        tool: ToolKind,
    },
    ArtifactSaved {
        tool: ToolKind,
        path: PathBuf,
        size_bytes: u64,
    },
    Notice(Notice),
}

/// Checks the tool-specific minimum input without consuming the request.
/// A failure here means the overlay never opens and no request goes out.
pub fn validate(request: &ToolRequest) -> Result<(), ValidationError> {
    match request {
        ToolRequest::Convert { file: None } => Err(ValidationError::MissingFile {
            tool: ToolKind::Convert,
        }),
        ToolRequest::Compress { file: None } => Err(ValidationError::MissingFile {
            tool: ToolKind::Compress,
        }),
        ToolRequest::Generate { text, .. } if text.trim().is_empty() => {
            Err(ValidationError::MissingText)
        }
        ToolRequest::Merge { files } if files.len() < MERGE_MIN_FILES => {
            Err(ValidationError::NotEnoughFiles {
                required: MERGE_MIN_FILES,
                actual: files.len(),
            })
        }
        _ => Ok(()),
    }
}

fn file_part(file: FilePart) -> Part {
    Part::bytes(file.bytes).file_name(file.filename)
}

/// Builds the multipart body with the field names the endpoints expect.
/// Re-checks presence so the extraction below never has to panic.
fn build_form(request: ToolRequest) -> Result<Form, ValidationError> {
    validate(&request)?;
    let form = match request {
        ToolRequest::Convert { file } => {
            let file = file.ok_or(ValidationError::MissingFile {
                tool: ToolKind::Convert,
            })?;
            Form::new().part("file", file_part(file))
        }
        ToolRequest::Generate { text, logo } => {
            let mut form = Form::new().text("text", text);
            if let Some(logo) = logo {
                form = form.part("logo", file_part(logo));
            }
            form
        }
        ToolRequest::Merge { files } => {
            let mut form = Form::new();
            for file in files {
                form = form.part("files", file_part(file));
            }
            form
        }
        ToolRequest::Compress { file } => {
            let file = file.ok_or(ValidationError::MissingFile {
                tool: ToolKind::Compress,
            })?;
            Form::new().part("file", file_part(file))
        }
    };
    Ok(form)
}

pub struct ToolboxClient {
    http: Client,
    settings: Settings,
    overlay: Arc<dyn DistractionOverlay>,
    events: broadcast::Sender<ClientEvent>,
}

impl ToolboxClient {
    pub fn new(settings: Settings) -> Arc<Self> {
        Self::new_with_overlay(settings, Arc::new(MissingOverlay))
    }

    pub fn new_with_overlay(settings: Settings, overlay: Arc<dyn DistractionOverlay>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        Arc::new(Self {
            http: Client::new(),
            settings,
            overlay,
            events,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    fn artifact_path(&self) -> PathBuf {
        self.settings.download_dir.join(RESULT_FILENAME)
    }

    /// Dispatches one submission: validate, open the overlay, POST the
    /// multipart form, settle into an outcome, close the overlay, notify.
    ///
    /// Server and transport failures are outcomes, not errors; the `Err`
    /// side is reserved for rejected input and a failed artifact save. The
    /// in-flight request has no cancellation path: a cancel control may
    /// close the overlay early, and the close issued here becomes a no-op.
    pub async fn submit(&self, request: ToolRequest) -> Result<SubmissionOutcome, SubmitError> {
        let tool = request.tool();
        let form = build_form(request)?;

        let _ = self.events.send(ClientEvent::SubmissionStarted { tool });
        self.overlay.open().await;

        let endpoint = format!("{}{}", self.settings.server_url, tool.endpoint_path());
        info!(tool = %tool, endpoint = %endpoint, "dispatching submission");

        let outcome = match self.http.post(&endpoint).multipart(form).send().await {
            Ok(response) if response.status().is_success() => {
                match response.bytes().await {
                    Ok(body) => {
                        let path = self.artifact_path();
                        if let Err(source) = tokio::fs::write(&path, &body).await {
                            self.overlay.close().await;
                            return Err(SubmitError::SaveArtifact { path, source });
                        }
                        let size_bytes = body.len() as u64;
                        info!(tool = %tool, path = %path.display(), size_bytes, "artifact saved");
                        let _ = self.events.send(ClientEvent::ArtifactSaved {
                            tool,
                            path: path.clone(),
                            size_bytes,
                        });
                        // Grace delay so the user perceives the game ending
                        // before the overlay disappears.
                        tokio::time::sleep(Duration::from_millis(
                            self.settings.success_close_delay_ms,
                        ))
                        .await;
                        self.overlay.close().await;
                        SubmissionOutcome::Saved { path, size_bytes }
                    }
                    Err(err) => {
                        warn!(tool = %tool, error = %err, "failed to read response body");
                        self.overlay.close().await;
                        SubmissionOutcome::TransportError {
                            cause: err.to_string(),
                        }
                    }
                }
            }
            Ok(response) => {
                let status = response.status().as_u16();
                warn!(tool = %tool, status, "endpoint returned error status");
                self.overlay.close().await;
                SubmissionOutcome::ServerError { status }
            }
            Err(err) => {
                warn!(tool = %tool, error = %err, "submission transport failure");
                self.overlay.close().await;
                SubmissionOutcome::TransportError {
                    cause: err.to_string(),
                }
            }
        };

        let _ = self.events.send(ClientEvent::Notice(Notice::from(&outcome)));
        Ok(outcome)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
