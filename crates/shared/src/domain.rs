use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One of the supported server-side tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
    Convert,
    Generate,
    Merge,
    Compress,
}

impl ToolKind {
    /// Path of the endpoint handling this tool, relative to the server url.
    pub fn endpoint_path(&self) -> &'static str {
        match self {
            ToolKind::Convert => "/api/heic",
            ToolKind::Generate => "/api/qr",
            ToolKind::Merge => "/api/merge",
            ToolKind::Compress => "/api/compress",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ToolKind::Convert => "HEIC to JPG",
            ToolKind::Generate => "QR Code",
            ToolKind::Merge => "PDF Merge",
            ToolKind::Compress => "Image Compress",
        }
    }

    pub const ALL: [ToolKind; 4] = [
        ToolKind::Convert,
        ToolKind::Generate,
        ToolKind::Merge,
        ToolKind::Compress,
    ];
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ToolKind::Convert => "convert",
            ToolKind::Generate => "generate",
            ToolKind::Merge => "merge",
            ToolKind::Compress => "compress",
        };
        f.write_str(name)
    }
}

/// A named file payload attached to a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl FilePart {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }
}

/// One submission, built fresh per user action and consumed by dispatch.
#[derive(Debug, Clone)]
pub enum ToolRequest {
    Convert { file: Option<FilePart> },
    Generate { text: String, logo: Option<FilePart> },
    Merge { files: Vec<FilePart> },
    Compress { file: Option<FilePart> },
}

impl ToolRequest {
    pub fn tool(&self) -> ToolKind {
        match self {
            ToolRequest::Convert { .. } => ToolKind::Convert,
            ToolRequest::Generate { .. } => ToolKind::Generate,
            ToolRequest::Merge { .. } => ToolKind::Merge,
            ToolRequest::Compress { .. } => ToolKind::Compress,
        }
    }
}

/// Minimum file count for a merge submission.
pub const MERGE_MIN_FILES: usize = 2;

/// Result of one dispatch attempt, produced exactly once per submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The server returned a binary artifact and it was saved locally.
    Saved { path: PathBuf, size_bytes: u64 },
    /// The server answered with a non-2xx status.
    ServerError { status: u16 },
    /// The request never completed (connect, send, or body read failure).
    TransportError { cause: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    ProcessingFailed,
    ConnectionFailed,
}

/// User-facing result message. Texts stay generic; status codes and causes
/// are kept in the outcome value and logs only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success() -> Self {
        Self {
            kind: NoticeKind::Success,
            message: "Success! Your result file has been saved.".to_string(),
        }
    }

    pub fn processing_failed() -> Self {
        Self {
            kind: NoticeKind::ProcessingFailed,
            message: "Error processing request. Please try again.".to_string(),
        }
    }

    pub fn connection_failed() -> Self {
        Self {
            kind: NoticeKind::ConnectionFailed,
            message: "System connection error.".to_string(),
        }
    }
}

impl From<&SubmissionOutcome> for Notice {
    fn from(outcome: &SubmissionOutcome) -> Self {
        match outcome {
            SubmissionOutcome::Saved { .. } => Notice::success(),
            SubmissionOutcome::ServerError { .. } => Notice::processing_failed(),
            SubmissionOutcome::TransportError { .. } => Notice::connection_failed(),
        }
    }
}
