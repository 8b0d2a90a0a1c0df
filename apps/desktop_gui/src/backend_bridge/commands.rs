//! Backend commands queued from UI to backend worker.

use std::path::PathBuf;

pub enum BackendCommand {
    Submit { submission: SubmissionSpec },
    CollectCoin { coin_id: u64 },
    CancelOverlay,
}

/// What the user selected, by path; the backend worker reads the files so
/// the UI thread never blocks on disk.
pub enum SubmissionSpec {
    Convert { file: PathBuf },
    Generate { text: String, logo: Option<PathBuf> },
    Merge { files: Vec<PathBuf> },
    Compress { file: PathBuf },
}
