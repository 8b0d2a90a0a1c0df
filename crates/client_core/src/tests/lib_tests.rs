use super::*;
use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
    Router,
};
use shared::domain::NoticeKind;
use std::sync::Mutex as StdMutex;
use tokio::{
    net::TcpListener,
    sync::{oneshot, Mutex},
};

/// Overlay double recording every visibility transition in order.
#[derive(Default)]
struct RecordingOverlay {
    transitions: StdMutex<Vec<&'static str>>,
}

impl RecordingOverlay {
    fn transitions(&self) -> Vec<&'static str> {
        self.transitions.lock().expect("transitions lock").clone()
    }
}

#[async_trait]
impl DistractionOverlay for RecordingOverlay {
    async fn open(&self) {
        self.transitions.lock().expect("transitions lock").push("open");
    }

    async fn close(&self) {
        self.transitions.lock().expect("transitions lock").push("close");
    }
}

#[derive(Debug)]
struct ReceivedPart {
    name: String,
    filename: Option<String>,
    len: usize,
}

#[derive(Clone)]
struct ServerState {
    hits: Arc<Mutex<u32>>,
    parts_tx: Arc<Mutex<Option<oneshot::Sender<Vec<ReceivedPart>>>>>,
    status: StatusCode,
    body: Vec<u8>,
}

async fn handle_tool(State(state): State<ServerState>, mut multipart: Multipart) -> impl IntoResponse {
    *state.hits.lock().await += 1;

    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.expect("multipart field") {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().map(str::to_string);
        let len = field.bytes().await.expect("field bytes").len();
        parts.push(ReceivedPart {
            name,
            filename,
            len,
        });
    }
    if let Some(tx) = state.parts_tx.lock().await.take() {
        let _ = tx.send(parts);
    }

    (state.status, state.body.clone())
}

struct MockServer {
    url: String,
    hits: Arc<Mutex<u32>>,
    parts_rx: oneshot::Receiver<Vec<ReceivedPart>>,
}

impl MockServer {
    async fn hits(&self) -> u32 {
        *self.hits.lock().await
    }
}

/// Serves every tool endpoint with a fixed status and body, capturing the
/// multipart parts of the first request.
async fn spawn_tool_server(status: StatusCode, body: Vec<u8>) -> MockServer {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");

    let (parts_tx, parts_rx) = oneshot::channel();
    let hits = Arc::new(Mutex::new(0));
    let state = ServerState {
        hits: Arc::clone(&hits),
        parts_tx: Arc::new(Mutex::new(Some(parts_tx))),
        status,
        body,
    };
    let app = Router::new()
        .route("/api/heic", post(handle_tool))
        .route("/api/qr", post(handle_tool))
        .route("/api/merge", post(handle_tool))
        .route("/api/compress", post(handle_tool))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    MockServer {
        url: format!("http://{addr}"),
        hits,
        parts_rx,
    }
}

fn test_settings(server_url: &str, download_dir: &std::path::Path) -> Settings {
    Settings {
        server_url: server_url.to_string(),
        download_dir: download_dir.to_path_buf(),
        success_close_delay_ms: 10,
    }
}

fn pdf(name: &str) -> FilePart {
    FilePart::new(name, b"%PDF-1.4 test".to_vec())
}

#[tokio::test]
async fn missing_file_never_reaches_network_or_overlay() {
    let server = spawn_tool_server(StatusCode::OK, b"unused".to_vec()).await;
    let downloads = tempfile::tempdir().expect("tempdir");
    let overlay = Arc::new(RecordingOverlay::default());
    let client = ToolboxClient::new_with_overlay(
        test_settings(&server.url, downloads.path()),
        Arc::clone(&overlay) as Arc<dyn DistractionOverlay>,
    );

    for request in [
        ToolRequest::Convert { file: None },
        ToolRequest::Compress { file: None },
        ToolRequest::Generate {
            text: "   ".to_string(),
            logo: None,
        },
        ToolRequest::Merge { files: Vec::new() },
    ] {
        let err = client.submit(request).await.expect_err("rejected locally");
        assert!(matches!(err, SubmitError::Validation(_)));
    }

    assert_eq!(server.hits().await, 0);
    assert!(overlay.transitions().is_empty());
}

#[tokio::test]
async fn merge_requires_at_least_two_files() {
    let server = spawn_tool_server(StatusCode::OK, b"merged".to_vec()).await;
    let downloads = tempfile::tempdir().expect("tempdir");
    let client = ToolboxClient::new(test_settings(&server.url, downloads.path()));

    let err = client
        .submit(ToolRequest::Merge {
            files: vec![pdf("only.pdf")],
        })
        .await
        .expect_err("one file is not enough");
    assert!(matches!(
        err,
        SubmitError::Validation(ValidationError::NotEnoughFiles {
            required: 2,
            actual: 1
        })
    ));
    assert_eq!(server.hits().await, 0);

    let outcome = client
        .submit(ToolRequest::Merge {
            files: vec![pdf("a.pdf"), pdf("b.pdf")],
        })
        .await
        .expect("two files proceed");
    assert!(matches!(outcome, SubmissionOutcome::Saved { .. }));
    assert_eq!(server.hits().await, 1);
}

#[tokio::test]
async fn convert_success_saves_artifact_and_closes_overlay_after_delay() {
    let artifact = b"\xff\xd8\xff converted bytes".to_vec();
    let server = spawn_tool_server(StatusCode::OK, artifact.clone()).await;
    let downloads = tempfile::tempdir().expect("tempdir");
    let overlay = Arc::new(RecordingOverlay::default());
    let client = ToolboxClient::new_with_overlay(
        test_settings(&server.url, downloads.path()),
        Arc::clone(&overlay) as Arc<dyn DistractionOverlay>,
    );
    let mut events = client.subscribe_events();

    let outcome = client
        .submit(ToolRequest::Convert {
            file: Some(FilePart::new("photo.heic", b"heic bytes".to_vec())),
        })
        .await
        .expect("submit");

    let expected_path = downloads.path().join(RESULT_FILENAME);
    assert_eq!(
        outcome,
        SubmissionOutcome::Saved {
            path: expected_path.clone(),
            size_bytes: artifact.len() as u64,
        }
    );
    // Generic filename, no extension appended.
    assert_eq!(
        std::fs::read(&expected_path).expect("artifact on disk"),
        artifact
    );
    assert_eq!(overlay.transitions(), vec!["open", "close"]);

    assert!(matches!(
        events.recv().await.expect("started event"),
        ClientEvent::SubmissionStarted {
            tool: ToolKind::Convert
        }
    ));
    assert!(matches!(
        events.recv().await.expect("saved event"),
        ClientEvent::ArtifactSaved { .. }
    ));
    match events.recv().await.expect("notice event") {
        ClientEvent::Notice(notice) => assert_eq!(notice.kind, NoticeKind::Success),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn server_error_closes_overlay_and_reports_generic_failure() {
    let server = spawn_tool_server(StatusCode::INTERNAL_SERVER_ERROR, Vec::new()).await;
    let downloads = tempfile::tempdir().expect("tempdir");
    let overlay = Arc::new(RecordingOverlay::default());
    let client = ToolboxClient::new_with_overlay(
        test_settings(&server.url, downloads.path()),
        Arc::clone(&overlay) as Arc<dyn DistractionOverlay>,
    );
    let mut events = client.subscribe_events();

    let outcome = client
        .submit(ToolRequest::Generate {
            text: "https://example.test".to_string(),
            logo: None,
        })
        .await
        .expect("submit settles into an outcome");

    assert_eq!(outcome, SubmissionOutcome::ServerError { status: 500 });
    assert_eq!(overlay.transitions(), vec!["open", "close"]);
    assert!(!downloads.path().join(RESULT_FILENAME).exists());

    let mut notice = None;
    while let Ok(event) = events.try_recv() {
        if let ClientEvent::Notice(n) = event {
            notice = Some(n);
        }
    }
    let notice = notice.expect("failure notice");
    assert_eq!(notice.kind, NoticeKind::ProcessingFailed);
    assert!(!notice.message.contains("500"));
}

#[tokio::test]
async fn transport_failure_closes_overlay_and_reports_connectivity() {
    // Bind then drop to get a port with no listener behind it.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let dead_url = format!("http://{}", listener.local_addr().expect("local addr"));
    drop(listener);

    let downloads = tempfile::tempdir().expect("tempdir");
    let overlay = Arc::new(RecordingOverlay::default());
    let client = ToolboxClient::new_with_overlay(
        test_settings(&dead_url, downloads.path()),
        Arc::clone(&overlay) as Arc<dyn DistractionOverlay>,
    );
    let mut events = client.subscribe_events();

    let outcome = client
        .submit(ToolRequest::Compress {
            file: Some(FilePart::new("image.png", b"png bytes".to_vec())),
        })
        .await
        .expect("submit settles into an outcome");

    assert!(matches!(outcome, SubmissionOutcome::TransportError { .. }));
    assert_eq!(overlay.transitions(), vec!["open", "close"]);

    let mut notice = None;
    while let Ok(event) = events.try_recv() {
        if let ClientEvent::Notice(n) = event {
            notice = Some(n);
        }
    }
    assert_eq!(
        notice.expect("connectivity notice").kind,
        NoticeKind::ConnectionFailed
    );
}

#[tokio::test]
async fn generate_without_logo_sends_only_the_text_field() {
    let server = spawn_tool_server(StatusCode::OK, b"qr".to_vec()).await;
    let downloads = tempfile::tempdir().expect("tempdir");
    let client = ToolboxClient::new(test_settings(&server.url, downloads.path()));

    client
        .submit(ToolRequest::Generate {
            text: "https://example.test".to_string(),
            logo: None,
        })
        .await
        .expect("submit");

    let parts = server.parts_rx.await.expect("captured parts");
    assert_eq!(parts.len(), 1);
    assert_eq!(parts[0].name, "text");
    assert_eq!(parts[0].filename, None);
}

#[tokio::test]
async fn merge_sends_every_file_under_the_files_field() {
    let server = spawn_tool_server(StatusCode::OK, b"merged".to_vec()).await;
    let downloads = tempfile::tempdir().expect("tempdir");
    let client = ToolboxClient::new(test_settings(&server.url, downloads.path()));

    client
        .submit(ToolRequest::Merge {
            files: vec![pdf("a.pdf"), pdf("b.pdf"), pdf("c.pdf")],
        })
        .await
        .expect("submit");

    let parts = server.parts_rx.await.expect("captured parts");
    assert_eq!(parts.len(), 3);
    for (part, expected) in parts.iter().zip(["a.pdf", "b.pdf", "c.pdf"]) {
        assert_eq!(part.name, "files");
        assert_eq!(part.filename.as_deref(), Some(expected));
        assert!(part.len > 0);
    }
}
