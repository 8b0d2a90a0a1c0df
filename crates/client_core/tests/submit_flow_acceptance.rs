use std::sync::Arc;
use std::time::Duration;

use axum::{http::StatusCode, response::IntoResponse, routing::post, Router};
use client_core::{ClientEvent, Settings, ToolboxClient, RESULT_FILENAME};
use overlay::{Overlay, OverlayConfig, OverlayEvent};
use shared::domain::{FilePart, NoticeKind, SubmissionOutcome, ToolRequest};
use tokio::net::TcpListener;
use tokio::time::timeout;

async fn serve_fixed(status: StatusCode, body: &'static [u8]) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let handler = move || async move { (status, body.to_vec()).into_response() };
    let app = Router::new()
        .route("/api/heic", post(handler.clone()))
        .route("/api/qr", post(handler.clone()))
        .route("/api/merge", post(handler.clone()))
        .route("/api/compress", post(handler));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn game_overlay() -> Arc<Overlay> {
    Arc::new(Overlay::with_config(OverlayConfig {
        spawn_period: Duration::from_millis(20),
        coin_lifetime: Duration::from_millis(50),
        ..OverlayConfig::default()
    }))
}

#[tokio::test]
async fn convert_success_opens_game_then_saves_generic_artifact() {
    let server_url = serve_fixed(StatusCode::OK, b"converted image bytes").await;
    let downloads = tempfile::tempdir().expect("tempdir");
    let overlay = game_overlay();
    let mut game_events = overlay.subscribe_events();
    let client = ToolboxClient::new_with_overlay(
        Settings {
            server_url,
            download_dir: downloads.path().to_path_buf(),
            success_close_delay_ms: 60,
        },
        Arc::clone(&overlay) as Arc<dyn client_core::DistractionOverlay>,
    );

    let outcome = client
        .submit(ToolRequest::Convert {
            file: Some(FilePart::new("holiday.heic", b"heic payload".to_vec())),
        })
        .await
        .expect("submit");

    let saved_path = match outcome {
        SubmissionOutcome::Saved { path, .. } => path,
        other => panic!("expected saved artifact, got {other:?}"),
    };
    assert_eq!(
        saved_path.file_name().and_then(|n| n.to_str()),
        Some(RESULT_FILENAME)
    );
    assert!(saved_path.exists());

    // The game opened before the response settled and closed after it.
    assert!(matches!(
        timeout(Duration::from_millis(500), game_events.recv())
            .await
            .expect("opened in time")
            .expect("event"),
        OverlayEvent::Opened
    ));
    let mut saw_closed = false;
    while let Ok(event) = game_events.try_recv() {
        if matches!(event, OverlayEvent::Closed) {
            saw_closed = true;
        }
    }
    assert!(saw_closed, "overlay closed after the grace delay");
    assert!(!overlay.is_open().await);
    assert!(overlay.snapshot().await.coins.is_empty());
}

#[tokio::test]
async fn merge_with_one_file_is_rejected_before_any_game_or_request() {
    let server_url = serve_fixed(StatusCode::OK, b"never returned").await;
    let downloads = tempfile::tempdir().expect("tempdir");
    let overlay = game_overlay();
    let client = ToolboxClient::new_with_overlay(
        Settings {
            server_url,
            download_dir: downloads.path().to_path_buf(),
            success_close_delay_ms: 0,
        },
        Arc::clone(&overlay) as Arc<dyn client_core::DistractionOverlay>,
    );

    client
        .submit(ToolRequest::Merge {
            files: vec![FilePart::new("lonely.pdf", b"%PDF-1.4".to_vec())],
        })
        .await
        .expect_err("local rejection");

    assert!(!overlay.is_open().await);
    assert!(!downloads.path().join(RESULT_FILENAME).exists());
}

#[tokio::test]
async fn generate_failure_closes_game_immediately_with_generic_notice() {
    let server_url = serve_fixed(StatusCode::BAD_GATEWAY, b"").await;
    let downloads = tempfile::tempdir().expect("tempdir");
    let overlay = game_overlay();
    let client = ToolboxClient::new_with_overlay(
        Settings {
            server_url,
            download_dir: downloads.path().to_path_buf(),
            success_close_delay_ms: 5000,
        },
        Arc::clone(&overlay) as Arc<dyn client_core::DistractionOverlay>,
    );
    let mut events = client.subscribe_events();

    let started = std::time::Instant::now();
    let outcome = client
        .submit(ToolRequest::Generate {
            text: "https://example.test/menu".to_string(),
            logo: None,
        })
        .await
        .expect("submit settles");

    assert_eq!(outcome, SubmissionOutcome::ServerError { status: 502 });
    // Failure path skips the success grace delay entirely.
    assert!(started.elapsed() < Duration::from_millis(2000));
    assert!(!overlay.is_open().await);

    let mut notice = None;
    while let Ok(event) = events.try_recv() {
        if let ClientEvent::Notice(n) = event {
            notice = Some(n);
        }
    }
    let notice = notice.expect("notice emitted");
    assert_eq!(notice.kind, NoticeKind::ProcessingFailed);
    assert!(!notice.message.contains("502"));
}
