//! Desktop front end: tool tabs, file pickers, the distraction mini-game,
//! and the backend worker bridging UI commands onto a tokio runtime.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::Arc,
    thread,
    time::Duration,
};

use anyhow::Context;
use client_core::{ClientEvent, DistractionOverlay, ToolboxClient};
use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use overlay::{Overlay, OverlayConfig, OverlayEvent};
use shared::{
    domain::{FilePart, Notice, NoticeKind, ToolKind, ToolRequest, MERGE_MIN_FILES},
    error::ValidationError,
};

use crate::backend_bridge::commands::{BackendCommand, SubmissionSpec};
use crate::controller::events::{UiError, UiErrorContext, UiEvent};
use crate::controller::orchestration::dispatch_backend_command;

const COIN_SIZE: f32 = 30.0;

/// UI-side mirror of the mini-game, fed from overlay events.
#[derive(Default)]
struct GameView {
    open: bool,
    score: u32,
    coins: BTreeMap<u64, (f32, f32)>,
}

struct NoticeView {
    title: String,
    message: String,
}

impl NoticeView {
    fn from_notice(notice: &Notice) -> Self {
        let title = match notice.kind {
            NoticeKind::Success => "Done",
            NoticeKind::ProcessingFailed => "Processing failed",
            NoticeKind::ConnectionFailed => "Connection problem",
        };
        Self {
            title: title.to_string(),
            message: notice.message.clone(),
        }
    }
}

pub struct ToolboxApp {
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    active_tool: ToolKind,
    convert_file: Option<PathBuf>,
    generate_text: String,
    generate_logo: Option<PathBuf>,
    merge_files: Vec<PathBuf>,
    compress_file: Option<PathBuf>,
    status: String,
    notice: Option<NoticeView>,
    game: GameView,
}

impl ToolboxApp {
    pub fn new(cmd_tx: Sender<BackendCommand>, ui_rx: Receiver<UiEvent>) -> Self {
        Self {
            cmd_tx,
            ui_rx,
            active_tool: ToolKind::Convert,
            convert_file: None,
            generate_text: String::new(),
            generate_logo: None,
            merge_files: Vec::new(),
            compress_file: None,
            status: String::new(),
            notice: None,
            game: GameView::default(),
        }
    }

    fn dispatch(&mut self, cmd: BackendCommand) {
        dispatch_backend_command(&self.cmd_tx, cmd, &mut self.status);
    }

    fn show_validation(&mut self, error: ValidationError) {
        self.notice = Some(NoticeView {
            title: "Check your input".to_string(),
            message: error.to_string(),
        });
    }

    fn drain_backend_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::Notice(notice) => {
                    self.notice = Some(NoticeView::from_notice(&notice));
                }
                UiEvent::Error(error) => {
                    tracing::warn!(
                        category = ?error.category(),
                        context = ?error.context(),
                        "backend error"
                    );
                    self.notice = Some(NoticeView {
                        title: "Something went wrong".to_string(),
                        message: error.message().to_string(),
                    });
                }
                UiEvent::Game(event) => self.apply_game_event(event),
            }
        }
    }

    fn apply_game_event(&mut self, event: OverlayEvent) {
        match event {
            OverlayEvent::Opened => {
                self.game = GameView {
                    open: true,
                    ..GameView::default()
                };
            }
            OverlayEvent::CoinSpawned { id, x, y } => {
                if self.game.open {
                    self.game.coins.insert(id, (x, y));
                }
            }
            OverlayEvent::CoinExpired { id } => {
                self.game.coins.remove(&id);
            }
            OverlayEvent::CoinCollected { id, score } => {
                self.game.coins.remove(&id);
                self.game.score = score;
            }
            OverlayEvent::Closed => {
                self.game = GameView::default();
            }
        }
    }

    fn submit_convert(&mut self) {
        let Some(file) = self.convert_file.clone() else {
            self.show_validation(ValidationError::MissingFile {
                tool: ToolKind::Convert,
            });
            return;
        };
        self.dispatch(BackendCommand::Submit {
            submission: SubmissionSpec::Convert { file },
        });
    }

    fn submit_generate(&mut self) {
        if self.generate_text.trim().is_empty() {
            self.show_validation(ValidationError::MissingText);
            return;
        }
        self.dispatch(BackendCommand::Submit {
            submission: SubmissionSpec::Generate {
                text: self.generate_text.clone(),
                logo: self.generate_logo.clone(),
            },
        });
    }

    fn submit_merge(&mut self) {
        if self.merge_files.len() < MERGE_MIN_FILES {
            self.show_validation(ValidationError::NotEnoughFiles {
                required: MERGE_MIN_FILES,
                actual: self.merge_files.len(),
            });
            return;
        }
        self.dispatch(BackendCommand::Submit {
            submission: SubmissionSpec::Merge {
                files: self.merge_files.clone(),
            },
        });
    }

    fn submit_compress(&mut self) {
        let Some(file) = self.compress_file.clone() else {
            self.show_validation(ValidationError::MissingFile {
                tool: ToolKind::Compress,
            });
            return;
        };
        self.dispatch(BackendCommand::Submit {
            submission: SubmissionSpec::Compress { file },
        });
    }

    fn tool_panel(&mut self, ui: &mut egui::Ui) {
        match self.active_tool {
            ToolKind::Convert => {
                ui.label("Convert a HEIC photo to a regular image.");
                ui.horizontal(|ui| {
                    if ui.button("Choose file…").clicked() {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("HEIC image", &["heic", "heif"])
                            .pick_file()
                        {
                            self.convert_file = Some(path);
                        }
                    }
                    ui.label(file_preview(self.convert_file.as_deref()));
                });
                if ui.button("Convert").clicked() {
                    self.submit_convert();
                }
            }
            ToolKind::Generate => {
                ui.label("Text or link to encode:");
                ui.text_edit_singleline(&mut self.generate_text);
                ui.horizontal(|ui| {
                    if ui.button("Choose logo (optional)…").clicked() {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("Image", &["png", "jpg", "jpeg"])
                            .pick_file()
                        {
                            self.generate_logo = Some(path);
                        }
                    }
                    ui.label(file_preview(self.generate_logo.as_deref()));
                    if self.generate_logo.is_some() && ui.button("Clear").clicked() {
                        self.generate_logo = None;
                    }
                });
                if ui.button("Generate").clicked() {
                    self.submit_generate();
                }
            }
            ToolKind::Merge => {
                ui.label("Merge two or more PDFs in the order picked.");
                ui.horizontal(|ui| {
                    if ui.button("Choose PDFs…").clicked() {
                        if let Some(paths) = rfd::FileDialog::new()
                            .add_filter("PDF", &["pdf"])
                            .pick_files()
                        {
                            self.merge_files = paths;
                        }
                    }
                    ui.label(files_preview(&self.merge_files));
                });
                if ui.button("Merge").clicked() {
                    self.submit_merge();
                }
            }
            ToolKind::Compress => {
                ui.label("Shrink an image for sharing.");
                ui.horizontal(|ui| {
                    if ui.button("Choose image…").clicked() {
                        if let Some(path) = rfd::FileDialog::new()
                            .add_filter("Image", &["png", "jpg", "jpeg", "webp"])
                            .pick_file()
                        {
                            self.compress_file = Some(path);
                        }
                    }
                    ui.label(file_preview(self.compress_file.as_deref()));
                });
                if ui.button("Compress").clicked() {
                    self.submit_compress();
                }
            }
        }
    }

    fn game_window(&mut self, ctx: &egui::Context) {
        if !self.game.open {
            return;
        }
        let board = OverlayConfig::default().board_size;

        egui::Window::new("Catch the coins!")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label(format!("Score: {}", self.game.score));

                let (board_rect, _) =
                    ui.allocate_exact_size(egui::vec2(board, board), egui::Sense::hover());
                ui.painter().rect_filled(board_rect, 8.0, egui::Color32::from_gray(28));
                let coins: Vec<(u64, (f32, f32))> =
                    self.game.coins.iter().map(|(id, pos)| (*id, *pos)).collect();
                for (id, (x, y)) in coins {
                    let coin_rect = egui::Rect::from_min_size(
                        board_rect.min + egui::vec2(x, y),
                        egui::vec2(COIN_SIZE, COIN_SIZE),
                    );
                    let coin = egui::Button::new(egui::RichText::new("💰").size(22.0)).frame(false);
                    if ui.put(coin_rect, coin).clicked() {
                        self.game.coins.remove(&id);
                        self.dispatch(BackendCommand::CollectCoin { coin_id: id });
                    }
                }

                ui.label("Processing your file…");
                if ui.button("Cancel").clicked() {
                    self.dispatch(BackendCommand::CancelOverlay);
                }
            });

        // Keep coins moving in and out while the game is on screen.
        ctx.request_repaint_after(Duration::from_millis(50));
    }

    fn notice_window(&mut self, ctx: &egui::Context) {
        let Some(notice) = self.notice.as_ref() else {
            return;
        };
        let title = notice.title.clone();
        let message = notice.message.clone();

        let mut dismissed = false;
        egui::Window::new(title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label(message);
                if ui.button("OK").clicked() {
                    dismissed = true;
                }
            });
        if dismissed {
            self.notice = None;
        }
    }
}

impl eframe::App for ToolboxApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_backend_events();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("Toolbox");
            if !self.status.is_empty() {
                ui.colored_label(egui::Color32::LIGHT_RED, &self.status);
            }
            ui.separator();

            ui.horizontal(|ui| {
                for tool in ToolKind::ALL {
                    if ui
                        .selectable_label(self.active_tool == tool, tool.label())
                        .clicked()
                    {
                        self.active_tool = tool;
                    }
                }
            });
            ui.separator();

            self.tool_panel(ui);
        });

        self.game_window(ctx);
        self.notice_window(ctx);
    }
}

fn file_preview(path: Option<&Path>) -> String {
    match path.and_then(|p| p.file_name()).and_then(|n| n.to_str()) {
        Some(name) => name.to_string(),
        None => "No file selected".to_string(),
    }
}

fn files_preview(paths: &[PathBuf]) -> String {
    match paths.len() {
        0 => "No files selected".to_string(),
        n => format!("{n} files selected"),
    }
}

pub fn start_backend_bridge(cmd_rx: Receiver<BackendCommand>, ui_tx: Sender<UiEvent>) {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.send(UiEvent::Error(UiError::from_message(
                    UiErrorContext::BackendStartup,
                    format!("failed to build backend runtime: {err}"),
                )));
                return;
            }
        };
        run_backend(&runtime, cmd_rx, ui_tx);
    });
}

fn run_backend(
    runtime: &tokio::runtime::Runtime,
    cmd_rx: Receiver<BackendCommand>,
    ui_tx: Sender<UiEvent>,
) {
    let settings = client_core::load_settings();
    if let Err(err) = client_core::prepare_server_url(&settings.server_url) {
        let _ = ui_tx.send(UiEvent::Error(UiError::from_message(
            UiErrorContext::BackendStartup,
            err.to_string(),
        )));
    }
    if let Err(err) = client_core::ensure_download_dir(&settings) {
        let _ = ui_tx.send(UiEvent::Error(UiError::from_message(
            UiErrorContext::BackendStartup,
            err.to_string(),
        )));
    }

    let game = Arc::new(Overlay::new());
    let client = ToolboxClient::new_with_overlay(
        settings,
        Arc::clone(&game) as Arc<dyn DistractionOverlay>,
    );

    {
        let mut game_events = game.subscribe_events();
        let ui_tx = ui_tx.clone();
        runtime.spawn(async move {
            while let Ok(event) = game_events.recv().await {
                if ui_tx.send(UiEvent::Game(event)).is_err() {
                    return;
                }
            }
        });
    }
    {
        let mut client_events = client.subscribe_events();
        let ui_tx = ui_tx.clone();
        runtime.spawn(async move {
            while let Ok(event) = client_events.recv().await {
                if let ClientEvent::Notice(notice) = event {
                    if ui_tx.send(UiEvent::Notice(notice)).is_err() {
                        return;
                    }
                }
            }
        });
    }

    while let Ok(command) = cmd_rx.recv() {
        match command {
            BackendCommand::Submit { submission } => {
                let client = Arc::clone(&client);
                let ui_tx = ui_tx.clone();
                runtime.spawn(async move {
                    if let Err(err) = run_submission(client, submission).await {
                        let _ = ui_tx.send(UiEvent::Error(UiError::from_message(
                            UiErrorContext::Submit,
                            err.to_string(),
                        )));
                    }
                });
            }
            BackendCommand::CollectCoin { coin_id } => {
                let game = Arc::clone(&game);
                runtime.spawn(async move {
                    let _ = game.collect(coin_id).await;
                });
            }
            BackendCommand::CancelOverlay => {
                // Tears down the game only; an in-flight request keeps
                // running and its own overlay close becomes a no-op.
                let game = Arc::clone(&game);
                runtime.spawn(async move {
                    game.close().await;
                });
            }
        }
    }
}

async fn run_submission(
    client: Arc<ToolboxClient>,
    submission: SubmissionSpec,
) -> anyhow::Result<()> {
    let request = load_request(submission).await?;
    client.submit(request).await?;
    Ok(())
}

async fn load_request(submission: SubmissionSpec) -> anyhow::Result<ToolRequest> {
    Ok(match submission {
        SubmissionSpec::Convert { file } => ToolRequest::Convert {
            file: Some(read_part(&file).await?),
        },
        SubmissionSpec::Generate { text, logo } => ToolRequest::Generate {
            text,
            logo: match logo {
                Some(path) => Some(read_part(&path).await?),
                None => None,
            },
        },
        SubmissionSpec::Merge { files } => {
            let mut parts = Vec::with_capacity(files.len());
            for path in &files {
                parts.push(read_part(path).await?);
            }
            ToolRequest::Merge { files: parts }
        }
        SubmissionSpec::Compress { file } => ToolRequest::Compress {
            file: Some(read_part(&file).await?),
        },
    })
}

async fn read_part(path: &Path) -> anyhow::Result<FilePart> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload")
        .to_string();
    Ok(FilePart::new(filename, bytes))
}
