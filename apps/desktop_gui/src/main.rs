mod backend_bridge;
mod controller;
mod ui;

use anyhow::Result;
use crossbeam_channel::bounded;

fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let (cmd_tx, cmd_rx) = bounded(64);
    let (ui_tx, ui_rx) = bounded(256);
    backend_bridge::runtime::launch(cmd_rx, ui_tx);

    let options = eframe::NativeOptions::default();
    eframe::run_native(
        "Toolbox",
        options,
        Box::new(move |_cc| Ok(Box::new(ui::app::ToolboxApp::new(cmd_tx, ui_rx)))),
    )
    .map_err(|err| anyhow::anyhow!("failed to run desktop ui: {err}"))
}
