use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{ensure_download_dir, load_settings, prepare_server_url, ToolboxClient};
use shared::domain::{FilePart, Notice, SubmissionOutcome, ToolRequest};

#[derive(Parser, Debug)]
struct Cli {
    /// Server base url; overrides toolbox.toml and the environment.
    #[arg(long)]
    server_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a HEIC photo.
    Convert {
        #[arg(long)]
        file: std::path::PathBuf,
    },
    /// Generate a QR code, optionally with a logo in the middle.
    Generate {
        #[arg(long)]
        text: String,
        #[arg(long)]
        logo: Option<std::path::PathBuf>,
    },
    /// Merge two or more PDFs in the given order.
    Merge { files: Vec<std::path::PathBuf> },
    /// Compress an image.
    Compress {
        #[arg(long)]
        file: std::path::PathBuf,
    },
}

fn read_part(path: &Path) -> Result<FilePart> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read '{}'", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("upload")
        .to_string();
    Ok(FilePart::new(filename, bytes))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(server_url) = cli.server_url {
        settings.server_url = prepare_server_url(&server_url)?;
    }
    ensure_download_dir(&settings)?;

    let request = match cli.command {
        Command::Convert { file } => ToolRequest::Convert {
            file: Some(read_part(&file)?),
        },
        Command::Generate { text, logo } => ToolRequest::Generate {
            text,
            logo: logo.as_deref().map(read_part).transpose()?,
        },
        Command::Merge { files } => ToolRequest::Merge {
            files: files
                .iter()
                .map(|path| read_part(path))
                .collect::<Result<_>>()?,
        },
        Command::Compress { file } => ToolRequest::Compress {
            file: Some(read_part(&file)?),
        },
    };

    let client = ToolboxClient::new(settings);
    match client.submit(request).await? {
        SubmissionOutcome::Saved { path, size_bytes } => {
            println!("saved {} ({size_bytes} bytes)", path.display());
        }
        outcome @ (SubmissionOutcome::ServerError { .. }
        | SubmissionOutcome::TransportError { .. }) => {
            eprintln!("{}", Notice::from(&outcome).message);
            std::process::exit(1);
        }
    }

    Ok(())
}
