use crate::error::{ErrorKind, Result};
use crate::http;
use crate::pipeline::Pipeline;
use clap::{Parser, Subcommand};
use exn::ResultExt;
use futures::TryStreamExt;
use pressroom_config::Config;
use pressroom_transform::Tool;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

#[derive(Debug, Parser)]
#[command(name = "pressroom", version, about)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON).
    #[arg(long, short, global = true, env = "PRESSROOM_CONFIG")]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the HTTP service.
    Serve {
        /// Overrides `server.bind`.
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Compress local PDFs into one archive without starting the server.
    Compress {
        /// Where to write the archive (or the single compressed file).
        #[arg(long, short)]
        output: PathBuf,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Print the Ghostscript executable that would be used.
    Discover,
}

pub async fn run(command: Command, config: Config) -> Result<()> {
    match command {
        Command::Serve { bind } => {
            let bind = bind.unwrap_or(config.server.bind);
            http::serve(&config, bind).await
        },
        Command::Compress { output, files } => compress(config, &files, &output).await,
        Command::Discover => {
            let tool = Tool::locate(config.transform.program.as_deref()).or_raise(|| ErrorKind::Tool)?;
            println!("{}", tool.path().display());
            Ok(())
        },
    }
}

async fn compress(mut config: Config, files: &[PathBuf], output: &Path) -> Result<()> {
    // Private root, so a server sharing the storage root is left alone.
    let root = config.storage.root.join(format!("cli-{}", std::process::id()));
    config.storage.root = root.clone();
    let result = compress_into(&config, files, output).await;
    if let Err(e) = tokio::fs::remove_dir_all(&root).await {
        tracing::debug!(root = %root.display(), error = %e, "Failed to remove scratch root");
    }
    result
}

async fn compress_into(config: &Config, files: &[PathBuf], output: &Path) -> Result<()> {
    let pipeline = Pipeline::from_config(config).await?;
    let mut uploads = pipeline.uploads();
    for path in files {
        let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let data = tokio::fs::read(path).await.or_raise(|| ErrorKind::Intake(path.display().to_string()))?;
        uploads.store(&name, &data).await?;
    }

    let processed = pipeline.process(uploads.into_files()).await?;
    if processed.failed > 0 {
        tracing::warn!(failed = processed.failed, "Some files could not be compressed");
    }
    let download = pipeline.download(&processed.id.to_string()).await?;
    let written = write_body(download.body, output).await;
    if written.is_err() {
        let _ = tokio::fs::remove_file(output).await;
    }
    written?;
    tracing::info!(output = %output.display(), files = processed.file_count, bytes = download.size, "Wrote {}", download.filename);
    Ok(())
}

async fn write_body(mut body: pressroom_storage::backend::ByteStream, output: &Path) -> Result<()> {
    let raise = || ErrorKind::Output(output.display().to_string());
    let mut file = tokio::fs::File::create(output).await.or_raise(raise)?;
    while let Some(chunk) = body.try_next().await.or_raise(raise)? {
        file.write_all(&chunk).await.or_raise(raise)?;
    }
    file.flush().await.or_raise(raise)
}
