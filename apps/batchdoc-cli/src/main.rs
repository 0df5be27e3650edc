//! batchdoc binary
//!
//! Entry point for running one processing mode over files on disk.

use anyhow::{Context, Result};
use batchdoc_cli::batch::load_upload;
use batchdoc_cli::{output, process, Args, BatchRequest};
use clap::Parser;
use tokio::task::JoinSet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries the summary
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("batchdoc v{} ({} mode)", env!("CARGO_PKG_VERSION"), args.mode);

    let session = args.session_config()?;
    let run = args.run_config()?;

    let mut reads = JoinSet::new();
    for (position, path) in args.inputs.iter().cloned().enumerate() {
        reads.spawn(async move {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            anyhow::Ok((position, load_upload(&path, bytes)?))
        });
    }
    let mut files = Vec::with_capacity(args.inputs.len());
    while let Some(read) = reads.join_next().await {
        files.push(read.context("Input reader task failed")??);
    }
    files.sort_by_key(|(position, _)| *position);

    let request = BatchRequest {
        session,
        mode: args.mode,
        files: files.into_iter().map(|(_, file)| file).collect(),
        select: args.select.clone(),
        run,
        use_worker: !args.no_worker,
    };
    let result = tokio::task::spawn_blocking(move || process(request))
        .await
        .context("Batch task failed")??;

    let written = output::write_artifact(&result, &args.output_dir).await?;
    print!("{}", output::summary(&result, written.as_deref()));

    Ok(())
}
