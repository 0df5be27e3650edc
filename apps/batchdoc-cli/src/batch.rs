//! One batch: load the files into a session, run the mode, collect results

use crate::worker::ThreadWorker;
use anyhow::{bail, Context, Result};
use batchdoc_core::session::RejectedFile;
use batchdoc_core::{
    IncomingFile, Mode, ProgressSink, ProgressUpdate, RunConfig, RunReport, Services, Session,
    SessionConfig, SystemClock,
};
use batchdoc_core::{MemoryAllocator, Worker};
use std::path::Path;
use tracing::{info, warn};

/// Everything a batch needs besides the collaborators
#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub session: SessionConfig,
    pub mode: Mode,
    pub files: Vec<IncomingFile>,
    /// Input positions to select; empty means every file
    pub select: Vec<usize>,
    pub run: RunConfig,
    pub use_worker: bool,
}

#[derive(Debug)]
pub struct BatchResult {
    pub report: RunReport,
    pub rejected: Vec<RejectedFile>,
    /// Names left in the session after the run, in order
    pub remaining: Vec<String>,
}

/// Logs each progress report
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&mut self, update: &ProgressUpdate) {
        match &update.timing {
            Some(timing) => info!(
                processed = update.processed,
                total = update.total,
                remaining = %timing.remaining,
                "{}",
                update.label
            ),
            None => info!(processed = update.processed, total = update.total, "{}", update.label),
        }
    }
}

/// Read `path` into an upload, guessing the declared type from its extension
pub fn load_upload(path: &Path, bytes: Vec<u8>) -> Result<IncomingFile> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Input has no usable file name: {}", path.display()))?;
    Ok(IncomingFile::new(name, mime_for(name), bytes))
}

/// Declared MIME type from the extension; empty when unknown
pub fn mime_for(name: &str) -> &'static str {
    match batchdoc_core::media::extension(name).as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        Some("heic") => "image/heic",
        Some("heif") => "image/heif",
        _ => "",
    }
}

pub fn process(request: BatchRequest) -> Result<BatchResult> {
    request
        .session
        .validate()
        .context("Invalid session configuration")?;

    let mut session: Session<MemoryAllocator, SystemClock> =
        Session::new(request.session, MemoryAllocator::new());
    session.set_mode(request.mode);

    let ingest = session.ingest(request.files, None)?;
    for rejected in &ingest.rejected {
        warn!(name = %rejected.name, "{}", rejected.rejection.reason);
    }
    if session.is_empty() {
        bail!("No files accepted for {} mode", request.mode);
    }

    for index in request.select {
        // Positions refer to the files that were accepted
        if index >= session.len() {
            bail!("Selected index {} is out of range (0-{})", index, session.len() - 1);
        }
        if !session.registry().is_selected(index) {
            session.toggle(index);
        }
    }

    let worker = if request.use_worker {
        match ThreadWorker::resize() {
            Ok(worker) => Some(worker),
            Err(e) => {
                warn!(error = %e, "Resize worker unavailable, processing inline");
                None
            }
        }
    } else {
        None
    };
    let mut services = Services::builtin();
    if let Some(worker) = &worker {
        services = services.with_worker(worker as &dyn Worker);
    }

    let report = session.run(&request.run, services, &mut LogProgress)?;
    let remaining = session
        .registry()
        .entries()
        .iter()
        .map(|e| e.name().to_string())
        .collect();

    Ok(BatchResult {
        report,
        rejected: ingest.rejected,
        remaining,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_mime_for_known_extensions() {
        assert_eq!(mime_for("scan.JPG"), "image/jpeg");
        assert_eq!(mime_for("doc.pdf"), "application/pdf");
        assert_eq!(mime_for("photo.heic"), "image/heic");
        assert_eq!(mime_for("notes.txt"), "");
    }

    #[test]
    fn test_load_upload_uses_file_name() {
        let file = load_upload(Path::new("/tmp/in/a.png"), vec![1, 2]).unwrap();
        assert_eq!(file.name, "a.png");
        assert_eq!(file.declared_mime, "image/png");
    }

    #[test]
    fn test_nothing_accepted_is_an_error() {
        let request = BatchRequest {
            session: SessionConfig::default(),
            mode: Mode::Merge,
            files: vec![IncomingFile::new("a.png", "image/png", vec![0x89, 0x50, 0x4E, 0x47])],
            select: Vec::new(),
            run: RunConfig::default(),
            use_worker: false,
        };
        let err = process(request).unwrap_err();
        assert!(err.to_string().contains("No files accepted"));
    }
}
