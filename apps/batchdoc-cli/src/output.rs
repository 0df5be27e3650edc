//! Writing artifacts and the run summary

use crate::batch::BatchResult;
use anyhow::{Context, Result};
use batchdoc_core::media::{format_bytes, sanitize_file_name};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Write the artifact (if any) under `dir`; returns where it went
pub async fn write_artifact(result: &BatchResult, dir: &Path) -> Result<Option<PathBuf>> {
    let Some(artifact) = &result.report.outcome.artifact else {
        return Ok(None);
    };
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    let path = dir.join(sanitize_file_name(&artifact.file_name));
    tokio::fs::write(&path, &artifact.bytes)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(Some(path))
}

/// Human readable report printed to stdout
pub fn summary(result: &BatchResult, written: Option<&Path>) -> String {
    let outcome = &result.report.outcome;
    let mut out = String::new();

    let _ = writeln!(out, "{}", outcome.message);
    if let Some(path) = written {
        let size = outcome
            .artifact
            .as_ref()
            .map(|a| a.bytes.len() as u64)
            .unwrap_or(0);
        let _ = writeln!(out, "Wrote {} ({})", path.display(), format_bytes(size));
    }
    if let Some(stats) = outcome.stats {
        let _ = writeln!(
            out,
            "Size: {} -> {} ({:.1}% saved)",
            format_bytes(stats.original_bytes),
            format_bytes(stats.output_bytes),
            stats.saved_percent()
        );
    }
    if outcome.skipped > 0 {
        let _ = writeln!(out, "Skipped: {}", outcome.skipped);
    }
    for rejected in &result.rejected {
        let _ = writeln!(out, "Rejected {}: {}", rejected.name, rejected.rejection.reason);
    }
    for warning in &outcome.warnings {
        let _ = writeln!(out, "Warning: {}", warning);
    }
    if !outcome.removed.is_empty() {
        let _ = writeln!(out, "Remaining: {}", result.remaining.join(", "));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use batchdoc_core::{Artifact, RunOutcome, RunReport, SizeStats};
    use pretty_assertions::assert_eq;

    fn result(outcome: RunOutcome) -> BatchResult {
        BatchResult {
            report: RunReport {
                outcome,
                download: None,
                restored: 0,
            },
            rejected: Vec::new(),
            remaining: vec!["b.png".to_string()],
        }
    }

    #[test]
    fn test_summary_lists_stats_and_warnings() {
        let text = summary(
            &result(RunOutcome {
                message: "Compressed 1 image(s)".to_string(),
                warnings: vec!["Failed to process x.png: Image codec error: bad".to_string()],
                stats: Some(SizeStats {
                    original_bytes: 2048,
                    output_bytes: 1024,
                }),
                ..RunOutcome::default()
            }),
            None,
        );
        assert_eq!(
            text,
            "Compressed 1 image(s)\n\
             Size: 2.0 KB -> 1.0 KB (50.0% saved)\n\
             Warning: Failed to process x.png: Image codec error: bad\n"
        );
    }

    #[test]
    fn test_summary_shows_remaining_after_delete() {
        let text = summary(
            &result(RunOutcome {
                message: "1 file(s) deleted successfully!".to_string(),
                removed: vec![0],
                ..RunOutcome::default()
            }),
            None,
        );
        assert!(text.ends_with("Remaining: b.png\n"));
    }

    #[tokio::test]
    async fn test_write_artifact_into_new_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested");
        let batch = result(RunOutcome {
            artifact: Some(Artifact {
                file_name: "merged_2_files_1.pdf".to_string(),
                mime: "application/pdf".to_string(),
                bytes: b"%PDF-1.7".to_vec(),
            }),
            ..RunOutcome::default()
        });

        let path = write_artifact(&batch, &out).await.unwrap().unwrap();
        assert_eq!(path, out.join("merged_2_files_1.pdf"));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7");
    }

    #[tokio::test]
    async fn test_no_artifact_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_artifact(&result(RunOutcome::default()), dir.path())
            .await
            .unwrap();
        assert!(written.is_none());
    }
}
