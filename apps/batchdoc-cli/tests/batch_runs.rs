//! End-to-end batches through the CLI driver

use batchdoc_cli::{process, BatchRequest};
use batchdoc_core::services::JpegPage;
use batchdoc_core::{
    Bitmap, ImageCodec, ImageCrateCodec, ImageFormat, IncomingFile, LopdfService, Mode,
    PdfService, RunConfig, SessionConfig,
};
use pretty_assertions::assert_eq;

fn png(name: &str, width: u32, height: u32) -> IncomingFile {
    let bytes = ImageCrateCodec
        .encode(&Bitmap::solid(width, height, [200, 40, 40, 255]), ImageFormat::Png, 100)
        .unwrap();
    IncomingFile::new(name, "image/png", bytes)
}

fn pdf(name: &str, pages: usize) -> IncomingFile {
    let jpeg = ImageCrateCodec
        .encode(&Bitmap::solid(8, 8, [0, 0, 0, 255]), ImageFormat::Jpeg, 80)
        .unwrap();
    let pages: Vec<JpegPage> = (0..pages)
        .map(|_| JpegPage {
            jpeg: jpeg.clone(),
            width: 8,
            height: 8,
        })
        .collect();
    IncomingFile::new(name, "application/pdf", LopdfService.images_to_pdf(&pages).unwrap())
}

fn request(mode: Mode, files: Vec<IncomingFile>) -> BatchRequest {
    BatchRequest {
        session: SessionConfig::default(),
        mode,
        files,
        select: Vec::new(),
        run: RunConfig::default(),
        use_worker: false,
    }
}

#[test]
fn merge_two_documents() {
    let result = process(request(Mode::Merge, vec![pdf("a.pdf", 2), pdf("b.pdf", 3)])).unwrap();

    let artifact = result.report.outcome.artifact.unwrap();
    assert!(artifact.file_name.starts_with("merged_2_files_"));
    assert!(artifact.bytes.starts_with(b"%PDF"));
    assert_eq!(LopdfService.page_count(&artifact.bytes).unwrap(), 5);
}

#[test]
fn compress_on_worker_thread() {
    let mut req = request(Mode::Compress, vec![png("a.png", 64, 32), png("b.png", 16, 16)]);
    req.session.workers.offload_min_bytes = 0;
    req.run.compress_max_width = Some(32);
    req.use_worker = true;

    let result = process(req).unwrap();
    let outcome = &result.report.outcome;
    assert_eq!(outcome.processed, 2);
    assert!(outcome.warnings.is_empty());
    let artifact = outcome.artifact.as_ref().unwrap();
    assert!(artifact.file_name.starts_with("compressed_"));
    assert!(artifact.bytes.starts_with(b"PK"));
}

#[test]
fn selection_limits_the_run() {
    let mut req = request(
        Mode::Filter,
        vec![png("a.png", 4, 4), png("b.png", 4, 4), png("c.png", 4, 4)],
    );
    req.select = vec![1];

    let result = process(req).unwrap();
    assert_eq!(result.report.outcome.processed, 1);
    assert_eq!(result.report.restored, 1);
}

#[test]
fn delete_reports_remaining_files() {
    let mut req = request(Mode::Delete, vec![png("a.png", 4, 4), png("b.png", 4, 4)]);
    req.select = vec![0];

    let result = process(req).unwrap();
    assert_eq!(result.report.outcome.removed, vec![0]);
    assert_eq!(result.remaining, vec!["b.png".to_string()]);
    assert!(result.report.outcome.artifact.is_none());
}

#[test]
fn rejected_uploads_are_reported() {
    let result = process(request(
        Mode::Rotate,
        vec![
            png("a.png", 4, 4),
            IncomingFile::new("fake.png", "image/png", b"GIF89a".to_vec()),
        ],
    ))
    .unwrap();

    assert_eq!(result.rejected.len(), 1);
    assert_eq!(result.rejected[0].name, "fake.png");
    assert_eq!(result.report.outcome.processed, 1);
}

#[test]
fn out_of_range_selection_fails() {
    let mut req = request(Mode::Rotate, vec![png("a.png", 4, 4)]);
    req.select = vec![3];
    assert!(process(req).is_err());
}
