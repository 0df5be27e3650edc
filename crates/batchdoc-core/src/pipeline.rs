//! Batch pipeline
//!
//! A run takes the active mode, the files it applies to (in registry order)
//! and an up-front [`RunConfig`], and routes each file to its collaborators.
//! Per-file failures become warnings; the run itself fails only on timeout,
//! cancellation, a missing collaborator or when nothing survives.

use crate::archive::ZipArchiver;
use crate::clock::Clock;
use crate::codec::{quality_percent, ImageCrateCodec, EDIT_QUALITY, PDF_PAGE_QUALITY};
use crate::config::{PipelineConfig, WorkerConfig};
use crate::error::{BatchDocError, CollaboratorError, Result};
use crate::imaging::{self, EditRecipe, Filter};
use crate::media::{base_name, replace_extension, sanitize_file_name, with_suffix, FileEntry, PDF_MIME};
use crate::mode::Mode;
use crate::pdf::{LopdfService, PageSelector};
use crate::progress::{ProgressSink, ProgressTimer, ProgressUpdate};
use crate::services::{
    ArchiveEntry, ArchiveService, Bitmap, HeicDecoder, ImageCodec, ImageFormat, JpegPage, OcrService,
    PageRenderer, PdfService, ServiceResult,
};
use crate::worker::{InlineWorker, Offload, Worker, WorkerKind, WorkerRequest};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::time::Duration;
use tracing::{info, warn};

const ZIP_MIME: &str = "application/zip";
const TEXT_MIME: &str = "text/plain";

/// Largest rotation accepted either way, in degrees
pub const MAX_ROTATION: i32 = 360;

/// Choices collected before a run starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Degrees clockwise
    pub rotation: i32,
    pub filter: Filter,
    pub target_format: ImageFormat,
    /// 0.0..=1.0
    pub convert_quality: f32,
    /// 0.0..=1.0
    pub compress_quality: f32,
    pub compress_max_width: Option<u32>,
    pub compress_max_height: Option<u32>,
    /// 0.0..=1.0
    pub heic_quality: f32,
    pub split: PageSelector,
    pub edit: EditRecipe,
    pub ocr_language: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            rotation: 90,
            filter: Filter::Grayscale,
            target_format: ImageFormat::Jpeg,
            convert_quality: 0.92,
            compress_quality: 0.8,
            compress_max_width: None,
            compress_max_height: None,
            heic_quality: 0.9,
            split: PageSelector::EachPage,
            edit: EditRecipe::default(),
            ocr_language: "eng".to_string(),
        }
    }
}

impl RunConfig {
    /// Check the parts of the configuration `mode` reads
    pub fn validate_for(&self, mode: Mode) -> Result<()> {
        let invalid = |msg: String| Err(BatchDocError::InvalidRunConfig(msg));
        let check_quality = |name: &str, q: f32| {
            if q > 0.0 && q <= 1.0 {
                Ok(())
            } else {
                invalid(format!("{} must be within (0, 1], got {}", name, q))
            }
        };

        match mode {
            Mode::Rotate if !(-MAX_ROTATION..=MAX_ROTATION).contains(&self.rotation) => invalid(
                "Invalid angle! Please enter a number between -360 and 360".to_string(),
            ),
            Mode::Convert => check_quality("convert_quality", self.convert_quality),
            Mode::Compress => check_quality("compress_quality", self.compress_quality),
            Mode::Jpeg => check_quality("heic_quality", self.heic_quality),
            Mode::Split => self.split.validate().map_err(BatchDocError::InvalidRange),
            Mode::Editor => self.edit.validate().map_err(BatchDocError::InvalidRunConfig),
            Mode::Ocr if self.ocr_language.trim().is_empty() => {
                invalid("OCR language must not be empty".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Downloadable product of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub file_name: String,
    pub mime: String,
    #[serde(skip)]
    pub bytes: Vec<u8>,
}

/// Before/after totals of a compress run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SizeStats {
    pub original_bytes: u64,
    pub output_bytes: u64,
}

impl SizeStats {
    /// Negative when the output grew
    pub fn saved_bytes(&self) -> i64 {
        self.original_bytes as i64 - self.output_bytes as i64
    }

    pub fn saved_percent(&self) -> f64 {
        if self.original_bytes == 0 {
            return 0.0;
        }
        self.saved_bytes() as f64 / self.original_bytes as f64 * 100.0
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOutcome {
    pub artifact: Option<Artifact>,
    /// Success line for the notice queue
    pub message: String,
    pub warnings: Vec<String>,
    pub processed: usize,
    pub skipped: usize,
    /// Registry slots to swap in place (editor)
    pub replaced: Vec<(usize, FileEntry)>,
    /// Registry slots to remove (delete)
    pub removed: Vec<usize>,
    pub stats: Option<SizeStats>,
}

impl RunOutcome {
    fn warn(&mut self, file: &FileEntry, source: CollaboratorError) {
        let message = BatchDocError::CollaboratorFailure {
            name: file.name().to_string(),
            source,
        }
        .to_string();
        warn!("{}", message);
        self.warnings.push(message);
    }
}

static PDF: LopdfService = LopdfService;
static CODEC: ImageCrateCodec = ImageCrateCodec;
static ARCHIVE: ZipArchiver = ZipArchiver::deflated();

/// Collaborators a run may call
#[derive(Clone, Copy)]
pub struct Services<'a> {
    pub pdf: &'a dyn PdfService,
    pub codec: &'a dyn ImageCodec,
    pub archive: &'a dyn ArchiveService,
    pub renderer: Option<&'a dyn PageRenderer>,
    pub ocr: Option<&'a dyn OcrService>,
    pub heic: Option<&'a dyn HeicDecoder>,
    pub resize_worker: Option<&'a dyn Worker>,
    pub render_worker: Option<&'a dyn Worker>,
}

impl Services<'static> {
    /// lopdf, `image` and `zip`; no renderer, OCR, HEIC decoder or workers
    pub fn builtin() -> Self {
        Self {
            pdf: &PDF,
            codec: &CODEC,
            archive: &ARCHIVE,
            renderer: None,
            ocr: None,
            heic: None,
            resize_worker: None,
            render_worker: None,
        }
    }
}

impl<'a> Services<'a> {
    pub fn with_ocr(mut self, ocr: &'a dyn OcrService) -> Self {
        self.ocr = Some(ocr);
        self
    }

    pub fn with_heic(mut self, heic: &'a dyn HeicDecoder) -> Self {
        self.heic = Some(heic);
        self
    }

    pub fn with_renderer(mut self, renderer: &'a dyn PageRenderer) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_worker(mut self, worker: &'a dyn Worker) -> Self {
        match worker.kind() {
            WorkerKind::Resize => self.resize_worker = Some(worker),
            WorkerKind::Render => self.render_worker = Some(worker),
        }
        self
    }
}

/// Deadline, yield and progress bookkeeping for one run
struct Batch<'p> {
    mode: Mode,
    total: usize,
    done: usize,
    clock: &'p dyn Clock,
    started_ms: u64,
    limit: Option<Duration>,
    yield_every: usize,
    timer: ProgressTimer,
    progress: &'p mut dyn ProgressSink,
}

impl<'p> Batch<'p> {
    fn item_done(&mut self, label: &str) -> Result<()> {
        self.done += 1;
        let now = self.clock.now_ms();
        self.check_deadline(now)?;

        let update = ProgressUpdate {
            processed: self.done,
            total: self.total,
            label: format!("{} {}/{}", label, self.done, self.total),
            timing: self.timer.update(self.done, now),
        };
        self.progress.report(&update);

        if self.done % self.yield_every == 0 && self.done < self.total {
            self.progress.yield_now();
            if self.progress.cancel_requested() {
                warn!(mode = %self.mode, done = self.done, "Run cancelled");
                return Err(BatchDocError::Cancelled);
            }
        }
        Ok(())
    }

    fn check_deadline(&self, now_ms: u64) -> Result<()> {
        match self.limit {
            Some(limit) if now_ms.saturating_sub(self.started_ms) > limit.as_millis() as u64 => {
                warn!(mode = %self.mode, limit_secs = limit.as_secs(), "Run timed out");
                Err(BatchDocError::OperationTimeout {
                    mode: self.mode,
                    limit,
                })
            }
            _ => Ok(()),
        }
    }

    /// Deadline check before the final collaborator call
    fn finish(&self) -> Result<()> {
        self.check_deadline(self.clock.now_ms())
    }
}

struct Run<'r> {
    services: &'r Services<'r>,
    offload: &'r Offload<'r>,
    config: &'r RunConfig,
    stamp: u64,
}

impl Run<'_> {
    fn zip(&self, file_name: String, entries: &[ArchiveEntry]) -> Result<Artifact> {
        let bytes = self
            .services
            .archive
            .create_archive(entries)
            .map_err(|source| BatchDocError::CollaboratorFailure {
                name: file_name.clone(),
                source,
            })?;
        Ok(Artifact {
            file_name: sanitize_file_name(&file_name),
            mime: ZIP_MIME.to_string(),
            bytes,
        })
    }

    /// Decode, transform and encode back into `format`
    fn recode(
        &self,
        file: &FileEntry,
        format: ImageFormat,
        quality: u8,
        transform: impl FnOnce(Bitmap) -> Bitmap,
    ) -> ServiceResult<Vec<u8>> {
        let codec = self.services.codec;
        let bitmap = transform(codec.decode(file.content())?);
        codec.encode(&bitmap, format, quality)
    }
}

fn unavailable(what: &'static str) -> BatchDocError {
    BatchDocError::CollaboratorFailure {
        name: what.to_string(),
        source: CollaboratorError::Unavailable(what),
    }
}

fn source_format(file: &FileEntry) -> ImageFormat {
    ImageFormat::from_mime(file.declared_mime()).unwrap_or_default()
}

fn passthrough(file: &FileEntry) -> ArchiveEntry {
    ArchiveEntry::new(file.name(), file.content().to_vec())
}

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

/// Routes runs to the configured collaborators
pub struct Dispatcher<'a> {
    services: Services<'a>,
    pipeline: &'a PipelineConfig,
    workers: &'a WorkerConfig,
    clock: &'a dyn Clock,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        services: Services<'a>,
        pipeline: &'a PipelineConfig,
        workers: &'a WorkerConfig,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            services,
            pipeline,
            workers,
            clock,
        }
    }

    /// Run `mode` over `inputs` (registry index, entry) in registry order.
    ///
    /// # Errors
    ///
    /// `InvalidRunConfig`/`InvalidRange` before any work, `OperationTimeout`
    /// or `Cancelled` mid-run (partial output dropped), `NothingToProcess`
    /// when no file produced output, `CollaboratorFailure` when a required
    /// collaborator is missing or the final assembly fails.
    pub fn run(
        &self,
        mode: Mode,
        inputs: &[(usize, FileEntry)],
        config: &RunConfig,
        progress: &mut dyn ProgressSink,
    ) -> Result<RunOutcome> {
        config.validate_for(mode)?;
        if inputs.is_empty() {
            return Err(BatchDocError::NothingToProcess(
                "No files to process!".to_string(),
            ));
        }

        let inline = InlineWorker {
            codec: self.services.codec,
            renderer: self.services.renderer,
        };
        let mut offload = Offload::new(&inline, self.workers);
        for worker in [self.services.resize_worker, self.services.render_worker]
            .into_iter()
            .flatten()
        {
            offload = offload.with_worker(worker);
        }

        let stamp = self.clock.now_ms();
        let mut batch = Batch {
            mode,
            total: inputs.len(),
            done: 0,
            clock: self.clock,
            started_ms: stamp,
            limit: self.pipeline.timeout_for(mode),
            yield_every: self.pipeline.yield_every.max(1),
            timer: ProgressTimer::start(inputs.len(), stamp),
            progress,
        };
        let run = Run {
            services: &self.services,
            offload: &offload,
            config,
            stamp,
        };

        info!(mode = %mode, files = inputs.len(), "Starting run");
        let outcome = match mode {
            Mode::Pdf => images_to_pdf(&run, &mut batch, inputs),
            Mode::Jpeg => heic_to_jpeg(&run, &mut batch, inputs),
            Mode::Merge => merge(&run, &mut batch, inputs),
            Mode::Split => split(&run, &mut batch, inputs),
            Mode::Compress => compress(&run, &mut batch, inputs),
            Mode::Rotate => rotate(&run, &mut batch, inputs),
            Mode::Filter => filter(&run, &mut batch, inputs),
            Mode::Convert => convert(&run, &mut batch, inputs),
            Mode::Editor => edit(&run, &mut batch, inputs),
            Mode::Delete => delete(&mut batch, inputs),
            Mode::Ocr => ocr(&run, &mut batch, inputs),
        }?;

        info!(
            mode = %mode,
            processed = outcome.processed,
            skipped = outcome.skipped,
            warnings = outcome.warnings.len(),
            "Run finished"
        );
        Ok(outcome)
    }
}

/// Per-file transform into an archive; failures and `None` pass the original through
fn map_to_archive<F>(
    batch: &mut Batch<'_>,
    inputs: &[(usize, FileEntry)],
    label: &str,
    outcome: &mut RunOutcome,
    mut transform: F,
) -> Result<Vec<ArchiveEntry>>
where
    F: FnMut(&FileEntry) -> ServiceResult<Option<ArchiveEntry>>,
{
    let mut entries = Vec::with_capacity(inputs.len());
    for (_, file) in inputs {
        match transform(file) {
            Ok(Some(entry)) => {
                outcome.processed += 1;
                entries.push(entry);
            }
            Ok(None) => {
                outcome.skipped += 1;
                entries.push(passthrough(file));
            }
            Err(e) => {
                outcome.warn(file, e);
                outcome.skipped += 1;
                entries.push(passthrough(file));
            }
        }
        batch.item_done(label)?;
    }
    Ok(entries)
}

fn images_to_pdf(run: &Run<'_>, batch: &mut Batch<'_>, inputs: &[(usize, FileEntry)]) -> Result<RunOutcome> {
    let mut outcome = RunOutcome::default();
    let mut pages = Vec::new();

    for (_, file) in inputs {
        if file.is_image() {
            let request = WorkerRequest::Resize {
                payload: file.content().to_vec(),
                width: None,
                height: None,
                quality: PDF_PAGE_QUALITY as f32 / 100.0,
            };
            match run.offload.run(&request) {
                Ok(out) => pages.push(JpegPage {
                    jpeg: out.bytes,
                    width: out.width,
                    height: out.height,
                }),
                Err(e) => outcome.warn(file, e),
            }
        } else {
            outcome.skipped += 1;
        }
        batch.item_done("Processing")?;
    }

    if pages.is_empty() {
        return Err(BatchDocError::NothingToProcess(
            "No images could be converted".to_string(),
        ));
    }
    batch.finish()?;

    let file_name = sanitize_file_name(&format!("converted_{}.pdf", run.stamp));
    let bytes = run
        .services
        .pdf
        .images_to_pdf(&pages)
        .map_err(|source| BatchDocError::CollaboratorFailure {
            name: file_name.clone(),
            source,
        })?;

    outcome.processed = pages.len();
    outcome.message = format!("PDF created successfully: {}", file_name);
    outcome.artifact = Some(Artifact {
        file_name,
        mime: PDF_MIME.to_string(),
        bytes,
    });
    Ok(outcome)
}

fn heic_to_jpeg(run: &Run<'_>, batch: &mut Batch<'_>, inputs: &[(usize, FileEntry)]) -> Result<RunOutcome> {
    let decoder = run.services.heic.ok_or_else(|| unavailable("HEIC decoder"))?;
    let mut outcome = RunOutcome::default();
    let mut entries = Vec::new();

    for (_, file) in inputs {
        match decoder.to_jpeg(file.content(), run.config.heic_quality) {
            Ok(images) if images.is_empty() => outcome.warn(
                file,
                CollaboratorError::Codec("no images in container".to_string()),
            ),
            Ok(images) => {
                let base = base_name(file.name());
                let single = images.len() == 1;
                for (i, jpeg) in images.into_iter().enumerate() {
                    let name = if single {
                        format!("{}.jpg", base)
                    } else {
                        format!("{}_{}.jpg", base, i + 1)
                    };
                    entries.push(ArchiveEntry::new(name, jpeg));
                }
                outcome.processed += 1;
            }
            Err(e) => {
                outcome.skipped += 1;
                outcome.warn(file, e);
            }
        }
        batch.item_done("Converting")?;
    }

    if entries.is_empty() {
        return Err(BatchDocError::NothingToProcess(
            "No HEIC files could be converted".to_string(),
        ));
    }
    batch.finish()?;

    outcome.artifact = Some(run.zip(format!("converted_images_{}.zip", run.stamp), &entries)?);
    outcome.message = "Images converted successfully!".to_string();
    Ok(outcome)
}

fn merge(run: &Run<'_>, batch: &mut Batch<'_>, inputs: &[(usize, FileEntry)]) -> Result<RunOutcome> {
    let pdfs: Vec<&FileEntry> = inputs.iter().map(|(_, f)| f).filter(|f| f.is_pdf()).collect();
    if pdfs.len() < 2 {
        return Err(BatchDocError::NothingToProcess(
            "Please select at least 2 PDF files to merge!".to_string(),
        ));
    }

    let mut outcome = RunOutcome {
        skipped: inputs.len() - pdfs.len(),
        ..RunOutcome::default()
    };
    let mut documents: Vec<&[u8]> = Vec::with_capacity(pdfs.len());
    let mut page_total = 0;

    for file in pdfs {
        match run.services.pdf.page_count(file.content()) {
            Ok(pages) => {
                page_total += pages;
                documents.push(file.content());
            }
            Err(e) => {
                outcome.skipped += 1;
                outcome.warn(file, e);
            }
        }
        batch.item_done("Loading")?;
    }

    if documents.is_empty() || page_total == 0 {
        return Err(BatchDocError::NothingToProcess(
            "No pages could be merged".to_string(),
        ));
    }
    batch.finish()?;

    let file_name = format!("merged_{}_files_{}.pdf", documents.len(), run.stamp);
    let bytes = run
        .services
        .pdf
        .merge(&documents)
        .map_err(|source| BatchDocError::CollaboratorFailure {
            name: file_name.clone(),
            source,
        })?;

    outcome.processed = documents.len();
    outcome.message = format!(
        "Successfully merged {} PDFs into one file! ({} pages total)",
        documents.len(),
        page_total
    );
    outcome.artifact = Some(Artifact {
        file_name: sanitize_file_name(&file_name),
        mime: PDF_MIME.to_string(),
        bytes,
    });
    Ok(outcome)
}

fn split(run: &Run<'_>, batch: &mut Batch<'_>, inputs: &[(usize, FileEntry)]) -> Result<RunOutcome> {
    let mut outcome = RunOutcome::default();
    let mut entries = Vec::new();

    for (_, file) in inputs {
        if !file.is_pdf() {
            outcome.skipped += 1;
        } else {
            match run.services.pdf.split(file.content(), &run.config.split) {
                Ok(out) => {
                    let base = base_name(file.name());
                    for warning in out.warnings {
                        outcome.warnings.push(format!("{}: {}", file.name(), warning));
                    }
                    if !out.parts.is_empty() {
                        outcome.processed += 1;
                    }
                    entries.extend(out.parts.into_iter().map(|part| {
                        ArchiveEntry::new(format!("{}_{}.pdf", base, part.suffix), part.bytes)
                    }));
                }
                Err(e) => {
                    outcome.skipped += 1;
                    outcome.warn(file, e);
                }
            }
        }
        batch.item_done("Splitting")?;
    }

    if entries.is_empty() {
        return Err(BatchDocError::NothingToProcess(
            "No PDFs were split successfully!".to_string(),
        ));
    }
    batch.finish()?;

    outcome.message = format!(
        "Successfully split into {} PDF file{}!",
        entries.len(),
        plural(entries.len())
    );
    outcome.artifact = Some(run.zip(format!("split_pdfs_{}.zip", run.stamp), &entries)?);
    Ok(outcome)
}

fn compress(run: &Run<'_>, batch: &mut Batch<'_>, inputs: &[(usize, FileEntry)]) -> Result<RunOutcome> {
    let mut outcome = RunOutcome::default();
    let config = run.config;

    let entries = map_to_archive(batch, inputs, "Compressing", &mut outcome, |file| {
        if !file.is_image() {
            return Ok(None);
        }
        let out = run.offload.run(&WorkerRequest::Resize {
            payload: file.content().to_vec(),
            width: config.compress_max_width,
            height: config.compress_max_height,
            quality: config.compress_quality,
        })?;
        Ok(Some(ArchiveEntry::new(
            replace_extension(file.name(), "jpg"),
            out.bytes,
        )))
    })?;
    batch.finish()?;

    let stats = SizeStats {
        original_bytes: inputs.iter().map(|(_, f)| f.size_bytes()).sum(),
        output_bytes: entries.iter().map(|e| e.bytes.len() as u64).sum(),
    };
    outcome.stats = Some(stats);
    outcome.message = "Files compressed successfully!".to_string();
    outcome.artifact = Some(run.zip(format!("compressed_{}.zip", run.stamp), &entries)?);
    Ok(outcome)
}

fn rotate(run: &Run<'_>, batch: &mut Batch<'_>, inputs: &[(usize, FileEntry)]) -> Result<RunOutcome> {
    let mut outcome = RunOutcome::default();
    let angle = run.config.rotation;

    let entries = map_to_archive(batch, inputs, "Rotating", &mut outcome, |file| {
        if !file.is_image() {
            return Ok(None);
        }
        let bytes = run.recode(file, source_format(file), EDIT_QUALITY, |b| {
            imaging::rotate(b, angle)
        })?;
        Ok(Some(ArchiveEntry::new(
            with_suffix(file.name(), &format!("rotated{}", angle)),
            bytes,
        )))
    })?;
    batch.finish()?;

    outcome.message = format!("Images rotated {}° successfully!", angle);
    outcome.artifact = Some(run.zip(format!("rotated_{}deg_{}.zip", angle, run.stamp), &entries)?);
    Ok(outcome)
}

fn filter(run: &Run<'_>, batch: &mut Batch<'_>, inputs: &[(usize, FileEntry)]) -> Result<RunOutcome> {
    let mut outcome = RunOutcome::default();
    let preset = run.config.filter;

    let entries = map_to_archive(batch, inputs, "Applying filter", &mut outcome, |file| {
        if !file.is_image() {
            return Ok(None);
        }
        let bytes = run.recode(file, source_format(file), EDIT_QUALITY, |mut b| {
            imaging::apply_filter(&mut b, preset);
            b
        })?;
        Ok(Some(ArchiveEntry::new(
            with_suffix(file.name(), preset.as_str()),
            bytes,
        )))
    })?;
    batch.finish()?;

    outcome.message = format!("{} filter applied successfully!", preset);
    outcome.artifact = Some(run.zip(format!("filtered_{}_{}.zip", preset, run.stamp), &entries)?);
    Ok(outcome)
}

fn convert(run: &Run<'_>, batch: &mut Batch<'_>, inputs: &[(usize, FileEntry)]) -> Result<RunOutcome> {
    let mut outcome = RunOutcome::default();
    let target = run.config.target_format;
    let quality = quality_percent(run.config.convert_quality);

    let entries = map_to_archive(batch, inputs, "Converting", &mut outcome, |file| {
        if !file.is_image() || ImageFormat::from_mime(file.declared_mime()) == Some(target) {
            return Ok(None);
        }
        let bytes = run.recode(file, target, quality, |mut b| {
            if target != ImageFormat::Png {
                imaging::flatten_onto_white(&mut b);
            }
            b
        })?;
        Ok(Some(ArchiveEntry::new(
            replace_extension(file.name(), target.extension()),
            bytes,
        )))
    })?;
    batch.finish()?;

    let label = target.as_str().to_ascii_uppercase();
    outcome.message = format!(
        "Successfully converted {} file(s) to {}!",
        outcome.processed, label
    );
    outcome.artifact = Some(run.zip(
        format!("converted_to_{}_{}.zip", target.as_str(), run.stamp),
        &entries,
    )?);
    Ok(outcome)
}

fn edit(run: &Run<'_>, batch: &mut Batch<'_>, inputs: &[(usize, FileEntry)]) -> Result<RunOutcome> {
    let Some((index, file)) = inputs.iter().find(|(_, f)| f.is_image()) else {
        return Err(BatchDocError::NothingToProcess(
            "Please select an image to edit".to_string(),
        ));
    };

    let mut outcome = RunOutcome {
        skipped: inputs.len() - 1,
        ..RunOutcome::default()
    };
    if inputs.len() > 1 {
        outcome.warnings.push(format!(
            "The editor works on one image at a time; editing {}",
            file.name()
        ));
    }

    let format = source_format(file);
    let recipe = &run.config.edit;
    let bytes = run
        .recode(file, format, EDIT_QUALITY, |b| recipe.apply(b))
        .map_err(|source| BatchDocError::CollaboratorFailure {
            name: file.name().to_string(),
            source,
        })?;
    batch.item_done("Editing")?;

    outcome.processed = 1;
    outcome.replaced = vec![(*index, FileEntry::new(file.name(), format.mime(), bytes.clone()))];
    outcome.message = "Edited image saved successfully!".to_string();
    outcome.artifact = Some(Artifact {
        file_name: sanitize_file_name(&with_suffix(file.name(), "edited")),
        mime: format.mime().to_string(),
        bytes,
    });
    Ok(outcome)
}

fn delete(batch: &mut Batch<'_>, inputs: &[(usize, FileEntry)]) -> Result<RunOutcome> {
    let removed: Vec<usize> = inputs.iter().map(|(i, _)| *i).collect();
    for _ in inputs {
        batch.item_done("Deleting")?;
    }

    Ok(RunOutcome {
        message: format!(
            "{} file{} deleted successfully!",
            removed.len(),
            plural(removed.len())
        ),
        processed: removed.len(),
        removed,
        ..RunOutcome::default()
    })
}

fn ocr(run: &Run<'_>, batch: &mut Batch<'_>, inputs: &[(usize, FileEntry)]) -> Result<RunOutcome> {
    let engine = run.services.ocr.ok_or_else(|| unavailable("OCR engine"))?;
    let mut outcome = RunOutcome::default();
    let mut text = String::new();

    for (_, file) in inputs {
        if !file.is_image() {
            outcome.skipped += 1;
        } else {
            match engine.recognize(file.content(), &run.config.ocr_language) {
                Ok(found) => {
                    let _ = write!(text, "\n\n--- {} ---\n{}", file.name(), found);
                    outcome.processed += 1;
                }
                Err(e) => {
                    outcome.skipped += 1;
                    outcome.warn(file, e);
                }
            }
        }
        batch.item_done("Extracting text")?;
    }

    if outcome.processed == 0 {
        return Err(BatchDocError::NothingToProcess(
            "No text could be extracted".to_string(),
        ));
    }

    outcome.message = "Text extracted successfully!".to_string();
    outcome.artifact = Some(Artifact {
        file_name: sanitize_file_name(&format!("extracted_text_{}.txt", run.stamp)),
        mime: TEXT_MIME.to_string(),
        bytes: text.into_bytes(),
    });
    Ok(outcome)
}
