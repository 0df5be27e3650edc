//! The owned session: registry plus every piece of per-index bookkeeping
//!
//! All mutation goes through `&mut Session` so that removing, replacing or
//! reordering a file updates the registry, its selection, the handle tracker
//! and the preview cache in one step. Dropping the session releases every
//! outstanding handle.

use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::error::{BatchDocError, Result};
use crate::media::{base_name, is_heic, replace_extension, FileEntry, IncomingFile};
use crate::mode::Mode;
use crate::notices::{NoticeQueue, NoticeView};
use crate::pipeline::{Dispatcher, RunConfig, RunOutcome, Services};
use crate::progress::ProgressSink;
use crate::registry::{MemoryUsage, Registry};
use crate::reindex::ReindexableMap;
use crate::services::{HeicDecoder, RenderedPage};
use crate::snapshot::SnapshotStore;
use crate::tracker::{HandleAllocator, HandleId, ResourceTracker};
use crate::validation::{check_size, classify, Rejection, Verdict};
use crate::viewport::{Viewport, ViewportRange};
use crate::worker::{InlineWorker, Offload, WorkerRequest};
use serde::Serialize;
use std::ops::Range;
use tracing::{debug, info, warn};

/// JPEG quality for HEIC uploads converted on arrival
pub const HEIC_INGEST_QUALITY: f32 = 0.9;
/// Scale of PDF first-page thumbnails
pub const PREVIEW_SCALE: f32 = 0.5;

/// A file turned away at ingest
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedFile {
    pub name: String,
    #[serde(flatten)]
    pub rejection: Rejection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub accepted: Range<usize>,
    pub rejected: Vec<RejectedFile>,
    /// HEIC uploads converted to JPEG
    pub converted: usize,
}

/// Result of [`Session::run`]
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub outcome: RunOutcome,
    /// Host handle for the artifact, when there is one
    pub download: Option<HandleId>,
    /// Selection size after the best-effort restore
    pub restored: usize,
}

pub struct Session<A: HandleAllocator, C: Clock = SystemClock> {
    config: SessionConfig,
    mode: Mode,
    registry: Registry,
    tracker: ResourceTracker<A>,
    previews: ReindexableMap<RenderedPage>,
    snapshots: SnapshotStore,
    notices: NoticeQueue,
    viewport: Viewport,
    clock: C,
}

impl<A: HandleAllocator> Session<A> {
    pub fn new(config: SessionConfig, allocator: A) -> Self {
        Self::with_clock(config, allocator, SystemClock)
    }
}

impl<A: HandleAllocator, C: Clock> Session<A, C> {
    pub fn with_clock(config: SessionConfig, allocator: A, clock: C) -> Self {
        Self {
            registry: Registry::new(config.capacity_limits()),
            tracker: ResourceTracker::new(allocator),
            previews: ReindexableMap::new(),
            snapshots: SnapshotStore::new(config.snapshots.capacity),
            notices: NoticeQueue::new(config.notices.display_ms),
            viewport: Viewport::new(config.viewport.clone()),
            mode: Mode::default(),
            clock,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Switch mode; files already held stay
    pub fn set_mode(&mut self, mode: Mode) {
        if mode != self.mode {
            info!(from = %self.mode, to = %mode, "Mode changed");
            self.mode = mode;
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn tracker(&self) -> &ResourceTracker<A> {
        &self.tracker
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn memory_usage(&self) -> MemoryUsage {
        self.registry.memory_usage()
    }

    // Ingest

    /// Validate and append a batch of uploads.
    ///
    /// Rejected files are reported and skipped. HEIC uploads are converted to
    /// JPEG when a decoder is given, except in `jpeg` mode which converts them
    /// itself. The surviving batch is appended all or nothing.
    ///
    /// # Errors
    ///
    /// `CapacityExceeded` when the surviving batch does not fit; the registry
    /// is left untouched.
    pub fn ingest(
        &mut self,
        incoming: Vec<IncomingFile>,
        heic: Option<&dyn HeicDecoder>,
    ) -> Result<IngestReport> {
        let now = self.clock.now_ms();
        let mut report = IngestReport::default();
        let mut accepted = Vec::with_capacity(incoming.len());

        for file in incoming {
            let rejection = match classify(&file, self.mode) {
                Verdict::Reject(rejection) => Some(rejection),
                Verdict::Accept(_) => check_size(&file, self.config.limits.max_file_bytes),
            };
            if let Some(rejection) = rejection {
                warn!(name = %file.name, reason = %rejection.reason, "Upload rejected");
                self.notices.warning(rejection.reason.clone(), now);
                report.rejected.push(RejectedFile {
                    name: file.name,
                    rejection,
                });
                continue;
            }

            match heic {
                Some(decoder) if self.mode != Mode::Jpeg && is_heic(&file.declared_mime, &file.name) => {
                    match decoder.to_jpeg(&file.bytes, HEIC_INGEST_QUALITY) {
                        Ok(images) if images.is_empty() => {
                            self.notices
                                .warning(format!("Failed to convert {}: no image found", file.name), now);
                        }
                        Ok(images) => {
                            report.converted += 1;
                            let single = images.len() == 1;
                            for (i, jpeg) in images.into_iter().enumerate() {
                                let name = if single {
                                    replace_extension(&file.name, "jpg")
                                } else {
                                    format!("{}_{}.jpg", base_name(&file.name), i + 1)
                                };
                                accepted.push(FileEntry::new(name, "image/jpeg", jpeg));
                            }
                        }
                        Err(e) => {
                            warn!(name = %file.name, error = %e, "HEIC conversion failed");
                            self.notices
                                .warning(format!("Failed to convert {}: {}", file.name, e), now);
                        }
                    }
                }
                _ => accepted.push(file.into_entry()),
            }
        }

        if accepted.is_empty() {
            report.accepted = self.registry.len()..self.registry.len();
            return Ok(report);
        }

        report.accepted = match self.registry.append(accepted) {
            Ok(range) => range,
            Err(e) => {
                self.notices.error(e.to_string(), now);
                return Err(e);
            }
        };
        self.viewport.set_total(self.registry.len());

        let usage = self.registry.memory_usage();
        if usage.warning {
            self.notices.warning(
                format!("Memory usage is high ({:.0}% of budget)", usage.percent),
                now,
            );
        }
        info!(
            added = report.accepted.len(),
            rejected = report.rejected.len(),
            total = self.registry.len(),
            "Ingested files"
        );
        Ok(report)
    }

    // Removal and replacement

    /// Remove one file and shift everything keyed by index.
    ///
    /// Handles and cached previews for `index` are released before the
    /// splice; out-of-range indices are a no-op.
    pub fn remove_at(&mut self, index: usize) -> Option<FileEntry> {
        if index >= self.registry.len() {
            return None;
        }
        self.tracker.release_index(index);
        self.previews.remove(index);

        let removed = self.registry.remove_at(index);
        self.tracker.reindex(index);
        self.previews.apply_removal(index);
        self.viewport.set_total(self.registry.len());

        debug!(index, remaining = self.registry.len(), "Removed file");
        removed
    }

    /// Remove several indices, highest first; duplicates are ignored
    pub fn remove_many(&mut self, indices: &[usize]) -> usize {
        let mut sorted = indices.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        sorted.dedup();
        sorted
            .into_iter()
            .filter(|&index| self.remove_at(index).is_some())
            .count()
    }

    pub fn remove_selected(&mut self) -> usize {
        let selected = self.registry.selected_indices();
        let removed = self.remove_many(&selected);
        if self.registry.is_empty() {
            self.snapshots.clear();
        }
        removed
    }

    /// Swap the entry at `index`, dropping handles and previews of the old one
    pub fn replace_at(&mut self, index: usize, entry: FileEntry) -> Option<FileEntry> {
        if index >= self.registry.len() {
            return None;
        }
        self.tracker.release_index(index);
        self.previews.remove(index);
        self.registry.replace_at(index, entry)
    }

    /// Apply a permutation where `order[new] == old`
    pub fn reorder(&mut self, order: &[usize]) -> Result<()> {
        self.registry.reorder(order)?;
        self.tracker.permute(order);
        self.previews.apply_permutation(order);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.tracker.release_all();
        self.previews.drain().for_each(drop);
        self.registry.clear();
        self.snapshots.clear();
        self.viewport.set_total(0);
        info!("Session cleared");
    }

    // Selection

    pub fn toggle(&mut self, index: usize) {
        self.registry.toggle(index);
    }

    pub fn select_all(&mut self) {
        self.registry.select_all();
    }

    pub fn deselect_all(&mut self) {
        self.registry.deselect_all();
    }

    pub fn invert_selection(&mut self) {
        self.registry.invert();
    }

    pub fn save_snapshot(&mut self) {
        let now = self.clock.now_ms();
        self.snapshots.save(&self.registry, now);
    }

    /// Reapply the latest snapshot by name; returns the selection size
    pub fn restore_selection(&mut self) -> usize {
        if !self.snapshots.can_restore() {
            return 0;
        }
        let restored = self.snapshots.restore(&mut self.registry);
        self.snapshots.consume();
        if restored > 0 {
            let now = self.clock.now_ms();
            self.notices
                .info(format!("Restored {} selected file(s)!", restored), now);
        }
        restored
    }

    // Previews

    /// Handle for the slot's payload, allocated on first use
    pub fn preview_handle(&mut self, index: usize) -> Result<Option<HandleId>> {
        let Some(entry) = self.registry.get(index) else {
            return Ok(None);
        };
        if let Some(handle) = self.tracker.handles_for(index).first() {
            return Ok(Some(handle.clone()));
        }
        let content = entry.shared_content();
        let mime = entry.declared_mime().to_string();
        let handle = self
            .tracker
            .allocate(index, &content, &mime)
            .map_err(|source| BatchDocError::CollaboratorFailure {
                name: format!("preview {}", index),
                source,
            })?;
        Ok(Some(handle))
    }

    /// First-page render of a PDF slot, cached until the slot changes
    pub fn pdf_preview(&mut self, index: usize, offload: &Offload<'_>) -> Result<Option<&RenderedPage>> {
        let Some(entry) = self.registry.get(index) else {
            return Ok(None);
        };
        if !entry.is_pdf() {
            return Ok(None);
        }
        if !self.previews.contains(index) {
            let request = WorkerRequest::RenderPage {
                data: entry.content().to_vec(),
                scale: PREVIEW_SCALE,
                page_number: 1,
            };
            let output = offload
                .run(&request)
                .map_err(|source| BatchDocError::CollaboratorFailure {
                    name: entry.name().to_string(),
                    source,
                })?;
            self.previews.insert(
                index,
                RenderedPage {
                    image_bytes: output.bytes,
                    width: output.width,
                    height: output.height,
                },
            );
        }
        Ok(self.previews.get(index))
    }

    pub fn cached_preview_count(&self) -> usize {
        self.previews.len()
    }

    // Viewport

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn on_scroll(&mut self, scroll_offset: f64) -> Option<ViewportRange> {
        let now = self.clock.now_ms() as f64;
        self.viewport.on_scroll(scroll_offset, now)
    }

    pub fn on_resize(&mut self, width: f64, height: f64) -> Option<ViewportRange> {
        self.viewport.on_resize(width, height)
    }

    // Notices

    /// Advance the notice queue and return what should be visible
    pub fn notice(&mut self) -> Option<NoticeView> {
        let now = self.clock.now_ms();
        self.notices.tick(now);
        self.notices.current()
    }

    pub fn dismiss_notice(&mut self) {
        let now = self.clock.now_ms();
        self.notices.dismiss(now);
    }

    pub fn dismiss_all_notices(&mut self) {
        self.notices.dismiss_all();
    }

    pub fn notices(&self) -> &NoticeQueue {
        &self.notices
    }

    // Runs

    /// Run the active mode over the selection (or every file if none).
    ///
    /// A snapshot is saved first. The download handle is allocated before the
    /// outcome touches the registry; replacements and removals are then
    /// applied through the same paths as direct edits, and the selection is
    /// restored by name when files remain.
    pub fn run(
        &mut self,
        config: &RunConfig,
        services: Services<'_>,
        progress: &mut dyn ProgressSink,
    ) -> Result<RunReport> {
        let inputs: Vec<(usize, FileEntry)> = self
            .registry
            .selection_or_all()
            .into_iter()
            .map(|(i, entry)| (i, entry.clone()))
            .collect();

        self.save_snapshot();

        let result = Dispatcher::new(
            services,
            &self.config.pipeline,
            &self.config.workers,
            &self.clock,
        )
        .run(self.mode, &inputs, config, progress);

        let now = self.clock.now_ms();
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                self.notices.error(e.to_string(), now);
                return Err(e);
            }
        };

        // Allocate before the outcome touches the registry
        let download = match &outcome.artifact {
            Some(artifact) => match self
                .tracker
                .allocate_unindexed(&artifact.bytes, &artifact.mime)
            {
                Ok(handle) => Some(handle),
                Err(source) => {
                    let e = BatchDocError::CollaboratorFailure {
                        name: artifact.file_name.clone(),
                        source,
                    };
                    self.notices.error(e.to_string(), now);
                    return Err(e);
                }
            },
            None => None,
        };

        for (index, entry) in &outcome.replaced {
            self.replace_at(*index, entry.clone());
        }
        if !outcome.removed.is_empty() {
            self.remove_many(&outcome.removed);
            if self.registry.is_empty() {
                self.snapshots.clear();
            }
        }

        for warning in &outcome.warnings {
            self.notices.warning(warning.clone(), now);
        }
        self.notices.info(outcome.message.clone(), now);

        let restored = if self.registry.is_empty() {
            0
        } else {
            self.snapshots.restore(&mut self.registry)
        };

        Ok(RunReport {
            outcome,
            download,
            restored,
        })
    }

    /// Offload strategy over `inline` with the session's worker settings
    pub fn offload<'a>(&self, inline: &'a InlineWorker<'a>) -> Offload<'a> {
        Offload::new(inline, &self.config.workers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::codec::ImageCrateCodec;
    use crate::error::{CapacityViolation, CollaboratorError};
    use crate::pdf::test_support::create_test_pdf;
    use crate::progress::NullProgress;
    use crate::services::{PageRenderer, ServiceResult};
    use crate::tracker::{MemoryAllocator, ReleaseError};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    const PNG_HEAD: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    const JPEG_HEAD: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10, 0x4A, 0x46];

    /// Allocator whose live set outlives the session
    #[derive(Default, Clone)]
    struct SharedAllocator {
        live: Rc<RefCell<HashSet<HandleId>>>,
        next: Rc<RefCell<u64>>,
    }

    impl HandleAllocator for SharedAllocator {
        fn allocate(&mut self, _payload: &[u8], _mime: &str) -> std::result::Result<HandleId, CollaboratorError> {
            let mut next = self.next.borrow_mut();
            *next += 1;
            let handle = HandleId(format!("shared:{}", next));
            self.live.borrow_mut().insert(handle.clone());
            Ok(handle)
        }

        fn release(&mut self, handle: &HandleId) -> std::result::Result<(), ReleaseError> {
            if self.live.borrow_mut().remove(handle) {
                Ok(())
            } else {
                Err(ReleaseError::AlreadyReleased(handle.clone()))
            }
        }
    }

    struct FixedRenderer;

    impl PageRenderer for FixedRenderer {
        fn render(&self, _pdf: &[u8], page_number: u32, _scale: f32) -> ServiceResult<RenderedPage> {
            Ok(RenderedPage {
                image_bytes: vec![page_number as u8],
                width: 10,
                height: 14,
            })
        }
    }

    fn png_upload(name: &str) -> IncomingFile {
        IncomingFile::new(name, "image/png", PNG_HEAD.to_vec())
    }

    fn real_png(name: &str) -> IncomingFile {
        use crate::services::{Bitmap, ImageCodec, ImageFormat};
        let bytes = ImageCrateCodec
            .encode(&Bitmap::solid(4, 2, [9, 9, 9, 255]), ImageFormat::Png, 100)
            .unwrap();
        IncomingFile::new(name, "image/png", bytes)
    }

    fn session(clock: &ManualClock) -> Session<MemoryAllocator, &ManualClock> {
        Session::with_clock(SessionConfig::default(), MemoryAllocator::new(), clock)
    }

    fn names<A: HandleAllocator, C: Clock>(s: &Session<A, C>) -> Vec<&str> {
        s.registry().entries().iter().map(FileEntry::name).collect()
    }

    #[test]
    fn test_remove_shifts_selection_and_handles() {
        let clock = ManualClock::new(0);
        let mut s = session(&clock);
        s.set_mode(Mode::Compress);
        s.ingest(
            vec![png_upload("A.png"), png_upload("B.png"), png_upload("C.png"), png_upload("D.png")],
            None,
        )
        .unwrap();
        for i in 0..4 {
            s.preview_handle(i).unwrap();
        }
        s.toggle(1);
        s.toggle(3);
        let handle_of_c = s.tracker().handles_for(2).to_vec();

        s.remove_at(1);

        assert_eq!(names(&s), vec!["A.png", "C.png", "D.png"]);
        assert_eq!(s.registry().selected_indices(), vec![2]);
        assert_eq!(s.tracker().tracked_indices(), vec![0, 1, 2]);
        assert_eq!(s.tracker().handles_for(1), handle_of_c.as_slice());
        assert_eq!(s.tracker().allocator().live_count(), 3);
    }

    #[test]
    fn test_remove_out_of_range_is_noop() {
        let clock = ManualClock::new(0);
        let mut s = session(&clock);
        s.set_mode(Mode::Compress);
        s.ingest(vec![png_upload("a.png")], None).unwrap();
        assert!(s.remove_at(5).is_none());
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_remove_many_descending() {
        let clock = ManualClock::new(0);
        let mut s = session(&clock);
        s.set_mode(Mode::Delete);
        let uploads = (0..5).map(|i| png_upload(&format!("{}.png", i))).collect();
        s.ingest(uploads, None).unwrap();
        assert_eq!(s.remove_many(&[1, 3, 1, 9]), 2);
        assert_eq!(names(&s), vec!["0.png", "2.png", "4.png"]);
    }

    #[test]
    fn test_clear_releases_everything() {
        let clock = ManualClock::new(0);
        let mut s = session(&clock);
        s.set_mode(Mode::Compress);
        s.ingest(vec![png_upload("a.png"), png_upload("b.png")], None)
            .unwrap();
        s.preview_handle(0).unwrap();
        s.preview_handle(1).unwrap();
        s.save_snapshot();

        s.clear();

        assert_eq!(s.tracker().tracked_count(), 0);
        assert_eq!(s.tracker().allocator().live_count(), 0);
        assert!(s.is_empty());
        assert!(s.snapshots().is_empty());
    }

    #[test]
    fn test_preview_handle_is_reused() {
        let clock = ManualClock::new(0);
        let mut s = session(&clock);
        s.set_mode(Mode::Compress);
        s.ingest(vec![png_upload("a.png")], None).unwrap();
        let first = s.preview_handle(0).unwrap();
        let second = s.preview_handle(0).unwrap();
        assert_eq!(first, second);
        assert_eq!(s.preview_handle(7).unwrap(), None);
        assert_eq!(s.tracker().tracked_count(), 1);
    }

    #[test]
    fn test_ingest_rejects_mismatched_signature() {
        let clock = ManualClock::new(0);
        let mut s = session(&clock);
        s.set_mode(Mode::Compress);
        let report = s
            .ingest(
                vec![
                    IncomingFile::new("fake.png", "image/png", JPEG_HEAD.to_vec()),
                    png_upload("real.png"),
                ],
                None,
            )
            .unwrap();

        assert_eq!(report.accepted, 0..1);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].name, "fake.png");
        assert_eq!(s.notices().len(), 1);
    }

    #[test]
    fn test_mode_decides_pdf_acceptance() {
        let clock = ManualClock::new(0);
        let pdf = || IncomingFile::new("doc.pdf", "application/pdf", create_test_pdf(1));

        let mut s = session(&clock);
        s.set_mode(Mode::Merge);
        assert_eq!(s.ingest(vec![pdf()], None).unwrap().accepted, 0..1);

        let mut s = session(&clock);
        s.set_mode(Mode::Jpeg);
        let report = s.ingest(vec![pdf()], None).unwrap();
        assert!(report.accepted.is_empty());
        assert_eq!(report.rejected.len(), 1);
    }

    #[test]
    fn test_capacity_failure_leaves_registry_identical() {
        let clock = ManualClock::new(0);
        let config = SessionConfig::from_str("[limits]\nmax_files = 2\n").unwrap();
        let mut s = Session::with_clock(config, MemoryAllocator::new(), &clock);
        s.set_mode(Mode::Compress);
        s.ingest(vec![png_upload("a.png")], None).unwrap();
        s.toggle(0);
        let before = s.registry().clone();

        let err = s
            .ingest(vec![png_upload("b.png"), png_upload("c.png")], None)
            .unwrap_err();

        assert!(matches!(
            err,
            BatchDocError::CapacityExceeded(CapacityViolation::FileCount { available: 1, .. })
        ));
        assert_eq!(s.registry(), &before);
    }

    #[test]
    fn test_heic_is_converted_on_ingest() {
        struct OneFrame;
        impl HeicDecoder for OneFrame {
            fn to_jpeg(&self, _bytes: &[u8], quality: f32) -> ServiceResult<Vec<Vec<u8>>> {
                assert_eq!(quality, HEIC_INGEST_QUALITY);
                Ok(vec![JPEG_HEAD.to_vec()])
            }
        }

        let clock = ManualClock::new(0);
        let mut s = session(&clock);
        s.set_mode(Mode::Pdf);
        let heic = IncomingFile::new("IMG_1.heic", "image/heic", b"\0\0\0\x18ftypheic".to_vec());
        let report = s.ingest(vec![heic], Some(&OneFrame)).unwrap();

        assert_eq!(report.converted, 1);
        assert_eq!(names(&s), vec!["IMG_1.jpg"]);
        assert_eq!(s.registry().get(0).unwrap().declared_mime(), "image/jpeg");
    }

    #[test]
    fn test_heic_with_several_frames_yields_one_entry_each() {
        struct TwoFrames;
        impl HeicDecoder for TwoFrames {
            fn to_jpeg(&self, _bytes: &[u8], _quality: f32) -> ServiceResult<Vec<Vec<u8>>> {
                Ok(vec![JPEG_HEAD.to_vec(), JPEG_HEAD.to_vec()])
            }
        }

        let clock = ManualClock::new(0);
        let mut s = session(&clock);
        s.set_mode(Mode::Pdf);
        let heic = IncomingFile::new("burst.heic", "image/heic", b"\0\0\0\x18ftypheic".to_vec());
        let report = s.ingest(vec![heic], Some(&TwoFrames)).unwrap();

        assert_eq!(report.converted, 1);
        assert_eq!(report.accepted, 0..2);
        assert_eq!(names(&s), vec!["burst_1.jpg", "burst_2.jpg"]);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let clock = ManualClock::new(0);
        let mut s = session(&clock);
        s.set_mode(Mode::Compress);
        s.ingest(vec![png_upload("a.png"), png_upload("b.png")], None)
            .unwrap();
        s.toggle(1);
        s.save_snapshot();
        s.deselect_all();

        assert_eq!(s.restore_selection(), 1);
        assert!(s.registry().is_selected(1));
        // a restore is offered once
        assert_eq!(s.restore_selection(), 0);
    }

    #[test]
    fn test_reorder_moves_handles_and_previews() {
        let clock = ManualClock::new(0);
        let mut s = session(&clock);
        s.set_mode(Mode::Merge);
        let pdfs = (0..3)
            .map(|i| IncomingFile::new(format!("{}.pdf", i), "application/pdf", create_test_pdf(1)))
            .collect();
        s.ingest(pdfs, None).unwrap();
        let handle_of_first = s.preview_handle(0).unwrap().unwrap();

        let codec = ImageCrateCodec;
        let inline = InlineWorker {
            codec: &codec,
            renderer: Some(&FixedRenderer),
        };
        let offload = s.offload(&inline);
        s.pdf_preview(0, &offload).unwrap();

        s.reorder(&[2, 0, 1]).unwrap();

        assert_eq!(names(&s), vec!["2.pdf", "0.pdf", "1.pdf"]);
        assert_eq!(s.tracker().handles_for(1), &[handle_of_first]);
        assert_eq!(s.tracker().tracked_indices(), vec![1]);
        assert_eq!(s.cached_preview_count(), 1);
        assert!(s.reorder(&[0, 0, 1]).is_err());
    }

    #[test]
    fn test_pdf_preview_without_renderer_fails() {
        let clock = ManualClock::new(0);
        let mut s = session(&clock);
        s.set_mode(Mode::Split);
        s.ingest(
            vec![IncomingFile::new("a.pdf", "application/pdf", create_test_pdf(1))],
            None,
        )
        .unwrap();
        let codec = ImageCrateCodec;
        let inline = InlineWorker {
            codec: &codec,
            renderer: None,
        };
        let offload = s.offload(&inline);
        assert!(s.pdf_preview(0, &offload).is_err());
        assert_eq!(s.cached_preview_count(), 0);
    }

    #[test]
    fn test_delete_run_clears_history_when_empty() {
        let clock = ManualClock::new(0);
        let mut s = session(&clock);
        s.set_mode(Mode::Delete);
        s.ingest(vec![png_upload("a.png"), png_upload("b.png")], None)
            .unwrap();
        s.preview_handle(0).unwrap();

        let report = s
            .run(&RunConfig::default(), Services::builtin(), &mut NullProgress)
            .unwrap();

        assert_eq!(report.outcome.removed, vec![0, 1]);
        assert!(s.is_empty());
        assert!(s.snapshots().is_empty());
        assert_eq!(s.tracker().tracked_count(), 0);
        assert_eq!(report.download, None);
    }

    #[test]
    fn test_delete_selected_restores_nothing_but_keeps_rest() {
        let clock = ManualClock::new(0);
        let mut s = session(&clock);
        s.set_mode(Mode::Delete);
        s.ingest(vec![png_upload("a.png"), png_upload("b.png"), png_upload("c.png")], None)
            .unwrap();
        s.toggle(1);

        let report = s
            .run(&RunConfig::default(), Services::builtin(), &mut NullProgress)
            .unwrap();

        assert_eq!(names(&s), vec!["a.png", "c.png"]);
        assert_eq!(report.restored, 0);
        assert_eq!(s.registry().selected_count(), 0);
        assert_eq!(s.snapshots().len(), 1);
    }

    #[test]
    fn test_editor_run_replaces_slot_and_releases_old_handle() {
        let clock = ManualClock::new(0);
        let mut s = session(&clock);
        s.set_mode(Mode::Editor);
        s.ingest(vec![real_png("photo.png")], None).unwrap();
        let old = s.preview_handle(0).unwrap().unwrap();
        s.toggle(0);

        let report = s
            .run(&RunConfig::default(), Services::builtin(), &mut NullProgress)
            .unwrap();

        assert_eq!(names(&s), vec!["photo.png"]);
        assert!(!s.tracker().allocator().is_live(&old));
        assert!(s.tracker().handles_for(0).is_empty());
        assert_eq!(report.restored, 1);
        let download = report.download.unwrap();
        assert!(s.tracker().allocator().is_live(&download));
    }

    #[test]
    fn test_failed_download_allocation_leaves_files_untouched() {
        struct Refusing;
        impl HandleAllocator for Refusing {
            fn allocate(&mut self, _payload: &[u8], _mime: &str) -> std::result::Result<HandleId, CollaboratorError> {
                Err(CollaboratorError::Handle("out of object URLs".to_string()))
            }

            fn release(&mut self, handle: &HandleId) -> std::result::Result<(), ReleaseError> {
                Err(ReleaseError::Unknown(handle.clone()))
            }
        }

        let clock = ManualClock::new(0);
        let mut s = Session::with_clock(SessionConfig::default(), Refusing, &clock);
        s.set_mode(Mode::Editor);
        s.ingest(vec![real_png("photo.png")], None).unwrap();
        let before = s.registry().clone();

        let err = s
            .run(&RunConfig::default(), Services::builtin(), &mut NullProgress)
            .unwrap_err();

        assert!(matches!(err, BatchDocError::CollaboratorFailure { .. }));
        assert_eq!(s.registry(), &before);
        assert!(s.notice().unwrap().message.contains("out of object URLs"));
    }

    #[test]
    fn test_failed_run_queues_error() {
        let clock = ManualClock::new(0);
        let mut s = session(&clock);
        s.set_mode(Mode::Merge);
        s.ingest(
            vec![IncomingFile::new("a.pdf", "application/pdf", create_test_pdf(1))],
            None,
        )
        .unwrap();

        let err = s
            .run(&RunConfig::default(), Services::builtin(), &mut NullProgress)
            .unwrap_err();
        assert!(matches!(err, BatchDocError::NothingToProcess(_)));
        assert_eq!(
            s.notice().map(|n| n.message),
            Some("Please select at least 2 PDF files to merge!".to_string())
        );
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn test_drop_releases_all_handles() {
        let allocator = SharedAllocator::default();
        let live = Rc::clone(&allocator.live);
        {
            let clock = ManualClock::new(0);
            let mut s = Session::with_clock(SessionConfig::default(), allocator, &clock);
            s.set_mode(Mode::Compress);
            s.ingest(vec![png_upload("a.png"), png_upload("b.png")], None)
                .unwrap();
            s.preview_handle(0).unwrap();
            s.preview_handle(1).unwrap();
            assert_eq!(live.borrow().len(), 2);
        }
        assert!(live.borrow().is_empty());
    }

    #[test]
    fn test_viewport_follows_registry() {
        let clock = ManualClock::new(0);
        let mut s = session(&clock);
        s.set_mode(Mode::Compress);
        let uploads = (0..60).map(|i| png_upload(&format!("{}.png", i))).collect();
        s.ingest(uploads, None).unwrap();
        s.on_resize(155.0 * 4.0, 600.0);
        assert!(s.viewport().is_virtualized());
        assert_eq!(s.viewport().range().start, 0);

        clock.advance(200);
        let range = s.on_scroll(155.0 * 10.0);
        assert!(range.is_some_and(|r| r.start > 0));
        // throttled
        assert_eq!(s.on_scroll(0.0), None);
    }
}
