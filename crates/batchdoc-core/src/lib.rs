//! Batch document and image processing core
//!
//! An in-memory file set with selection, handle lifetime tracking and a
//! virtualized viewport, plus a pipeline that routes the active mode over the
//! selected files to PDF, image, archive and OCR collaborators.
//!
//! Everything that depends on a registry index (selection, host handles,
//! cached previews) is re-keyed by one rule on removal and reorder; see
//! [`reindex`]. [`Session`] owns all of it.

pub mod archive;
pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod imaging;
pub mod media;
pub mod mode;
pub mod notices;
pub mod pdf;
pub mod pipeline;
pub mod progress;
pub mod registry;
pub mod reindex;
pub mod services;
pub mod session;
pub mod snapshot;
pub mod tracker;
pub mod validation;
pub mod viewport;
pub mod worker;

pub use archive::ZipArchiver;
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::ImageCrateCodec;
pub use config::SessionConfig;
pub use error::{BatchDocError, CapacityViolation, CollaboratorError, Result};
pub use imaging::{Adjustments, CropRect, EditRecipe, Filter};
pub use media::{FileEntry, IncomingFile, MediaKind};
pub use mode::Mode;
pub use notices::{NoticeQueue, NoticeView, Priority};
pub use pdf::{LopdfService, PageSelector};
pub use pipeline::{Artifact, Dispatcher, RunConfig, RunOutcome, Services, SizeStats};
pub use progress::{NullProgress, ProgressSink, ProgressUpdate, RecordingProgress};
pub use registry::{CapacityLimits, MemoryUsage, Registry};
pub use reindex::{IndexSet, IndexedResource, ReindexableMap};
pub use services::{
    ArchiveEntry, ArchiveService, Bitmap, HeicDecoder, ImageCodec, ImageFormat, OcrService,
    PageRenderer, PdfService, RenderedPage,
};
pub use session::{IngestReport, RunReport, Session};
pub use snapshot::{SelectionSnapshot, SnapshotStore};
pub use tracker::{HandleAllocator, HandleId, MemoryAllocator, ResourceTracker};
pub use validation::{classify, Verdict};
pub use viewport::{compute_range, Viewport, ViewportRange};
pub use worker::{InlineWorker, Offload, Worker, WorkerError, WorkerKind, WorkerRequest, WorkerResponse};
