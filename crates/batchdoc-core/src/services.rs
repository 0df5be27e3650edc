//! Collaborator contracts consumed by the pipeline
//!
//! Default implementations live in [`crate::pdf`], [`crate::codec`] and
//! [`crate::archive`]. Page rendering, OCR and HEIC decoding have no default;
//! hosts inject them.

use crate::error::CollaboratorError;
use crate::pdf::PageSelector;
use serde::{Deserialize, Serialize};

pub type ServiceResult<T> = std::result::Result<T, CollaboratorError>;

/// Decoded RGBA8 pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Bitmap {
    /// Filled with one colour
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = width as usize * height as usize;
        Self {
            width,
            height,
            rgba: rgba.iter().copied().cycle().take(pixels * 4).collect(),
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.rgba
            .get(i..i + 4)
            .map(|p| [p[0], p[1], p[2], p[3]])
    }
}

/// Output formats the codec can write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Jpeg,
    Png,
    Webp,
}

impl ImageFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Webp => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
        }
    }

    /// No alpha channel in the output
    pub fn is_lossy(&self) -> bool {
        matches!(self, ImageFormat::Jpeg)
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
            "image/png" => Some(ImageFormat::Png),
            "image/webp" => Some(ImageFormat::Webp),
            _ => None,
        }
    }
}

/// Rendered PDF page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub image_bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// JPEG payload with its pixel size, ready to be placed on a PDF page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JpegPage {
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// One output document of a split: which pages, and the name suffix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PagePlan {
    /// 1-indexed, ascending
    pub pages: Vec<u32>,
    pub suffix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPart {
    pub suffix: String,
    pub bytes: Vec<u8>,
}

/// Parts produced for one document plus anything skipped along the way
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitOutput {
    pub parts: Vec<SplitPart>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

pub trait PdfService {
    fn page_count(&self, bytes: &[u8]) -> ServiceResult<u32>;

    /// Copy of `bytes` holding only `pages` (1-indexed)
    fn extract_pages(&self, bytes: &[u8], pages: &[u32]) -> ServiceResult<Vec<u8>>;

    /// Concatenate documents in order
    fn merge(&self, documents: &[&[u8]]) -> ServiceResult<Vec<u8>>;

    /// One page per image, in order
    fn images_to_pdf(&self, pages: &[JpegPage]) -> ServiceResult<Vec<u8>>;

    fn split(&self, bytes: &[u8], selector: &PageSelector) -> ServiceResult<SplitOutput> {
        let page_count = self.page_count(bytes)?;
        let (plans, warnings) = selector.plan(page_count);
        let parts = plans
            .into_iter()
            .map(|plan| {
                self.extract_pages(bytes, &plan.pages).map(|bytes| SplitPart {
                    suffix: plan.suffix,
                    bytes,
                })
            })
            .collect::<ServiceResult<Vec<_>>>()?;
        Ok(SplitOutput { parts, warnings })
    }
}

pub trait PageRenderer {
    /// Rasterize one page (1-indexed) at `scale`
    fn render(&self, pdf_bytes: &[u8], page_number: u32, scale: f32) -> ServiceResult<RenderedPage>;
}

pub trait ImageCodec {
    fn decode(&self, bytes: &[u8]) -> ServiceResult<Bitmap>;

    /// `quality` is 1..=100 and only affects lossy formats
    fn encode(&self, bitmap: &Bitmap, format: ImageFormat, quality: u8) -> ServiceResult<Vec<u8>>;
}

pub trait ArchiveService {
    fn create_archive(&self, entries: &[ArchiveEntry]) -> ServiceResult<Vec<u8>>;
}

pub trait OcrService {
    fn recognize(&self, image_bytes: &[u8], language: &str) -> ServiceResult<String>;
}

pub trait HeicDecoder {
    /// One JPEG per image stored in the container
    fn to_jpeg(&self, bytes: &[u8], quality: f32) -> ServiceResult<Vec<Vec<u8>>>;
}
