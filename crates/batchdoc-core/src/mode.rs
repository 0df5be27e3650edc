//! Processing modes and their per-mode upload rules

use crate::media::{is_image_mime, PDF_MIME};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Operation the user picked for the current batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Images to a single PDF
    #[default]
    Pdf,
    /// HEIC/HEIF to JPEG
    Jpeg,
    Merge,
    Split,
    Compress,
    Rotate,
    Filter,
    Convert,
    Editor,
    Delete,
    Ocr,
}

/// Coarse type class used by mode rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    /// Any recognised image MIME type
    Image,
    Pdf,
    /// Exact MIME match
    Mime(&'static str),
}

impl TypeClass {
    pub fn matches(&self, mime: &str) -> bool {
        match self {
            TypeClass::Image => is_image_mime(mime),
            TypeClass::Pdf => mime == PDF_MIME,
            TypeClass::Mime(exact) => mime == *exact,
        }
    }
}

/// Accept/reject sets declared by a mode
#[derive(Debug, Clone, Copy)]
pub struct ModeRule {
    pub accept: &'static [TypeClass],
    pub reject: &'static [TypeClass],
    pub message: &'static str,
}

impl Mode {
    pub const ALL: [Mode; 11] = [
        Mode::Pdf,
        Mode::Jpeg,
        Mode::Merge,
        Mode::Split,
        Mode::Compress,
        Mode::Rotate,
        Mode::Filter,
        Mode::Convert,
        Mode::Editor,
        Mode::Delete,
        Mode::Ocr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Pdf => "pdf",
            Mode::Jpeg => "jpeg",
            Mode::Merge => "merge",
            Mode::Split => "split",
            Mode::Compress => "compress",
            Mode::Rotate => "rotate",
            Mode::Filter => "filter",
            Mode::Convert => "convert",
            Mode::Editor => "editor",
            Mode::Delete => "delete",
            Mode::Ocr => "ocr",
        }
    }

    pub fn rule(&self) -> ModeRule {
        use TypeClass::*;

        const IMAGES_ONLY: &[TypeClass] = &[Image];
        const PDF_ONLY: &[TypeClass] = &[Pdf];

        match self {
            Mode::Pdf => ModeRule {
                accept: IMAGES_ONLY,
                reject: PDF_ONLY,
                message: "PDF mode only accepts images (they will be converted to PDF)",
            },
            Mode::Merge => ModeRule {
                accept: PDF_ONLY,
                reject: IMAGES_ONLY,
                message: "Merge mode only accepts PDF files",
            },
            Mode::Split => ModeRule {
                accept: PDF_ONLY,
                reject: IMAGES_ONLY,
                message: "Split mode only accepts PDF files",
            },
            Mode::Jpeg => ModeRule {
                accept: &[Mime("image/heic"), Mime("image/heif")],
                reject: &[
                    Pdf,
                    Mime("image/jpeg"),
                    Mime("image/jpg"),
                    Mime("image/png"),
                ],
                message: "HEIC to JPG mode only accepts HEIC/HEIF files",
            },
            Mode::Compress => ModeRule {
                accept: IMAGES_ONLY,
                reject: &[],
                message: "Compress mode works best with images",
            },
            Mode::Rotate => ModeRule {
                accept: IMAGES_ONLY,
                reject: PDF_ONLY,
                message: "Rotate mode only accepts images",
            },
            Mode::Filter => ModeRule {
                accept: IMAGES_ONLY,
                reject: PDF_ONLY,
                message: "Filter mode only accepts images",
            },
            Mode::Convert => ModeRule {
                accept: IMAGES_ONLY,
                reject: PDF_ONLY,
                message: "Convert mode only accepts images",
            },
            Mode::Editor => ModeRule {
                accept: IMAGES_ONLY,
                reject: PDF_ONLY,
                message: "Editor mode only accepts images (1 at a time)",
            },
            Mode::Delete => ModeRule {
                accept: &[Image, Pdf],
                reject: &[],
                message: "Delete mode accepts all files",
            },
            Mode::Ocr => ModeRule {
                accept: IMAGES_ONLY,
                reject: PDF_ONLY,
                message: "OCR mode only accepts images",
            },
        }
    }

    /// Value for a file input `accept` attribute
    pub fn accept_hint(&self) -> &'static str {
        match self {
            Mode::Merge | Mode::Split => "application/pdf",
            Mode::Jpeg => ".heic,.heif",
            Mode::Delete => "image/*,application/pdf",
            _ => "image/*",
        }
    }

    /// Drop zone call to action
    pub fn upload_prompt(&self) -> &'static str {
        match self {
            Mode::Pdf => "Upload images to convert to PDF",
            Mode::Merge => "Upload multiple PDF files to merge",
            Mode::Split => "Upload PDF file to split",
            Mode::Jpeg => "Upload HEIC/HEIF files to convert",
            Mode::Compress => "Upload images to compress",
            Mode::Rotate => "Upload images to rotate",
            Mode::Filter => "Upload images to apply filters",
            Mode::Convert => "Upload images to convert format",
            Mode::Editor => "Upload 1 image to edit",
            Mode::Ocr => "Upload images to extract text",
            Mode::Delete => "Upload files to delete",
        }
    }

    /// Modes whose result is applied back to the registry
    pub fn mutates_registry(&self) -> bool {
        matches!(self, Mode::Delete | Mode::Editor)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Mode::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == needle)
            .ok_or_else(|| format!("Unknown mode: {}", s))
    }
}
