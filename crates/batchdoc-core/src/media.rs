//! File entries and name/MIME helpers

use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const PDF_MIME: &str = "application/pdf";

/// MIME types treated as images by mode rules and pipelines
pub const IMAGE_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/heic",
    "image/heif",
    "image/svg+xml",
    "image/webp",
];

pub fn is_image_mime(mime: &str) -> bool {
    IMAGE_MIME_TYPES.contains(&mime)
}

/// Coarse classification of an accepted upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Pdf,
    Other,
}

impl MediaKind {
    pub fn from_mime(mime: &str) -> Self {
        if mime == PDF_MIME {
            MediaKind::Pdf
        } else if is_image_mime(mime) {
            MediaKind::Image
        } else {
            MediaKind::Other
        }
    }
}

/// True for HEIC/HEIF uploads, by declared type or by name
pub fn is_heic(mime: &str, name: &str) -> bool {
    if mime == "image/heic" || mime == "image/heif" {
        return true;
    }
    matches!(extension(name).as_deref(), Some("heic") | Some("heif"))
}

/// Raw upload before it passes the validation gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingFile {
    pub name: String,
    pub declared_mime: String,
    pub bytes: Vec<u8>,
}

impl IncomingFile {
    pub fn new(name: impl Into<String>, declared_mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            declared_mime: declared_mime.into(),
            bytes,
        }
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn into_entry(self) -> FileEntry {
        FileEntry::new(self.name, self.declared_mime, self.bytes)
    }
}

/// One accepted upload held by the registry
///
/// The payload is shared and never written to; conversions build new entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    content: Arc<[u8]>,
    name: String,
    declared_mime: String,
    media_kind: MediaKind,
    size_bytes: u64,
}

impl FileEntry {
    pub fn new(
        name: impl Into<String>,
        declared_mime: impl Into<String>,
        content: impl Into<Arc<[u8]>>,
    ) -> Self {
        let content = content.into();
        let declared_mime = declared_mime.into();
        Self {
            size_bytes: content.len() as u64,
            media_kind: MediaKind::from_mime(&declared_mime),
            content,
            name: name.into(),
            declared_mime,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declared_mime(&self) -> &str {
        &self.declared_mime
    }

    pub fn media_kind(&self) -> MediaKind {
        self.media_kind
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn shared_content(&self) -> Arc<[u8]> {
        Arc::clone(&self.content)
    }

    pub fn is_image(&self) -> bool {
        self.media_kind == MediaKind::Image
    }

    pub fn is_pdf(&self) -> bool {
        self.media_kind == MediaKind::Pdf
    }

    /// New entry carrying converted bytes under a new name and type
    pub fn converted(&self, name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        FileEntry::new(name, mime, bytes)
    }
}

/// Lowercased extension without the dot
pub fn extension(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if ext.is_empty() || stem.is_empty() && !name.starts_with('.') {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Name without its final extension
pub fn base_name(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

/// Swap the final extension, e.g. `photo.heic` -> `photo.jpg`
pub fn replace_extension(name: &str, new_ext: &str) -> String {
    let new_ext = new_ext.trim_start_matches('.');
    format!("{}.{}", base_name(name), new_ext)
}

/// Insert `_suffix` before the extension, e.g. `a.png` -> `a_sepia.png`
pub fn with_suffix(name: &str, suffix: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}_{}.{}", stem, suffix, ext),
        _ => format!("{}_{}", name, suffix),
    }
}

/// Make a name safe to offer as a download
pub fn sanitize_file_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = replaced.trim_start_matches('.');
    let capped: String = trimmed.chars().take(255).collect();

    if capped.is_empty() {
        "file".to_string()
    } else {
        capped
    }
}

/// Format bytes as human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes < KB {
        format!("{} B", bytes)
    } else if bytes < MB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_from_mime() {
        assert_eq!(MediaKind::from_mime("application/pdf"), MediaKind::Pdf);
        assert_eq!(MediaKind::from_mime("image/webp"), MediaKind::Image);
        assert_eq!(MediaKind::from_mime("text/plain"), MediaKind::Other);
    }

    #[test]
    fn test_entry_records_size() {
        let entry = FileEntry::new("a.png", "image/png", vec![0u8; 42]);
        assert_eq!(entry.size_bytes(), 42);
        assert!(entry.is_image());
    }

    #[test]
    fn test_is_heic_by_name_or_type() {
        assert!(is_heic("image/heic", "x.bin"));
        assert!(is_heic("", "IMG_0001.HEIC"));
        assert!(!is_heic("image/jpeg", "photo.jpg"));
    }

    #[test]
    fn test_name_helpers() {
        assert_eq!(replace_extension("photo.heic", ".jpg"), "photo.jpg");
        assert_eq!(replace_extension("noext", "png"), "noext.png");
        assert_eq!(with_suffix("a.png", "rotated90"), "a_rotated90.png");
        assert_eq!(with_suffix("plain", "edited"), "plain_edited");
        assert_eq!(base_name("report.final.pdf"), "report.final");
        assert_eq!(extension("A.JPG").as_deref(), Some("jpg"));
        assert_eq!(extension("README"), None);
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("../etc/passwd"), "_etc_passwd");
        assert_eq!(sanitize_file_name("a<b>c.pdf"), "a_b_c.pdf");
        assert_eq!(sanitize_file_name("..."), "file");
        assert_eq!(sanitize_file_name(&"x".repeat(300)).len(), 255);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1048576), "1.0 MB");
        assert_eq!(format_bytes(2621440), "2.5 MB");
    }
}
