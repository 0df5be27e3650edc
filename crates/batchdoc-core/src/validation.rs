//! Validation gate for incoming files
//!
//! Pure accept/reject by name, leading bytes and the active mode. Checks run
//! in a fixed order and stop at the first failure:
//!
//! 1. extension allow-list
//! 2. double extension
//! 3. byte signature for the declared type (HEIC/HEIF: `ftyp` marker)
//! 4. mode accept/reject rule

use crate::media::{IncomingFile, MediaKind};
use crate::mode::Mode;
use serde::Serialize;

pub const ALLOWED_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp", ".pdf", ".heic", ".heif"];

/// Compound suffixes tolerated despite containing more than one dot
pub const ALLOWED_COMPOUND_EXTENSIONS: &[&str] = &["tar.gz", "backup.zip"];

/// Number of leading bytes inspected
pub const SIGNATURE_LEN: usize = 8;

const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_SIGNATURE: &[u8] = &[0x89, 0x50, 0x4E, 0x47];
const WEBP_SIGNATURE: &[u8] = b"RIFF";
const PDF_SIGNATURE: &[u8] = b"%PDF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    Extension,
    DoubleExtension,
    Signature,
    ModeMismatch,
    TooLarge,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept(MediaKind),
    Reject(Rejection),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept(_))
    }

    fn reject(kind: RejectionKind, reason: impl Into<String>) -> Self {
        Verdict::Reject(Rejection {
            kind,
            reason: reason.into(),
        })
    }
}

/// Signatures registered for a declared MIME type
fn signatures_for(mime: &str) -> &'static [&'static [u8]] {
    match mime {
        "image/jpeg" | "image/jpg" => &[JPEG_SIGNATURE],
        "image/png" => &[PNG_SIGNATURE],
        "image/webp" => &[WEBP_SIGNATURE],
        "application/pdf" => &[PDF_SIGNATURE],
        _ => &[],
    }
}

/// Classify one incoming file for `mode`
pub fn classify(file: &IncomingFile, mode: Mode) -> Verdict {
    let lower = file.name.to_lowercase();

    if !ALLOWED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        return Verdict::reject(
            RejectionKind::Extension,
            format!(
                "Invalid file extension. Allowed: {}",
                ALLOWED_EXTENSIONS.join(", ")
            ),
        );
    }

    if lower.matches('.').count() > 1 {
        let segments: Vec<&str> = lower.rsplitn(3, '.').collect();
        let last_two = format!("{}.{}", segments[1], segments[0]);
        if !ALLOWED_COMPOUND_EXTENSIONS.contains(&last_two.as_str()) {
            return Verdict::reject(
                RejectionKind::DoubleExtension,
                "Suspicious file name detected (double extension)",
            );
        }
    }

    let head = &file.bytes[..file.bytes.len().min(SIGNATURE_LEN)];
    let mime = file.declared_mime.as_str();

    let expected = signatures_for(mime);
    if !expected.is_empty() && !expected.iter().any(|sig| head.starts_with(sig)) {
        return Verdict::reject(
            RejectionKind::Signature,
            format!(
                "File \"{}\" claims to be {} but signature doesn't match. Possible fake extension.",
                file.name, mime
            ),
        );
    }

    if (mime.contains("heic") || mime.contains("heif")) && !has_ftyp_marker(head) {
        return Verdict::reject(
            RejectionKind::Signature,
            format!(
                "File \"{}\" doesn't appear to be a valid HEIC/HEIF file",
                file.name
            ),
        );
    }

    if let Some(reason) = mode_violation(&file.name, mime, mode) {
        return Verdict::reject(RejectionKind::ModeMismatch, reason);
    }

    Verdict::Accept(MediaKind::from_mime(mime))
}

/// Mode rule check on its own; `None` when the type is allowed
pub fn mode_violation(name: &str, mime: &str, mode: Mode) -> Option<String> {
    let rule = mode.rule();
    let accepted = rule.accept.is_empty() || rule.accept.iter().any(|c| c.matches(mime));
    let rejected = rule.reject.iter().any(|c| c.matches(mime));

    if !accepted || rejected {
        Some(format!("{} rejected! {}", name, rule.message))
    } else {
        None
    }
}

/// Per-file ceiling, checked after the gate
pub fn check_size(file: &IncomingFile, max_file_bytes: u64) -> Option<Rejection> {
    if file.size_bytes() > max_file_bytes {
        Some(Rejection {
            kind: RejectionKind::TooLarge,
            reason: format!(
                "File \"{}\" too large! Max {}MB.",
                file.name,
                max_file_bytes / (1024 * 1024)
            ),
        })
    } else {
        None
    }
}

fn has_ftyp_marker(head: &[u8]) -> bool {
    head.get(4..8).is_some_and(|marker| marker == b"ftyp")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, mime: &str, bytes: &[u8]) -> IncomingFile {
        IncomingFile::new(name, mime, bytes.to_vec())
    }

    fn rejection_kind(verdict: Verdict) -> Option<RejectionKind> {
        match verdict {
            Verdict::Reject(r) => Some(r.kind),
            Verdict::Accept(_) => None,
        }
    }

    #[test]
    fn test_png_with_jpeg_bytes_is_rejected() {
        let f = file("photo.png", "image/png", &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0]);
        assert_eq!(rejection_kind(classify(&f, Mode::Pdf)), Some(RejectionKind::Signature));
    }

    #[test]
    fn test_real_jpeg_accepted_for_pdf_mode() {
        let f = file("photo.jpg", "image/jpeg", &[0xFF, 0xD8, 0xFF, 0xE0, 0, 0x10]);
        assert_eq!(classify(&f, Mode::Pdf), Verdict::Accept(MediaKind::Image));
    }

    #[test]
    fn test_pdf_accepted_for_merge_rejected_for_jpeg() {
        let f = file("doc.pdf", "application/pdf", b"%PDF-1.7\n");
        assert_eq!(classify(&f, Mode::Merge), Verdict::Accept(MediaKind::Pdf));
        assert_eq!(rejection_kind(classify(&f, Mode::Jpeg)), Some(RejectionKind::ModeMismatch));
    }

    #[test]
    fn test_unknown_extension_rejected_first() {
        let f = file("notes.txt", "image/png", &[0x89, 0x50, 0x4E, 0x47]);
        assert_eq!(rejection_kind(classify(&f, Mode::Pdf)), Some(RejectionKind::Extension));
    }

    #[test]
    fn test_double_extension_rejected() {
        let f = file("invoice.exe.pdf", "application/pdf", b"%PDF-1.4");
        assert_eq!(
            rejection_kind(classify(&f, Mode::Merge)),
            Some(RejectionKind::DoubleExtension)
        );
    }

    #[test]
    fn test_heic_requires_ftyp_marker() {
        let good = file("IMG.heic", "image/heic", b"\0\0\0\x18ftypheic");
        let bad = file("IMG.heic", "image/heic", b"\0\0\0\x18moov");
        assert!(classify(&good, Mode::Jpeg).is_accept());
        assert_eq!(rejection_kind(classify(&bad, Mode::Jpeg)), Some(RejectionKind::Signature));
    }

    #[test]
    fn test_empty_payload_never_panics() {
        let f = file("empty.png", "image/png", &[]);
        assert_eq!(rejection_kind(classify(&f, Mode::Pdf)), Some(RejectionKind::Signature));
    }

    #[test]
    fn test_size_ceiling() {
        let f = file("big.png", "image/png", &[0u8; 2048]);
        assert!(check_size(&f, 4096).is_none());
        let rejection = check_size(&f, 1024).unwrap();
        assert_eq!(rejection.kind, RejectionKind::TooLarge);
    }

    #[test]
    fn test_mode_violation_message() {
        let msg = mode_violation("a.png", "image/png", Mode::Merge).unwrap();
        assert_eq!(msg, "a.png rejected! Merge mode only accepts PDF files");
    }
}
