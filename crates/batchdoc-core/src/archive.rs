//! ZIP archives for multi-file outputs

use crate::error::CollaboratorError;
use crate::media::with_suffix;
use crate::services::{ArchiveEntry, ArchiveService, ServiceResult};
use std::collections::HashSet;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, Clone, Copy)]
pub struct ZipArchiver {
    method: CompressionMethod,
}

impl Default for ZipArchiver {
    fn default() -> Self {
        Self::deflated()
    }
}

impl ZipArchiver {
    pub const fn deflated() -> Self {
        Self {
            method: CompressionMethod::Deflated,
        }
    }

    /// Store entries without compression
    pub fn stored() -> Self {
        Self {
            method: CompressionMethod::Stored,
        }
    }
}

impl ArchiveService for ZipArchiver {
    fn create_archive(&self, entries: &[ArchiveEntry]) -> ServiceResult<Vec<u8>> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(self.method);

        let names = unique_names(entries.iter().map(|e| e.name.as_str()));
        for (name, entry) in names.into_iter().zip(entries) {
            writer
                .start_file(name, options)
                .map_err(|e| CollaboratorError::Archive(e.to_string()))?;
            writer
                .write_all(&entry.bytes)
                .map_err(|e| CollaboratorError::Archive(e.to_string()))?;
        }

        let cursor = writer
            .finish()
            .map_err(|e| CollaboratorError::Archive(e.to_string()))?;
        Ok(cursor.into_inner())
    }
}

/// Make entry names unique: the second `a.png` becomes `a_2.png`
pub fn unique_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut taken = HashSet::new();
    let mut out = Vec::new();

    for name in names {
        let mut candidate = name.to_string();
        let mut n = 2;
        while !taken.insert(candidate.clone()) {
            candidate = with_suffix(name, &n.to_string());
            n += 1;
        }
        out.push(candidate);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Read;
    use zip::ZipArchive;

    fn read_back(bytes: Vec<u8>) -> Vec<(String, Vec<u8>)> {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        (0..archive.len())
            .map(|i| {
                let mut file = archive.by_index(i).unwrap();
                let mut content = Vec::new();
                file.read_to_end(&mut content).unwrap();
                (file.name().to_string(), content)
            })
            .collect()
    }

    #[test]
    fn test_archive_round_trip_keeps_order() {
        let entries = vec![
            ArchiveEntry::new("b.pdf", b"second".to_vec()),
            ArchiveEntry::new("a.pdf", b"first".to_vec()),
        ];
        let zip = ZipArchiver::default().create_archive(&entries).unwrap();
        assert_eq!(
            read_back(zip),
            vec![
                ("b.pdf".to_string(), b"second".to_vec()),
                ("a.pdf".to_string(), b"first".to_vec()),
            ]
        );
    }

    #[test]
    fn test_duplicate_names_are_suffixed() {
        assert_eq!(
            unique_names(["a.png", "a.png", "b", "a.png"]),
            vec!["a.png", "a_2.png", "b", "a_3.png"]
        );

        let entries = vec![
            ArchiveEntry::new("x.jpg", vec![1]),
            ArchiveEntry::new("x.jpg", vec![2]),
        ];
        let zip = ZipArchiver::stored().create_archive(&entries).unwrap();
        let names: Vec<String> = read_back(zip).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["x.jpg", "x_2.jpg"]);
    }
}
