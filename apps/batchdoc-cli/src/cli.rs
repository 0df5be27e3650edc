//! Command line arguments and their mapping onto run options

use anyhow::{Context, Result};
use batchdoc_core::pdf::PageSelector;
use batchdoc_core::{Filter, ImageFormat, Mode, RunConfig, SessionConfig};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "batchdoc")]
#[command(version, about = "Batch PDF and image processing")]
pub struct Args {
    /// pdf, jpeg, merge, split, compress, rotate, filter, convert, editor, delete or ocr
    pub mode: Mode,

    /// Files to load, in order
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    /// Directory the result is written to
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Session configuration (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Run options (JSON); flags below override it
    #[arg(long)]
    pub options: Option<PathBuf>,

    /// Only process these input positions (0-based, comma separated)
    #[arg(long, value_delimiter = ',')]
    pub select: Vec<usize>,

    /// Rotation in degrees, clockwise
    #[arg(long, allow_hyphen_values = true)]
    pub rotation: Option<i32>,

    /// grayscale, sepia, invert, brightness, contrast, vintage or blur
    #[arg(long)]
    pub filter: Option<Filter>,

    /// Target format for convert: jpeg, png or webp
    #[arg(long, value_parser = parse_format)]
    pub format: Option<ImageFormat>,

    /// Quality for compress, convert and jpeg (0.0 to 1.0]
    #[arg(long)]
    pub quality: Option<f32>,

    /// Compress: bound the width in pixels
    #[arg(long)]
    pub max_width: Option<u32>,

    /// Compress: bound the height in pixels
    #[arg(long)]
    pub max_height: Option<u32>,

    /// Split: ranges such as "1-3, 4-6"
    #[arg(long, conflicts_with_all = ["every", "pages"])]
    pub ranges: Option<String>,

    /// Split: parts of N pages
    #[arg(long, conflicts_with = "pages")]
    pub every: Option<u32>,

    /// Split: one document with the listed pages, e.g. "1,3,5-7"
    #[arg(long)]
    pub pages: Option<String>,

    /// OCR language code
    #[arg(long)]
    pub language: Option<String>,

    /// Process inline instead of on the resize worker thread
    #[arg(long)]
    pub no_worker: bool,
}

impl Args {
    pub fn session_config(&self) -> Result<SessionConfig> {
        match &self.config {
            Some(path) => SessionConfig::from_file(path),
            None => Ok(SessionConfig::default()),
        }
    }

    /// Options file (if any) with command line overrides applied
    pub fn run_config(&self) -> Result<RunConfig> {
        let mut config = match &self.options {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read options file: {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("Failed to parse options file: {}", path.display()))?
            }
            None => RunConfig::default(),
        };

        if let Some(rotation) = self.rotation {
            config.rotation = rotation;
        }
        if let Some(filter) = self.filter {
            config.filter = filter;
        }
        if let Some(format) = self.format {
            config.target_format = format;
        }
        if let Some(quality) = self.quality {
            config.compress_quality = quality;
            config.convert_quality = quality;
            config.heic_quality = quality;
        }
        if self.max_width.is_some() {
            config.compress_max_width = self.max_width;
        }
        if self.max_height.is_some() {
            config.compress_max_height = self.max_height;
        }
        if let Some(ranges) = &self.ranges {
            config.split = PageSelector::Ranges {
                ranges: ranges.clone(),
            };
        } else if let Some(n) = self.every {
            config.split = PageSelector::EveryN { n };
        } else if let Some(pages) = &self.pages {
            config.split = PageSelector::Pages {
                pages: pages.clone(),
            };
        }
        if let Some(language) = &self.language {
            config.ocr_language = language.clone();
        }

        Ok(config)
    }
}

fn parse_format(s: &str) -> Result<ImageFormat, String> {
    match s.trim().to_ascii_lowercase().as_str() {
        "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
        "png" => Ok(ImageFormat::Png),
        "webp" => Ok(ImageFormat::Webp),
        other => Err(format!("Unknown format: {} (expected jpeg, png or webp)", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("batchdoc").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_without_flags() {
        let args = parse(&["compress", "a.png"]);
        assert_eq!(args.mode, Mode::Compress);
        assert_eq!(args.run_config().unwrap(), RunConfig::default());
        assert!(args.select.is_empty());
    }

    #[test]
    fn test_flags_override_run_options() {
        let args = parse(&[
            "rotate",
            "a.png",
            "b.jpg",
            "--rotation",
            "-90",
            "--select",
            "1,0",
            "--quality",
            "0.5",
        ]);
        let config = args.run_config().unwrap();
        assert_eq!(config.rotation, -90);
        assert_eq!(config.compress_quality, 0.5);
        assert_eq!(args.select, vec![1, 0]);
        assert_eq!(args.inputs.len(), 2);
    }

    #[test]
    fn test_split_selector_flags() {
        let config = parse(&["split", "a.pdf", "--every", "2"]).run_config().unwrap();
        assert_eq!(config.split, PageSelector::EveryN { n: 2 });

        let config = parse(&["split", "a.pdf", "--ranges", "1-2, 3-4"])
            .run_config()
            .unwrap();
        assert_eq!(
            config.split,
            PageSelector::Ranges {
                ranges: "1-2, 3-4".to_string()
            }
        );
    }

    #[test]
    fn test_conflicting_split_flags_rejected() {
        let result = Args::try_parse_from(["batchdoc", "split", "a.pdf", "--every", "2", "--pages", "1"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!(Args::try_parse_from(["batchdoc", "shrink", "a.png"]).is_err());
    }

    #[test]
    fn test_format_parsing() {
        let args = parse(&["convert", "a.png", "--format", "WEBP", "--filter", "sepia"]);
        let config = args.run_config().unwrap();
        assert_eq!(config.target_format, ImageFormat::Webp);
        assert_eq!(config.filter, Filter::Sepia);
    }
}
