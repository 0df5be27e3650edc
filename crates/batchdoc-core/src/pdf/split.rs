//! Page extraction and split planning

use super::{load, save};
use crate::error::CollaboratorError;
use crate::services::PagePlan;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Copy of the document holding only `pages` (1-indexed).
///
/// Pages come out in document order; duplicates collapse.
pub fn extract_pages(bytes: &[u8], pages: &[u32]) -> Result<Vec<u8>, CollaboratorError> {
    if pages.is_empty() {
        return Err(CollaboratorError::UnsupportedStructure(
            "No pages specified".into(),
        ));
    }
    if pages.contains(&0) {
        return Err(CollaboratorError::UnsupportedStructure(
            "Page numbers must be >= 1".into(),
        ));
    }

    let mut doc = load(bytes, 0)?;
    let page_count = doc.get_pages().len() as u32;

    if let Some(&missing) = pages.iter().find(|&&p| p > page_count) {
        return Err(CollaboratorError::UnsupportedStructure(format!(
            "Page {} does not exist (document has {} pages)",
            missing, page_count
        )));
    }

    let keep: BTreeSet<u32> = pages.iter().copied().collect();
    let drop: Vec<u32> = (1..=page_count).filter(|p| !keep.contains(p)).collect();
    if !drop.is_empty() {
        doc.delete_pages(&drop);
    }

    doc.prune_objects();
    doc.compress();
    save(&mut doc)
}

/// How one document is cut into parts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum PageSelector {
    /// One part per page
    #[default]
    EachPage,
    /// Comma separated `start-end` ranges, one part each
    Ranges { ranges: String },
    /// Consecutive parts of `n` pages
    EveryN { n: u32 },
    /// A single part with the listed pages
    Pages { pages: String },
}

impl PageSelector {
    /// Plans for a document of `page_count` pages.
    ///
    /// Unusable input is reported in the returned warnings rather than
    /// failing the whole document.
    pub fn plan(&self, page_count: u32) -> (Vec<PagePlan>, Vec<String>) {
        let mut warnings = Vec::new();

        let plans = match self {
            PageSelector::EachPage => (1..=page_count)
                .map(|p| PagePlan {
                    pages: vec![p],
                    suffix: format!("page_{}", p),
                })
                .collect(),

            PageSelector::Ranges { ranges } => ranges
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .filter_map(|part| match parse_range(part, page_count) {
                    Some((start, end)) => Some(PagePlan {
                        pages: (start..=end).collect(),
                        suffix: format!("pages_{}-{}", start, end),
                    }),
                    None => {
                        warnings.push(format!("Invalid range: {}", part));
                        None
                    }
                })
                .collect(),

            PageSelector::EveryN { n } => {
                if *n == 0 {
                    warnings.push("Invalid number!".to_string());
                    Vec::new()
                } else {
                    (1..=page_count)
                        .step_by(*n as usize)
                        .enumerate()
                        .map(|(part, start)| PagePlan {
                            pages: (start..=start.saturating_add(n - 1).min(page_count)).collect(),
                            suffix: format!("part_{}", part + 1),
                        })
                        .collect()
                }
            }

            PageSelector::Pages { pages } => {
                let valid: BTreeSet<u32> = pages
                    .split(',')
                    .filter_map(|p| p.trim().parse::<u32>().ok())
                    .filter(|p| (1..=page_count).contains(p))
                    .collect();
                if valid.is_empty() {
                    warnings.push("No valid pages specified!".to_string());
                    Vec::new()
                } else {
                    let suffix = valid
                        .iter()
                        .map(u32::to_string)
                        .collect::<Vec<_>>()
                        .join("_");
                    vec![PagePlan {
                        pages: valid.into_iter().collect(),
                        suffix: format!("pages_{}", suffix),
                    }]
                }
            }
        };

        (plans, warnings)
    }

    /// Check the selector before a run starts
    pub fn validate(&self) -> Result<(), String> {
        match self {
            PageSelector::EveryN { n: 0 } => Err("split every N pages needs N >= 1".into()),
            PageSelector::Ranges { ranges } if ranges.trim().is_empty() => {
                Err("no page ranges given".into())
            }
            PageSelector::Pages { pages } if pages.trim().is_empty() => {
                Err("no pages given".into())
            }
            _ => Ok(()),
        }
    }
}

/// `start-end` within `1..=page_count`
fn parse_range(part: &str, page_count: u32) -> Option<(u32, u32)> {
    let (start, end) = part.split_once('-')?;
    let start: u32 = start.trim().parse().ok()?;
    let end: u32 = end.trim().parse().ok()?;
    (start >= 1 && end <= page_count && start <= end).then_some((start, end))
}
