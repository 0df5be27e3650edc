//! Virtualized grid viewport
//!
//! Decides which slice of the registry is materialized for a grid of fixed
//! size tiles. Small sets are rendered in full.

use crate::config::ViewportConfig;
use serde::{Deserialize, Serialize};

/// Half-open range of registry indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ViewportRange {
    pub start: usize,
    pub end: usize,
}

impl ViewportRange {
    pub fn full(total: usize) -> Self {
        Self { start: 0, end: total }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end
    }
}

/// Range of tiles to materialize for a scroll position.
///
/// Degenerate geometry (non-positive item height, zero tiles per row) falls
/// back to the full range.
pub fn compute_range(
    scroll_offset: f64,
    container_height: f64,
    item_height: f64,
    items_per_row: usize,
    total_items: usize,
    buffer_rows: usize,
) -> ViewportRange {
    if item_height <= 0.0 || items_per_row == 0 || !item_height.is_finite() {
        return ViewportRange::full(total_items);
    }

    let first_row = (scroll_offset.max(0.0) / item_height).floor() as usize;
    let visible_rows = (container_height.max(0.0) / item_height).ceil() as usize;

    let start_row = first_row.saturating_sub(buffer_rows);
    let end_row = first_row
        .saturating_add(visible_rows)
        .saturating_add(buffer_rows);

    let start = start_row.saturating_mul(items_per_row).min(total_items);
    let end = end_row.saturating_mul(items_per_row).min(total_items);

    ViewportRange { start, end }
}

/// Tiles that fit across the container, never less than one
pub fn items_per_row(container_width: f64, item_width: f64) -> usize {
    if item_width <= 0.0 || !container_width.is_finite() {
        return 1;
    }
    ((container_width / item_width).floor() as usize).max(1)
}

/// Viewport state for one preview grid
#[derive(Debug, Clone)]
pub struct Viewport {
    config: ViewportConfig,
    items_per_row: usize,
    container_height: f64,
    scroll_offset: f64,
    total_items: usize,
    range: ViewportRange,
    last_scroll_ms: Option<f64>,
}

impl Viewport {
    pub fn new(config: ViewportConfig) -> Self {
        Self {
            config,
            items_per_row: 1,
            container_height: 0.0,
            scroll_offset: 0.0,
            total_items: 0,
            range: ViewportRange::default(),
            last_scroll_ms: None,
        }
    }

    pub fn range(&self) -> ViewportRange {
        self.range
    }

    pub fn items_per_row(&self) -> usize {
        self.items_per_row
    }

    /// Virtualization only kicks in above the threshold
    pub fn is_virtualized(&self) -> bool {
        self.total_items > self.config.threshold
    }

    /// Scroll event; returns the new range when it changed.
    ///
    /// Events closer than the throttle interval to the last accepted one are
    /// ignored.
    pub fn on_scroll(&mut self, scroll_offset: f64, now_ms: f64) -> Option<ViewportRange> {
        if let Some(last) = self.last_scroll_ms {
            if now_ms - last < self.config.scroll_throttle_ms as f64 {
                return None;
            }
        }
        self.last_scroll_ms = Some(now_ms);
        self.scroll_offset = scroll_offset;
        self.recompute()
    }

    /// Container resize; never throttled
    pub fn on_resize(&mut self, container_width: f64, container_height: f64) -> Option<ViewportRange> {
        self.items_per_row = items_per_row(container_width, self.config.item_width);
        self.container_height = container_height;
        self.recompute()
    }

    /// Registry length changed
    pub fn set_total(&mut self, total_items: usize) -> Option<ViewportRange> {
        self.total_items = total_items;
        self.recompute()
    }

    pub fn refresh(&mut self) -> ViewportRange {
        self.recompute();
        self.range
    }

    /// Full scroll height of the grid
    pub fn total_height(&self) -> f64 {
        let rows = self.total_items.div_ceil(self.items_per_row.max(1));
        rows as f64 * self.config.item_height
    }

    /// Translate offset of the first materialized row
    pub fn offset_y(&self) -> f64 {
        (self.range.start / self.items_per_row.max(1)) as f64 * self.config.item_height
    }

    fn recompute(&mut self) -> Option<ViewportRange> {
        let next = if self.is_virtualized() {
            compute_range(
                self.scroll_offset,
                self.container_height,
                self.config.item_height,
                self.items_per_row,
                self.total_items,
                self.config.buffer_rows,
            )
        } else {
            ViewportRange::full(self.total_items)
        };

        if next != self.range {
            self.range = next;
            Some(next)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_range_top_of_large_set() {
        let range = compute_range(0.0, 620.0, 155.0, 5, 200, 5);
        assert_eq!(range, ViewportRange { start: 0, end: 45 });
    }

    #[test]
    fn test_compute_range_scrolled() {
        // row 20 at the top, 4 visible rows, 5 rows buffer each side
        let range = compute_range(3100.0, 620.0, 155.0, 5, 200, 5);
        assert_eq!(range, ViewportRange { start: 75, end: 145 });
    }

    #[test]
    fn test_compute_range_clamps_to_total() {
        let range = compute_range(30_000.0, 620.0, 155.0, 5, 200, 5);
        assert_eq!(range.end, 200);
        assert!(range.start <= range.end);
    }

    #[test]
    fn test_degenerate_geometry_is_full_range() {
        assert_eq!(compute_range(0.0, 600.0, 0.0, 5, 10, 5), ViewportRange::full(10));
        assert_eq!(compute_range(0.0, 600.0, 155.0, 0, 10, 5), ViewportRange::full(10));
    }

    #[test]
    fn test_small_sets_are_not_virtualized() {
        let mut viewport = Viewport::new(ViewportConfig::default());
        viewport.on_resize(775.0, 620.0);
        viewport.set_total(50);
        assert!(!viewport.is_virtualized());
        assert_eq!(viewport.range(), ViewportRange::full(50));
    }

    #[test]
    fn test_scroll_is_throttled() {
        let mut viewport = Viewport::new(ViewportConfig::default());
        viewport.on_resize(775.0, 620.0);
        viewport.set_total(200);
        assert_eq!(viewport.range(), ViewportRange { start: 0, end: 45 });

        assert!(viewport.on_scroll(3100.0, 1_000.0).is_some());
        // within 100ms of the last accepted event
        assert!(viewport.on_scroll(0.0, 1_050.0).is_none());
        assert_eq!(viewport.range().start, 75);
        assert!(viewport.on_scroll(0.0, 1_100.0).is_some());
    }

    #[test]
    fn test_geometry_for_host() {
        let mut viewport = Viewport::new(ViewportConfig::default());
        viewport.on_resize(775.0, 620.0);
        viewport.set_total(201);
        assert_eq!(viewport.items_per_row(), 5);
        assert_eq!(viewport.total_height(), 41.0 * 155.0);
        viewport.on_scroll(3100.0, 0.0);
        assert_eq!(viewport.offset_y(), 15.0 * 155.0);
    }

    #[test]
    fn test_items_per_row_never_zero() {
        assert_eq!(items_per_row(100.0, 155.0), 1);
        assert_eq!(items_per_row(800.0, 155.0), 5);
    }
}
