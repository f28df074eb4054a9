//! Seams to the external layout provider and scroll consumers.
//!
//! The engine never lays anything out. It asks a [`LayoutProvider`] where
//! lines are and tells [`ScrollSink`]s where to scroll.

use std::ops::Range;
use std::sync::mpsc::Sender;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Geometry of one rendered line, addressed by its word range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineLayout {
    pub token_range: Range<usize>,
    pub pixel_top: f64,
    pub pixel_height: f64,
}

pub trait LayoutProvider {
    /// Lines in document order. May be empty while the renderer catches up.
    fn lines(&self) -> Vec<LineLayout>;

    fn viewport_height(&self) -> f64;

    fn scroll_offset(&self) -> f64;

    /// Total scrollable content height when the renderer knows it without
    /// line geometry.
    fn content_height(&self) -> Option<f64> {
        None
    }
}

/// A scroll instruction, delivered verbatim to every sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollCommand {
    pub offset: f64,
    /// Offset over the scrollable range, in `0..=1`.
    pub ratio: f64,
    /// Monotonic per engine instance.
    pub sequence: u64,
    pub timestamp_ms: u64,
    /// Engine instance that produced the command.
    pub source: Uuid,
}

pub trait ScrollSink {
    fn apply(&mut self, command: &ScrollCommand);
}

/// Mirrors commands to another thread, e.g. a display window.
impl ScrollSink for Sender<ScrollCommand> {
    fn apply(&mut self, command: &ScrollCommand) {
        if self.send(command.clone()).is_err() {
            tracing::debug!(target: "scriptsync::scroll", sequence = command.sequence, "mirror sink disconnected");
        }
    }
}

/// Layout held in memory, for hosts that compute geometry themselves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StaticLayout {
    pub lines: Vec<LineLayout>,
    pub viewport_height: f64,
    pub scroll_offset: f64,
}

impl StaticLayout {
    /// One line per `(start, end)` word range, each `line_height` pixels tall.
    #[must_use]
    pub fn uniform(ranges: &[(usize, usize)], line_height: f64, viewport_height: f64) -> Self {
        let lines = ranges
            .iter()
            .enumerate()
            .map(|(i, &(start, end))| LineLayout {
                token_range: start..end,
                pixel_top: i as f64 * line_height,
                pixel_height: line_height,
            })
            .collect();
        Self {
            lines,
            viewport_height,
            scroll_offset: 0.0,
        }
    }

    pub fn apply_command(&mut self, command: &ScrollCommand) {
        self.scroll_offset = command.offset;
    }
}

impl LayoutProvider for StaticLayout {
    fn lines(&self) -> Vec<LineLayout> {
        self.lines.clone()
    }

    fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }
}

/// Everything the scroll controller reads from the provider in one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewportSnapshot {
    pub lines: Vec<LineLayout>,
    pub viewport_height: f64,
    pub scroll_offset: f64,
    pub content_height: f64,
}

impl ViewportSnapshot {
    pub fn capture<L: LayoutProvider + ?Sized>(layout: &L) -> Self {
        let lines = layout.lines();
        let from_lines = lines
            .last()
            .map_or(0.0, |line| line.pixel_top + line.pixel_height);
        let content_height = layout
            .content_height()
            .map_or(from_lines, |height| height.max(from_lines));
        Self {
            lines,
            viewport_height: layout.viewport_height().max(0.0),
            scroll_offset: layout.scroll_offset().max(0.0),
            content_height,
        }
    }

    #[must_use]
    pub fn max_scroll(&self) -> f64 {
        (self.content_height - self.viewport_height).max(0.0)
    }

    #[must_use]
    pub fn scroll_ratio(&self, offset: f64) -> f64 {
        let max = self.max_scroll();
        if max <= 0.0 {
            0.0
        } else {
            (offset / max).clamp(0.0, 1.0)
        }
    }

    /// Line containing `word`, by binary search over token ranges.
    #[must_use]
    pub fn line_for_word(&self, word: usize) -> Option<&LineLayout> {
        let idx = self
            .lines
            .partition_point(|line| line.token_range.end <= word);
        self.lines
            .get(idx)
            .filter(|line| line.token_range.contains(&word))
    }

    /// Line whose box spans `y` (content coordinates), else the nearest one.
    #[must_use]
    pub fn line_at_y(&self, y: f64) -> Option<&LineLayout> {
        let idx = self.lines.partition_point(|line| line.pixel_top + line.pixel_height <= y);
        self.lines.get(idx).or_else(|| self.lines.last())
    }

    /// Pixel top for `word`, interpolating across lines the provider skipped
    /// and scaling by progress when only the content height is known.
    #[must_use]
    pub fn estimate_top(&self, word: usize, total_words: usize) -> Option<f64> {
        if let Some(line) = self.line_for_word(word) {
            return Some(line.pixel_top);
        }
        let after = self
            .lines
            .partition_point(|line| line.token_range.end <= word);
        match (after.checked_sub(1).and_then(|i| self.lines.get(i)), self.lines.get(after)) {
            (Some(prev), Some(next)) => {
                let span = next.token_range.start.saturating_sub(prev.token_range.end).max(1);
                let into = word.saturating_sub(prev.token_range.end) as f64 / span as f64;
                let bottom = prev.pixel_top + prev.pixel_height;
                Some(bottom + (next.pixel_top - bottom) * into)
            }
            (Some(prev), None) => Some(prev.pixel_top),
            (None, Some(next)) => Some(next.pixel_top),
            (None, None) if self.content_height > 0.0 && total_words > 0 => {
                Some(self.content_height * (word as f64 / total_words as f64))
            }
            (None, None) => None,
        }
    }
}
