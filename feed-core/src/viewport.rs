//! Viewport tracking for the open comment thread.
//!
//! A pure observer: it is fed the comment list length and scroll
//! measurements, and answers whether the view should jump to the bottom or
//! raise a "new messages" indicator instead of moving under the reader.

/// Default distance from the bottom, in pixels, that still counts as "at the bottom".
pub const DEFAULT_BOTTOM_THRESHOLD_PX: f64 = 100.0;

/// Scroll position of the comment panel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollMetrics {
    /// Distance scrolled from the top.
    pub scroll_top: f64,
    /// Height of the visible area.
    pub viewport_height: f64,
    /// Total height of the laid-out content.
    pub content_height: f64,
}

impl ScrollMetrics {
    /// Distance between the bottom of the viewport and the end of the content.
    pub fn distance_from_bottom(&self) -> f64 {
        (self.content_height - self.scroll_top - self.viewport_height).max(0.0)
    }
}

/// What the view should do in response to an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportSignal {
    /// Nothing to do.
    None,
    /// Scroll to reveal the newest comment.
    ScrollToBottom,
    /// Show the sticky "new messages" indicator.
    ShowIndicator,
}

/// Tracks bottom-anchoring for one open discussion.
#[derive(Debug, Clone)]
pub struct ViewportTracker {
    threshold_px: f64,
    last_len: usize,
    indicator: bool,
    pending_initial_scroll: bool,
    metrics: Option<ScrollMetrics>,
}

impl ViewportTracker {
    /// Create a tracker with the given bottom threshold.
    pub fn new(threshold_px: f64) -> Self {
        Self {
            threshold_px: threshold_px.max(0.0),
            last_len: 0,
            indicator: false,
            pending_initial_scroll: false,
            metrics: None,
        }
    }

    /// A discussion was opened: reset and force a scroll to the bottom once
    /// content is laid out.
    pub fn on_open(&mut self) {
        self.reset();
        self.pending_initial_scroll = true;
    }

    /// Return to the initial state (discussion closed).
    pub fn reset(&mut self) {
        self.last_len = 0;
        self.indicator = false;
        self.pending_initial_scroll = false;
        self.metrics = None;
    }

    /// Content was laid out with the given measurements.
    pub fn on_layout(&mut self, metrics: ScrollMetrics) -> ViewportSignal {
        self.metrics = Some(metrics);
        if self.pending_initial_scroll && metrics.content_height > 0.0 {
            self.pending_initial_scroll = false;
            return ViewportSignal::ScrollToBottom;
        }
        ViewportSignal::None
    }

    /// The viewer scrolled. Reaching the bottom clears the indicator.
    pub fn on_scroll(&mut self, metrics: ScrollMetrics) {
        self.metrics = Some(metrics);
        if self.is_near_bottom() {
            self.indicator = false;
        }
    }

    /// The comment list changed length.
    pub fn on_list_len(&mut self, len: usize) -> ViewportSignal {
        let grew = len > self.last_len;
        let first_content = self.last_len == 0;
        self.last_len = len;

        if !grew {
            return ViewportSignal::None;
        }
        if self.pending_initial_scroll || first_content || self.is_near_bottom() {
            return ViewportSignal::ScrollToBottom;
        }
        self.indicator = true;
        ViewportSignal::ShowIndicator
    }

    /// Record a length change that is not an arrival, such as a removal
    /// or a failed removal put back. Never signals.
    pub fn note_len(&mut self, len: usize) {
        self.last_len = len;
    }

    /// The viewer clicked the indicator.
    pub fn on_indicator_clicked(&mut self) -> ViewportSignal {
        self.indicator = false;
        ViewportSignal::ScrollToBottom
    }

    /// Whether the "new messages" indicator is showing.
    pub fn indicator_visible(&self) -> bool {
        self.indicator
    }

    /// Whether the last measurement is within the threshold of the bottom.
    /// Without a measurement the viewer is assumed to be at the bottom.
    pub fn is_near_bottom(&self) -> bool {
        self.metrics
            .map(|m| m.distance_from_bottom() <= self.threshold_px)
            .unwrap_or(true)
    }
}

impl Default for ViewportTracker {
    fn default() -> Self {
        Self::new(DEFAULT_BOTTOM_THRESHOLD_PX)
    }
}
