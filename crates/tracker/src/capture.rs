//! Turns platform signals into page views and interaction events.

use chrono::{DateTime, Utc};
use footprint_core::limits::SCROLL_MILESTONES;
use footprint_core::{
    truncate_element_text, Browser, DeviceType, InteractionEvent, InteractionType, PageView,
    SessionId,
};
use std::time::Duration;

use crate::platform::{ElementInfo, PageContext, ScrollMetrics};

/// Scroll depth in percent: `scrollTop / (documentHeight - windowHeight)`,
/// clamped to `[0, 100]`.
pub fn scroll_depth(metrics: &ScrollMetrics) -> f64 {
    let scrollable = metrics.document_height - metrics.window_height;
    if !scrollable.is_finite() || scrollable <= 0.0 {
        // Nothing to scroll; any offset means the bottom is in view.
        return if metrics.scroll_top > 0.0 { 100.0 } else { 0.0 };
    }
    let depth = metrics.scroll_top / scrollable * 100.0;
    if depth.is_nan() {
        0.0
    } else {
        depth.clamp(0.0, 100.0)
    }
}

/// Outcome of the terminal unload of a page.
#[derive(Debug, Clone, PartialEq)]
pub struct Finalized {
    pub view: PageView,
    pub owes_summary: bool,
}

struct PageState {
    view: PageView,
    loaded_at: DateTime<Utc>,
    milestones_reached: usize,
    last_move_at: Option<DateTime<Utc>>,
    /// A summary went out and nothing has happened since.
    summarized: bool,
    finalized: bool,
}

impl PageState {
    fn freeze(&mut self, now: DateTime<Utc>, exit_page: bool) -> PageView {
        let elapsed = (now - self.loaded_at).num_milliseconds().max(0);
        self.view.duration_seconds = elapsed as f64 / 1000.0;
        self.view.exit_page = exit_page;
        self.summarized = true;
        self.view.clone()
    }
}

/// Capture state for the current page load.
pub struct EventCapture {
    move_sample_interval: Option<Duration>,
    page: Option<PageState>,
}

impl EventCapture {
    pub fn new(move_sample_interval: Option<Duration>) -> Self {
        Self {
            move_sample_interval,
            page: None,
        }
    }

    /// Starts a page view and returns its draft (`duration_seconds = 0`),
    /// along with the frozen view of the page it replaces when that one was
    /// still live (`exit_page = false`).
    pub fn page_loaded(
        &mut self,
        session_id: SessionId,
        ctx: &PageContext,
        now: DateTime<Utc>,
    ) -> (PageView, Option<PageView>) {
        let previous = self
            .page
            .as_mut()
            .filter(|p| !p.finalized)
            .map(|p| p.freeze(now, false));
        let view = PageView {
            session_id,
            page_path: ctx.path().to_string(),
            page_title: ctx.title.clone(),
            timestamp: now,
            duration_seconds: 0.0,
            scroll_depth_percent: 0.0,
            exit_page: false,
            device_type: DeviceType::from_width(ctx.viewport_width),
            browser: Browser::from_user_agent(&ctx.user_agent),
            viewport_width: ctx.viewport_width,
            viewport_height: ctx.viewport_height,
        };
        self.page = Some(PageState {
            view: view.clone(),
            loaded_at: now,
            milestones_reached: 0,
            last_move_at: None,
            summarized: false,
            finalized: false,
        });
        (view, previous)
    }

    fn live_page(&mut self) -> Option<&mut PageState> {
        let page = self.page.as_mut().filter(|p| !p.finalized)?;
        page.summarized = false;
        Some(page)
    }

    /// Updates the running max scroll depth. Returns a `scroll` interaction
    /// for every milestone crossed for the first time.
    pub fn scrolled(&mut self, metrics: &ScrollMetrics, now: DateTime<Utc>) -> Vec<InteractionEvent> {
        let Some(page) = self.live_page() else {
            return Vec::new();
        };
        if !page.view.record_scroll_depth(scroll_depth(metrics)) {
            return Vec::new();
        }

        let depth = page.view.scroll_depth_percent;
        let mut events = Vec::new();
        while page.milestones_reached < SCROLL_MILESTONES.len()
            && depth >= SCROLL_MILESTONES[page.milestones_reached]
        {
            let milestone = SCROLL_MILESTONES[page.milestones_reached];
            events.push(interaction(
                &page.view,
                InteractionType::Scroll,
                format!("scroll:{}", milestone as u32),
                String::new(),
                0.0,
                metrics.scroll_top,
                now,
            ));
            page.milestones_reached += 1;
        }
        events
    }

    /// Records a click on `target` at viewport coordinates.
    pub fn clicked(
        &mut self,
        target: &ElementInfo,
        x: f64,
        y: f64,
        now: DateTime<Utc>,
    ) -> Option<InteractionEvent> {
        let page = self.live_page()?;
        Some(interaction(
            &page.view,
            InteractionType::Click,
            target.selector(),
            truncate_element_text(&target.text),
            x,
            y,
            now,
        ))
    }

    /// Samples a pointer move, at most one per configured interval.
    pub fn pointer_moved(&mut self, x: f64, y: f64, now: DateTime<Utc>) -> Option<InteractionEvent> {
        let interval = self.move_sample_interval?;
        let page = self.live_page()?;

        if let Some(last) = page.last_move_at {
            let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
            if elapsed < interval {
                return None;
            }
        }
        page.last_move_at = Some(now);
        Some(interaction(
            &page.view,
            InteractionType::Move,
            String::new(),
            String::new(),
            x,
            y,
            now,
        ))
    }

    /// Snapshot for a hidden tab. The page keeps capturing; returns `None`
    /// when no page is live or nothing happened since the last summary.
    pub fn checkpoint(&mut self, now: DateTime<Utc>) -> Option<PageView> {
        let page = self
            .page
            .as_mut()
            .filter(|p| !p.finalized && !p.summarized)?;
        Some(page.freeze(now, true))
    }

    /// The tab is visible again; the next hide or unload owes a summary.
    pub fn resume(&mut self) {
        self.live_page();
    }

    /// Freezes the page view for unload. Returns `None` if there is no page
    /// or it was already finalized; `owes_summary` is false when a
    /// hidden-tab summary already covered it.
    pub fn finalize(&mut self, now: DateTime<Utc>) -> Option<Finalized> {
        let page = self.page.as_mut().filter(|p| !p.finalized)?;
        let owes_summary = !page.summarized;
        let view = if owes_summary {
            page.freeze(now, true)
        } else {
            page.view.clone()
        };
        page.finalized = true;
        Some(Finalized { view, owes_summary })
    }

    pub fn current_view(&self) -> Option<&PageView> {
        self.page.as_ref().map(|p| &p.view)
    }

    pub fn is_finalized(&self) -> bool {
        self.page.as_ref().is_some_and(|p| p.finalized)
    }
}

fn interaction(
    view: &PageView,
    event_type: InteractionType,
    element_selector: String,
    element_text: String,
    x: f64,
    y: f64,
    now: DateTime<Utc>,
) -> InteractionEvent {
    InteractionEvent {
        session_id: view.session_id.clone(),
        event_type,
        element_selector,
        element_text,
        x_position: x,
        y_position: y,
        viewport_width: view.viewport_width,
        viewport_height: view.viewport_height,
        timestamp: now,
        page_path: view.page_path.clone(),
    }
}
