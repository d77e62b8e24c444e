//! Idempotent, id-keyed line append.
//!
//! A message is rendered into a [`RenderedLine`] and appended to its
//! container at most once; a redelivered message is a silent no-op. When the
//! reader was at the bottom of the container before the append, the view
//! follows the new line; a reader who scrolled up is left where they are.

use chrono::{DateTime, Local, TimeZone, Utc};

use crate::markup::MarkupRenderer;
use crate::model::Message;
use crate::surface::{LineContainer, RenderedLine};

/// Distance from the bottom, in surface units, that still counts as "at the
/// bottom" for auto-scroll.
pub const DEFAULT_SCROLL_SLACK: f64 = 8.0;

#[derive(Debug, Clone)]
pub struct LineAppender {
    renderer: MarkupRenderer,
    scroll_slack: f64,
}

impl Default for LineAppender {
    fn default() -> Self {
        LineAppender::new(MarkupRenderer::default())
    }
}

impl LineAppender {
    pub fn new(renderer: MarkupRenderer) -> Self {
        LineAppender {
            renderer,
            scroll_slack: DEFAULT_SCROLL_SLACK,
        }
    }

    pub fn with_scroll_slack(mut self, slack: f64) -> Self {
        self.scroll_slack = slack;
        self
    }

    pub fn renderer(&self) -> &MarkupRenderer {
        &self.renderer
    }

    /// Append `message` to `container` unless a line with its key exists.
    ///
    /// Returns `true` when a line was appended.
    pub fn append_line<C: LineContainer + ?Sized>(&self, container: &mut C, message: &Message) -> bool {
        let key = message.line_key();
        if container.contains(&key) {
            return false;
        }

        let follow = container.scroll_state().is_at_bottom(self.scroll_slack);
        container.append(self.build_line(message));
        if follow {
            container.scroll_to_bottom();
        }
        true
    }

    /// Render `message` without touching any container.
    pub fn build_line(&self, message: &Message) -> RenderedLine {
        RenderedLine {
            key: message.line_key(),
            time: format_clock(&message.created_at, &Local),
            user_id: message.user_id.to_string(),
            user_name: message.user_name.clone(),
            user_group: message.user_group.to_string(),
            body_html: self.renderer.render(&message.message),
        }
    }
}

/// `HH:MM:SS` of `ts` in `tz`, every field zero-padded to two digits.
pub fn format_clock<Tz>(ts: &DateTime<Utc>, tz: &Tz) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    ts.with_timezone(tz).format("%H:%M:%S").to_string()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
