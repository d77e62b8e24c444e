//! Rendering surface capabilities.
//!
//! The engine never touches a concrete page. It sees a shoutbox as a
//! [`LineContainer`] (keyed lines plus a scroll position) and a room's tab as
//! a [`TabBadge`]. [`MemoryContainer`] and [`MemoryTab`] are plain in-memory
//! implementations used by tests and embedders; the CLI uses the terminal
//! implementations in [`crate::terminal`].

use std::collections::HashSet;

use crate::markup::escape_html;

// ---------------------------------------------------------------------------
// Rendered line
// ---------------------------------------------------------------------------

/// A display line for one message. Append-only; never updated in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLine {
    /// `cm-{message id}`, unique per container.
    pub key: String,
    /// Local `HH:MM:SS` of the message's creation.
    pub time: String,
    pub user_id: String,
    pub user_name: String,
    pub user_group: String,
    /// Sanitized message body.
    pub body_html: String,
}

impl RenderedLine {
    /// Profile link for the author.
    pub fn user_href(&self) -> String {
        format!("/user/{}", self.user_id)
    }

    /// The `<li>` markup for this line.
    pub fn to_html(&self) -> String {
        format!(
            concat!(
                r#"<li id="{key}" class="shoutbox-line">"#,
                r#"<span class="shoutbox-date">[{time}]</span> "#,
                r#"<span class="shoutbox-user">&lt;<a class="user-group-{group}" href="{href}">{name}</a>&gt;</span> "#,
                r#"<span class="shoutbox-message">{body}</span>"#,
                "</li>"
            ),
            key = self.key,
            time = self.time,
            group = escape_html(&self.user_group),
            href = escape_html(&self.user_href()),
            name = escape_html(&self.user_name),
            body = self.body_html,
        )
    }
}

// ---------------------------------------------------------------------------
// Scroll state
// ---------------------------------------------------------------------------

/// Scroll geometry of a container, in whatever unit the surface uses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollState {
    pub scroll_top: f64,
    pub client_height: f64,
    pub scroll_height: f64,
}

impl ScrollState {
    /// A surface that has no scrolling of its own (always follows new lines).
    pub const PINNED: ScrollState = ScrollState {
        scroll_top: 0.0,
        client_height: 0.0,
        scroll_height: 0.0,
    };

    /// `true` when the viewport shows the bottom of the content, give or take
    /// `slack`, or when the content does not overflow at all.
    pub fn is_at_bottom(&self, slack: f64) -> bool {
        if self.scroll_height <= self.client_height {
            return true;
        }
        self.scroll_top + self.client_height >= self.scroll_height - slack
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// A shoutbox line list.
pub trait LineContainer {
    /// Whether a line with `key` was ever appended.
    fn contains(&self, key: &str) -> bool;
    /// Append `line` as the last child.
    fn append(&mut self, line: RenderedLine);
    fn scroll_state(&self) -> ScrollState;
    fn scroll_to_bottom(&mut self);
}

/// The tab of a room, carrying its unread badge.
pub trait TabBadge {
    fn is_active(&self) -> bool;
    fn set_active(&mut self, active: bool);
    /// Text currently displayed in the badge (may be empty or garbage).
    fn badge_text(&self) -> String;
    fn set_badge_text(&mut self, text: &str);
    fn is_badge_visible(&self) -> bool;
    fn set_badge_visible(&mut self, visible: bool);
}

// ---------------------------------------------------------------------------
// In-memory container
// ---------------------------------------------------------------------------

/// Line list kept in memory with a simulated viewport.
///
/// Each line is `line_height` units tall; the viewport is `client_height`
/// units. `scroll_to` stands in for a user dragging the scrollbar.
#[derive(Debug, Clone)]
pub struct MemoryContainer {
    lines: Vec<RenderedLine>,
    keys: HashSet<String>,
    line_height: f64,
    client_height: f64,
    scroll_top: f64,
}

impl Default for MemoryContainer {
    fn default() -> Self {
        MemoryContainer::with_viewport(20.0, 200.0)
    }
}

impl MemoryContainer {
    pub fn new() -> Self {
        MemoryContainer::default()
    }

    pub fn with_viewport(line_height: f64, client_height: f64) -> Self {
        MemoryContainer {
            lines: Vec::new(),
            keys: HashSet::new(),
            line_height,
            client_height,
            scroll_top: 0.0,
        }
    }

    pub fn lines(&self) -> &[RenderedLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Move the viewport, clamped to the content.
    pub fn scroll_to(&mut self, top: f64) {
        let max = (self.scroll_height() - self.client_height).max(0.0);
        self.scroll_top = top.clamp(0.0, max);
    }

    fn scroll_height(&self) -> f64 {
        self.lines.len() as f64 * self.line_height
    }
}

impl LineContainer for MemoryContainer {
    fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    fn append(&mut self, line: RenderedLine) {
        self.keys.insert(line.key.clone());
        self.lines.push(line);
    }

    fn scroll_state(&self) -> ScrollState {
        ScrollState {
            scroll_top: self.scroll_top,
            client_height: self.client_height,
            scroll_height: self.scroll_height(),
        }
    }

    fn scroll_to_bottom(&mut self) {
        self.scroll_top = (self.scroll_height() - self.client_height).max(0.0);
    }
}

// ---------------------------------------------------------------------------
// In-memory tab
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryTab {
    active: bool,
    badge_text: String,
    badge_visible: bool,
}

impl MemoryTab {
    /// An inactive tab with a hidden, empty badge.
    pub fn new() -> Self {
        MemoryTab::default()
    }

    pub fn active() -> Self {
        MemoryTab {
            active: true,
            ..MemoryTab::default()
        }
    }
}

impl TabBadge for MemoryTab {
    fn is_active(&self) -> bool {
        self.active
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    fn badge_text(&self) -> String {
        self.badge_text.clone()
    }

    fn set_badge_text(&mut self, text: &str) {
        self.badge_text = text.to_string();
    }

    fn is_badge_visible(&self) -> bool {
        self.badge_visible
    }

    fn set_badge_visible(&mut self, visible: bool) {
        self.badge_visible = visible;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn line(key: &str) -> RenderedLine {
        RenderedLine {
            key: key.to_string(),
            time: "12:00:00".to_string(),
            user_id: "u1".to_string(),
            user_name: "alice".to_string(),
            user_group: "g1".to_string(),
            body_html: "<em>hi</em>".to_string(),
        }
    }

    #[test]
    fn to_html_builds_full_line() {
        let html = line("cm-1").to_html();
        assert_eq!(
            html,
            concat!(
                r#"<li id="cm-1" class="shoutbox-line">"#,
                r#"<span class="shoutbox-date">[12:00:00]</span> "#,
                r#"<span class="shoutbox-user">&lt;<a class="user-group-g1" href="/user/u1">alice</a>&gt;</span> "#,
                r#"<span class="shoutbox-message"><em>hi</em></span></li>"#
            )
        );
    }

    #[test]
    fn to_html_escapes_user_name() {
        let mut l = line("cm-2");
        l.user_name = "<img src=x>".to_string();
        let html = l.to_html();
        assert!(html.contains("&lt;img src=x&gt;</a>"), "{html}");
        assert!(!html.contains("<img"), "{html}");
    }

    #[test]
    fn scroll_state_short_content_counts_as_bottom() {
        let s = ScrollState { scroll_top: 0.0, client_height: 100.0, scroll_height: 40.0 };
        assert!(s.is_at_bottom(0.0));
    }

    #[test]
    fn scroll_state_scrolled_up_is_not_bottom() {
        let s = ScrollState { scroll_top: 0.0, client_height: 100.0, scroll_height: 400.0 };
        assert!(!s.is_at_bottom(10.0));
    }

    #[test]
    fn scroll_state_within_slack_is_bottom() {
        let s = ScrollState { scroll_top: 295.0, client_height: 100.0, scroll_height: 400.0 };
        assert!(s.is_at_bottom(10.0));
        assert!(!s.is_at_bottom(0.0));
    }

    #[test]
    fn pinned_constant_is_bottom() {
        assert!(ScrollState::PINNED.is_at_bottom(0.0));
    }

    #[test]
    fn memory_container_tracks_keys_and_order() {
        let mut c = MemoryContainer::new();
        c.append(line("cm-a"));
        c.append(line("cm-b"));
        assert!(c.contains("cm-a"));
        assert!(!c.contains("cm-c"));
        let keys: Vec<&str> = c.lines().iter().map(|l| l.key.as_str()).collect();
        assert_eq!(keys, vec!["cm-a", "cm-b"]);
    }

    #[test]
    fn memory_container_scroll_geometry() {
        let mut c = MemoryContainer::with_viewport(10.0, 30.0);
        for i in 0..5 {
            c.append(line(&format!("cm-{i}")));
        }
        assert_eq!(c.scroll_state().scroll_height, 50.0);
        c.scroll_to_bottom();
        assert_eq!(c.scroll_state().scroll_top, 20.0);
        c.scroll_to(-5.0);
        assert_eq!(c.scroll_state().scroll_top, 0.0);
        c.scroll_to(999.0);
        assert_eq!(c.scroll_state().scroll_top, 20.0);
    }

    #[test]
    fn memory_tab_defaults() {
        let tab = MemoryTab::new();
        assert!(!tab.is_active());
        assert!(!tab.is_badge_visible());
        assert_eq!(tab.badge_text(), "");
        assert!(MemoryTab::active().is_active());
    }
}
