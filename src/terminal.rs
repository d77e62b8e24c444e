//! Terminal rendering surface for the CLI.
//!
//! Lines from every room share one output stream, prefixed with the room id.
//! The HTML fragment produced by the markup stage is mapped onto terminal
//! styles: strong → bold, em → italic, code → yellow, links → underlined
//! label followed by the target. Badges become one-line notices.

use std::collections::HashSet;
use std::io::{self, Stdout, Write};

use colored::*;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::warn;

use crate::stats::StatsHeader;
use crate::surface::{LineContainer, RenderedLine, ScrollState, TabBadge};

static LINK_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<a href="([^"]*)" target="_blank">(.*?)</a>"#).expect("link tag pattern is valid")
});
static STRONG_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<strong>(.*?)</strong>").expect("strong tag pattern is valid"));
static EM_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<em>(.*?)</em>").expect("em tag pattern is valid"));
static CODE_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<code>(.*?)</code>").expect("code tag pattern is valid"));

/// Convert a sanitized message fragment into styled terminal text.
pub fn fragment_to_ansi(html: &str) -> String {
    let text = LINK_TAG.replace_all(html, |caps: &Captures| {
        format!("{} <{}>", caps[2].underline(), &caps[1])
    });
    let text = STRONG_TAG.replace_all(&text, |caps: &Captures| caps[1].bold().to_string());
    let text = EM_TAG.replace_all(&text, |caps: &Captures| caps[1].italic().to_string());
    let text = CODE_TAG.replace_all(&text, |caps: &Captures| caps[1].yellow().to_string());
    text.replace("&lt;", "<").replace("&gt;", ">").replace("&quot;", "\"")
}

fn write_or_warn<W: Write>(out: &mut W, text: &str) {
    if let Err(e) = writeln!(out, "{text}").and_then(|_| out.flush()) {
        warn!(error = %e, "could not write to terminal");
    }
}

// ---------------------------------------------------------------------------
// Container
// ---------------------------------------------------------------------------

/// Prints each appended line once. The terminal always follows new output,
/// so the scroll state is permanently pinned to the bottom.
pub struct TerminalContainer<W: Write = Stdout> {
    room: String,
    out: W,
    keys: HashSet<String>,
}

impl TerminalContainer<Stdout> {
    pub fn stdout(room: impl Into<String>) -> Self {
        TerminalContainer::new(room, io::stdout())
    }
}

impl<W: Write> TerminalContainer<W> {
    pub fn new(room: impl Into<String>, out: W) -> Self {
        TerminalContainer {
            room: room.into(),
            out,
            keys: HashSet::new(),
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    fn format_line(&self, line: &RenderedLine) -> String {
        format!(
            "{} {} <{}> {}",
            format!("[{}]", line.time).dimmed(),
            format!("#{}", self.room).cyan(),
            line.user_name.bold(),
            fragment_to_ansi(&line.body_html)
        )
    }
}

impl<W: Write> LineContainer for TerminalContainer<W> {
    fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    fn append(&mut self, line: RenderedLine) {
        let text = self.format_line(&line);
        write_or_warn(&mut self.out, &text);
        self.keys.insert(line.key);
    }

    fn scroll_state(&self) -> ScrollState {
        ScrollState::PINNED
    }

    fn scroll_to_bottom(&mut self) {}
}

// ---------------------------------------------------------------------------
// Tab
// ---------------------------------------------------------------------------

/// A room "tab" in the terminal: tracks focus and announces unread counts.
pub struct TerminalTab<W: Write = Stdout> {
    room: String,
    active: bool,
    badge_text: String,
    badge_visible: bool,
    out: W,
}

impl TerminalTab<Stdout> {
    pub fn stdout(room: impl Into<String>, active: bool) -> Self {
        TerminalTab::new(room, active, io::stdout())
    }
}

impl<W: Write> TerminalTab<W> {
    pub fn new(room: impl Into<String>, active: bool, out: W) -> Self {
        TerminalTab {
            room: room.into(),
            active,
            badge_text: String::new(),
            badge_visible: false,
            out,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }
}

impl<W: Write> TabBadge for TerminalTab<W> {
    fn is_active(&self) -> bool {
        self.active
    }

    fn set_active(&mut self, active: bool) {
        if active && !self.active {
            let notice = format!("-- following #{} --", self.room);
            write_or_warn(&mut self.out, &notice.green().to_string());
        }
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
        if visible {
            let notice = format!("-- #{}: {} unread --", self.room, self.badge_text);
            write_or_warn(&mut self.out, &notice.magenta().to_string());
        }
        self.badge_visible = visible;
    }
}

/// Print the stats header as a single styled line.
pub fn print_stats<W: Write>(out: &mut W, header: &StatsHeader) -> io::Result<()> {
    writeln!(
        out,
        "{} | down {} ({}) | up {} ({}) | ratio {}",
        header.name.bold(),
        header.downloads,
        header.downloaded.red(),
        header.uploads,
        header.uploaded.green(),
        header.ratio.bold()
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn line(key: &str, body: &str) -> RenderedLine {
        RenderedLine {
            key: key.to_string(),
            time: "08:15:00".to_string(),
            user_id: "u".to_string(),
            user_name: "dave".to_string(),
            user_group: "g".to_string(),
            body_html: body.to_string(),
        }
    }

    fn output(bytes: &[u8]) -> String {
        String::from_utf8_lossy(bytes).into_owned()
    }

    #[test]
    fn fragment_unescapes_brackets() {
        assert_eq!(fragment_to_ansi("&lt;script&gt;"), "<script>");
    }

    #[test]
    fn fragment_shows_link_target() {
        let out = fragment_to_ansi(r#"<a href="https://a.example/" target="_blank">docs</a>"#);
        assert!(out.contains("docs"), "{out}");
        assert!(out.contains("<https://a.example/>"), "{out}");
        assert!(!out.contains("href"), "{out}");
    }

    #[test]
    fn fragment_strips_style_tags() {
        let out = fragment_to_ansi("<strong>a</strong> <em>b</em> <code>c</code>");
        for tag in ["<strong>", "</em>", "<code>"] {
            assert!(!out.contains(tag), "{tag} left in {out}");
        }
        assert!(out.contains('a') && out.contains('b') && out.contains('c'));
    }

    #[test]
    fn container_prints_each_key_once() {
        let mut c = TerminalContainer::new("public", Vec::new());
        c.append(line("cm-1", "hello"));
        assert!(c.contains("cm-1"));
        let text = output(c.get_ref());
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains("08:15:00"), "{text}");
        assert!(text.contains("#public"), "{text}");
        assert!(text.contains("dave"), "{text}");
        assert!(text.contains("hello"), "{text}");
    }

    #[test]
    fn container_is_always_pinned() {
        let c = TerminalContainer::new("public", Vec::new());
        assert!(c.scroll_state().is_at_bottom(0.0));
    }

    #[test]
    fn tab_announces_badge() {
        let mut tab = TerminalTab::new("team", false, Vec::new());
        tab.set_badge_text("3");
        tab.set_badge_visible(true);
        let text = output(tab.get_ref());
        assert!(text.contains("#team: 3 unread"), "{text}");
    }

    #[test]
    fn tab_hiding_badge_is_silent() {
        let mut tab = TerminalTab::new("team", false, Vec::new());
        tab.set_badge_visible(false);
        assert!(tab.get_ref().is_empty());
    }

    #[test]
    fn tab_announces_focus_change_once() {
        let mut tab = TerminalTab::new("team", false, Vec::new());
        tab.set_active(true);
        tab.set_active(true);
        let text = output(tab.get_ref());
        assert_eq!(text.matches("following #team").count(), 1);
    }

    #[test]
    fn stats_line_contains_values() {
        let header = StatsHeader {
            name: "erin".into(),
            downloads: "1".into(),
            downloaded: "1.00 KiB".into(),
            uploads: "2".into(),
            uploaded: "2.00 KiB".into(),
            ratio: "2.000".into(),
        };
        let mut buf = Vec::new();
        print_stats(&mut buf, &header).unwrap();
        let text = output(&buf);
        assert!(text.contains("1.00 KiB") && text.contains("2.000"), "{text}");
    }
}
