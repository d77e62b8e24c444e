//! Unread badges on inactive room tabs.
//!
//! The counter shown on a tab is the source of truth for increments: the
//! leading digits of the displayed text (none counts as zero) are bumped
//! and written back. A tab that is currently active never counts. Every increment
//! arms a one-shot clear that fires on the next interaction with the tab.

use tracing::debug;

use crate::model::Room;
use crate::surface::TabBadge;

/// Add `delta` unread messages to `room`'s badge.
///
/// Returns `false` without touching anything when the tab is active or
/// `delta` is zero.
pub fn increment<B: TabBadge + ?Sized>(room: &mut Room, tab: &mut B, delta: u32) -> bool {
    if tab.is_active() || delta == 0 {
        return false;
    }

    let count = displayed_count(room.id(), &tab.badge_text()).saturating_add(delta);
    tab.set_badge_text(&count.to_string());
    tab.set_badge_visible(true);
    room.set_unread_count(count);
    room.set_clear_armed(true);
    true
}

/// Handle an interaction with `room`'s tab. Fires the armed clear once:
/// hides the badge and zeroes the counter. No-op when nothing is armed.
pub fn on_interaction<B: TabBadge + ?Sized>(room: &mut Room, tab: &mut B) -> bool {
    if !room.is_clear_armed() {
        return false;
    }
    room.set_clear_armed(false);
    clear(room, tab);
    true
}

/// Hide the badge and reset the counter unconditionally.
pub fn clear<B: TabBadge + ?Sized>(room: &mut Room, tab: &mut B) {
    tab.set_badge_visible(false);
    tab.set_badge_text("");
    room.set_unread_count(0);
}

/// Leading decimal digits of the badge text; anything after them is ignored.
fn displayed_count(room: &str, text: &str) -> u32 {
    let text = text.trim();
    let digits_end = text
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map_or(text.len(), |(i, _)| i);
    let digits = &text[..digits_end];
    if digits.is_empty() {
        if !text.is_empty() {
            debug!(room, badge = text, "unreadable badge counter, starting from zero");
        }
        return 0;
    }
    digits.parse::<u32>().unwrap_or_else(|e| {
        debug!(room, badge = text, error = %e, "badge counter out of range, saturating");
        u32::MAX
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
