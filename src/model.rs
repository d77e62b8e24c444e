//! Wire records and per-room sync state.
//!
//! [`Message`] and [`UserStats`] mirror the JSON the tracker API emits.
//! [`Room`] is the client-side state for one shoutbox: the watermark used for
//! incremental fetches, the unread counter shown on its tab and the in-flight
//! flag that keeps polls for the same room from overlapping. Rooms live in a
//! [`RoomRegistry`] owned by the poller.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One chat message as returned by `GET /api/v1/chat/messages`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique within a room; doubles as the rendered line's key.
    pub id: Uuid,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    pub user_id: Uuid,
    pub user_name: String,
    /// Group id of the author, used to pick the name's display class.
    pub user_group: Uuid,
    /// Raw, unescaped message text.
    pub message: String,
    /// Network id of the room the message was posted to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat: Option<i16>,
}

impl Message {
    /// Key of the rendered line for this message.
    pub fn line_key(&self) -> String {
        format!("cm-{}", self.id)
    }
}

/// Accepts RFC 3339 (`2018-05-01T12:00:00Z`) as well as the naive form the
/// tracker emits for `timestamp` columns (`2018-05-01T12:00:00.123456`), which
/// is taken as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Body of `POST /api/v1/chat/publish`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishMessage {
    pub chat: i16,
    pub message: String,
}

// ---------------------------------------------------------------------------
// User stats
// ---------------------------------------------------------------------------

/// `GET /api/v1/user/stats` payload. Unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub name: String,
    pub downloads: i64,
    pub downloaded: i64,
    pub uploads: i64,
    pub uploaded: i64,
    pub ratio: f64,
}

// ---------------------------------------------------------------------------
// Room
// ---------------------------------------------------------------------------

/// Client-side state of a single shoutbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    id: String,
    network_id: i16,
    last_update: Option<i64>,
    unread_count: u32,
    in_flight: bool,
    clear_armed: bool,
}

impl Room {
    pub fn new(id: impl Into<String>, network_id: i16) -> Self {
        Room {
            id: id.into(),
            network_id,
            last_update: None,
            unread_count: 0,
            in_flight: false,
            clear_armed: false,
        }
    }

    /// Page-level identifier, e.g. `public`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Numeric id sent as `chat=` to the API.
    pub fn network_id(&self) -> i16 {
        self.network_id
    }

    /// Wall-clock seconds of the last successful poll, if any.
    pub fn last_update(&self) -> Option<i64> {
        self.last_update
    }

    pub fn unread_count(&self) -> u32 {
        self.unread_count
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// `true` until the first successful poll has set a watermark.
    pub fn is_first_run(&self) -> bool {
        self.last_update.is_none()
    }

    /// Move the watermark forward to `now`. Never moves it backwards, so a
    /// wall clock that steps back cannot reopen an already-covered window.
    pub(crate) fn advance_watermark(&mut self, now: i64) {
        self.last_update = Some(self.last_update.map_or(now, |prev| prev.max(now)));
    }

    pub(crate) fn set_unread_count(&mut self, count: u32) {
        self.unread_count = count;
    }

    /// Whether the one-shot badge clear is waiting for a tab interaction.
    pub fn is_clear_armed(&self) -> bool {
        self.clear_armed
    }

    pub(crate) fn set_clear_armed(&mut self, armed: bool) {
        self.clear_armed = armed;
    }

    /// Mark a poll as started. Returns `false` if one is already running.
    pub(crate) fn try_begin_poll(&mut self) -> bool {
        if self.in_flight {
            return false;
        }
        self.in_flight = true;
        true
    }

    pub(crate) fn finish_poll(&mut self) {
        self.in_flight = false;
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Every room known to the page, in declaration order. Rooms are never
/// removed for the lifetime of the registry.
#[derive(Debug, Clone, Default)]
pub struct RoomRegistry {
    rooms: Vec<Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        RoomRegistry::default()
    }

    /// Register a room. If the id is already taken the existing room is kept
    /// and `false` is returned.
    pub fn register(&mut self, room: Room) -> bool {
        if self.get(room.id()).is_some() {
            return false;
        }
        self.rooms.push(room);
        true
    }

    pub fn get(&self, id: &str) -> Option<&Room> {
        self.rooms.iter().find(|r| r.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut Room> {
        self.rooms.iter_mut().find(|r| r.id == id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.rooms.iter().map(|r| r.id.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.iter()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
