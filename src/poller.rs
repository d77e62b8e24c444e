//! Per-room incremental polling.
//!
//! Each tick, every room is fetched with its watermark as `since=`. A
//! successful answer advances the watermark to the *local* wall clock (never
//! a message timestamp), appends the new lines oldest first and counts the
//! ones actually added on the unread badge of inactive tabs. Any failure leaves the room untouched so the
//! next tick retries the same window; the appender's id dedup absorbs any
//! message delivered twice.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let mut poller = RoomPollerBuilder::new(ApiClient::new(&config)?)
//!     .poll_interval(Duration::from_secs(5))
//!     .build();
//! poller.add_room(Room::new("public", 1), container, tab);
//! poller.run(focus_rx).await;
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::appender::LineAppender;
use crate::badge;
use crate::error::ShoutboxError;
use crate::markup::MarkupRenderer;
use crate::model::{Message, Room, RoomRegistry};
use crate::surface::{LineContainer, TabBadge};
use crate::transport::{ChatTransport, MessageQuery};

/// Consecutive failures of one room after which logging escalates to `error`.
const FAILURE_ESCALATION: u32 = 5;

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of wall-clock epoch seconds for watermarks.
pub trait Clock: Send + Sync {
    fn now_secs(&self) -> i64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(now: i64) -> Self {
        ManualClock {
            now: Arc::new(AtomicI64::new(now)),
        }
    }

    pub fn set(&self, now: i64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_secs(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub poll_interval: Duration,
    /// `limit=` sent with every fetch.
    pub limit: Option<u32>,
    /// Seconds subtracted from the watermark when building `since=`.
    pub since_overlap: i64,
}

impl Default for PollerConfig {
    /// - poll_interval: 5 s
    /// - limit: server default
    /// - since_overlap: 0 s
    fn default() -> Self {
        PollerConfig {
            poll_interval: Duration::from_secs(5),
            limit: None,
            since_overlap: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Poll bookkeeping
// ---------------------------------------------------------------------------

/// What a single poll did to its room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Unknown room, or a poll for it was already in flight.
    Skipped,
    /// Transport, HTTP or JSON failure; nothing changed.
    Failed,
    /// Success without a payload; nothing changed.
    Empty,
    Applied {
        fetched: usize,
        appended: usize,
        first_run: bool,
    },
}

/// A started poll. Obtained from [`RoomPoller::begin_poll`] and handed back
/// to [`RoomPoller::complete_poll`] with the fetch result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollTicket {
    room_id: String,
    query: MessageQuery,
    first_run: bool,
}

impl PollTicket {
    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn query(&self) -> &MessageQuery {
        &self.query
    }

    pub fn is_first_run(&self) -> bool {
        self.first_run
    }
}

/// Clears the in-flight flag of `rooms` when dropped, including when the
/// fetch future it lives in is cancelled.
struct InFlightRelease<'a> {
    registry: &'a mut RoomRegistry,
    rooms: Vec<String>,
}

impl<'a> InFlightRelease<'a> {
    fn new(registry: &'a mut RoomRegistry, rooms: Vec<String>) -> Self {
        InFlightRelease { registry, rooms }
    }
}

impl Drop for InFlightRelease<'_> {
    fn drop(&mut self) {
        for id in &self.rooms {
            if let Some(room) = self.registry.get_mut(id) {
                room.finish_poll();
            }
        }
    }
}

/// The rendering surfaces of one room.
#[derive(Debug, Clone)]
pub struct RoomView<C, B> {
    pub container: C,
    pub tab: B,
}

// ---------------------------------------------------------------------------
// RoomPoller
// ---------------------------------------------------------------------------

/// Owns the room registry and keeps every room's surfaces in sync with the
/// server. All state changes happen synchronously between awaits, so the
/// poller needs no locking.
pub struct RoomPoller<T, C, B> {
    config: PollerConfig,
    transport: T,
    registry: RoomRegistry,
    views: HashMap<String, RoomView<C, B>>,
    appender: LineAppender,
    clock: Box<dyn Clock>,
    failures: HashMap<String, u32>,
}

impl<T, C, B> RoomPoller<T, C, B>
where
    T: ChatTransport,
    C: LineContainer,
    B: TabBadge,
{
    /// Register a room with its surfaces. Returns `false` if the id is taken.
    pub fn add_room(&mut self, room: Room, container: C, tab: B) -> bool {
        let id = room.id().to_string();
        if !self.registry.register(room) {
            return false;
        }
        self.views.insert(id, RoomView { container, tab });
        true
    }

    pub fn registry(&self) -> &RoomRegistry {
        &self.registry
    }

    pub fn room(&self, id: &str) -> Option<&Room> {
        self.registry.get(id)
    }

    pub fn view(&self, id: &str) -> Option<&RoomView<C, B>> {
        self.views.get(id)
    }

    pub fn view_mut(&mut self, id: &str) -> Option<&mut RoomView<C, B>> {
        self.views.get_mut(id)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &PollerConfig {
        &self.config
    }

    /// Start a poll for `room_id`: marks the room in flight and captures the
    /// query. `None` for an unknown room or one whose poll has not completed.
    pub fn begin_poll(&mut self, room_id: &str) -> Option<PollTicket> {
        let room = self.registry.get_mut(room_id)?;
        if !room.try_begin_poll() {
            debug!(room = room_id, "poll already in flight, skipping tick");
            return None;
        }
        let since = room
            .last_update()
            .map(|ts| ts.saturating_sub(self.config.since_overlap));
        Some(PollTicket {
            room_id: room_id.to_string(),
            query: MessageQuery {
                network_id: room.network_id(),
                since,
                limit: self.config.limit,
            },
            first_run: room.is_first_run(),
        })
    }

    /// Apply the result of a fetch started with [`begin_poll`](Self::begin_poll).
    ///
    /// Errors are logged and swallowed; they never reach the caller.
    pub fn complete_poll(
        &mut self,
        ticket: PollTicket,
        result: Result<Option<Vec<Message>>, ShoutboxError>,
    ) -> PollOutcome {
        let Some(room) = self.registry.get_mut(&ticket.room_id) else {
            return PollOutcome::Skipped;
        };
        room.finish_poll();

        let mut messages = match result {
            Err(e) => {
                let failures = self.failures.entry(ticket.room_id.clone()).or_insert(0);
                *failures = failures.saturating_add(1);
                if *failures >= FAILURE_ESCALATION {
                    error!(
                        room = %ticket.room_id,
                        error = %e,
                        consecutive_failures = *failures,
                        "chat poll failed repeatedly, will retry next tick"
                    );
                } else {
                    warn!(room = %ticket.room_id, error = %e, "chat poll failed, will retry next tick");
                }
                return PollOutcome::Failed;
            }
            Ok(None) => {
                self.failures.remove(&ticket.room_id);
                debug!(room = %ticket.room_id, "chat poll returned no payload");
                return PollOutcome::Empty;
            }
            Ok(Some(messages)) => messages,
        };
        self.failures.remove(&ticket.room_id);

        room.advance_watermark(self.clock.now_secs());

        let fetched = messages.len();
        let Some(view) = self.views.get_mut(&ticket.room_id) else {
            return PollOutcome::Applied {
                fetched,
                appended: 0,
                first_run: ticket.first_run,
            };
        };

        // Transport order is newest first; render oldest first. The stable
        // sort keeps server order for equal timestamps.
        messages.reverse();
        messages.sort_by_key(|m| m.created_at);

        let appended = messages
            .iter()
            .filter(|m| self.appender.append_line(&mut view.container, m))
            .count();

        // Only lines that were actually new count as unread.
        if !ticket.first_run && appended > 0 {
            let delta = u32::try_from(appended).unwrap_or(u32::MAX);
            badge::increment(room, &mut view.tab, delta);
        }

        if appended > 0 {
            debug!(room = %ticket.room_id, fetched, appended, "shoutbox updated");
        }

        PollOutcome::Applied {
            fetched,
            appended,
            first_run: ticket.first_run,
        }
    }

    /// Poll a single room.
    ///
    /// Dropping the returned future mid-fetch releases the room, so the next
    /// poll goes ahead with the unchanged watermark.
    pub async fn poll_room(&mut self, room_id: &str) -> PollOutcome {
        let Some(ticket) = self.begin_poll(room_id) else {
            return PollOutcome::Skipped;
        };
        let result = {
            let _release = InFlightRelease::new(&mut self.registry, vec![ticket.room_id.clone()]);
            self.transport.fetch_messages(&ticket.query).await
        };
        self.complete_poll(ticket, result)
    }

    /// Poll every room. Fetches run concurrently; results are applied one
    /// room at a time in registry order.
    pub async fn poll_all(&mut self) -> Vec<(String, PollOutcome)> {
        let mut outcomes = Vec::with_capacity(self.registry.len());
        let mut tickets = Vec::with_capacity(self.registry.len());
        for id in self.registry.ids() {
            match self.begin_poll(&id) {
                Some(ticket) => tickets.push(ticket),
                None => outcomes.push((id, PollOutcome::Skipped)),
            }
        }

        let results = {
            let rooms = tickets.iter().map(|t| t.room_id.clone()).collect();
            let _release = InFlightRelease::new(&mut self.registry, rooms);
            let transport = &self.transport;
            join_all(tickets.iter().map(|t| transport.fetch_messages(&t.query))).await
        };

        for (ticket, result) in tickets.into_iter().zip(results) {
            let id = ticket.room_id.clone();
            let outcome = self.complete_poll(ticket, result);
            outcomes.push((id, outcome));
        }
        outcomes
    }

    /// Make `room_id`'s tab the active one and deactivate the others. The
    /// interaction fires the room's armed badge clear. No request is made.
    pub fn activate_tab(&mut self, room_id: &str) -> bool {
        if !self.views.contains_key(room_id) {
            return false;
        }
        for (id, view) in self.views.iter_mut() {
            view.tab.set_active(id == room_id);
        }
        if let (Some(room), Some(view)) = (self.registry.get_mut(room_id), self.views.get_mut(room_id)) {
            badge::on_interaction(room, &mut view.tab);
        }
        true
    }

    /// Run the polling loop indefinitely.
    ///
    /// Each tick polls every room. Room ids received on `focus` switch the
    /// active tab between ticks. Failures are soft: the room keeps its
    /// watermark and is retried on the next tick.
    ///
    /// Drop the future to stop; an in-flight fetch is abandoned.
    pub async fn run(mut self, mut focus: mpsc::Receiver<String>) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut focus_open = true;

        info!(
            rooms = self.registry.len(),
            interval = ?self.config.poll_interval,
            "shoutbox polling started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_all().await;
                }
                id = focus.recv(), if focus_open => match id {
                    Some(id) => {
                        if !self.activate_tab(&id) {
                            warn!(room = %id, "cannot focus unknown room");
                        }
                    }
                    None => focus_open = false,
                },
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`RoomPoller`].
///
/// # Example
/// ```rust,ignore
/// let poller = RoomPollerBuilder::new(transport)
///     .poll_interval(Duration::from_secs(10))
///     .page_location(Url::parse("https://tracker.example/")?)
///     .build();
/// ```
pub struct RoomPollerBuilder<T> {
    transport: T,
    config: PollerConfig,
    page_location: Option<Url>,
    clock: Box<dyn Clock>,
}

impl<T: ChatTransport> RoomPollerBuilder<T> {
    pub fn new(transport: T) -> Self {
        RoomPollerBuilder {
            transport,
            config: PollerConfig::default(),
            page_location: None,
            clock: Box::new(SystemClock),
        }
    }

    /// Override the polling interval (default 5 s).
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn limit(mut self, limit: Option<u32>) -> Self {
        self.config.limit = limit;
        self
    }

    /// Re-request this many seconds before the watermark (default 0).
    pub fn since_overlap(mut self, secs: i64) -> Self {
        self.config.since_overlap = secs.max(0);
        self
    }

    /// Location relative links in messages are resolved against.
    pub fn page_location(mut self, url: Url) -> Self {
        self.page_location = Some(url);
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn build<C, B>(self) -> RoomPoller<T, C, B>
    where
        C: LineContainer,
        B: TabBadge,
    {
        RoomPoller {
            config: self.config,
            transport: self.transport,
            registry: RoomRegistry::new(),
            views: HashMap::new(),
            appender: LineAppender::new(MarkupRenderer::new(self.page_location)),
            clock: self.clock,
            failures: HashMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
