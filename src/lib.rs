//! Shoutbox synchronization for tracker chat rooms.
//!
//! Keeps one or more shoutboxes in sync with the tracker's JSON API by
//! polling: per-room incremental fetches keyed on a wall-clock watermark,
//! idempotent id-keyed line rendering, unread badges for inactive tabs and a
//! constrained inline markup sanitizer for message text.
//!
//! The rendering surface is abstract ([`surface::LineContainer`],
//! [`surface::TabBadge`]); the crate ships in-memory and terminal
//! implementations.

pub mod appender;
pub mod badge;
pub mod cli;
pub mod config;
pub mod error;
pub mod markup;
pub mod model;
pub mod poller;
pub mod stats;
pub mod surface;
pub mod terminal;
pub mod transport;

pub use appender::LineAppender;
pub use config::{ClientConfig, RoomConfig};
pub use error::{Result, ShoutboxError};
pub use markup::MarkupRenderer;
pub use model::{Message, Room, RoomRegistry, UserStats};
pub use poller::{Clock, ManualClock, PollOutcome, RoomPoller, RoomPollerBuilder, SystemClock};
pub use surface::{LineContainer, MemoryContainer, MemoryTab, RenderedLine, ScrollState, TabBadge};
pub use transport::{ApiClient, ChatTransport, MessageQuery};
