//! Client configuration.
//!
//! Settings come from three layers, later ones winning: built-in defaults,
//! an optional TOML file, and command-line flags (applied by the CLI). A
//! minimal file looks like:
//!
//! ```toml
//! base_url = "https://tracker.example"
//! session_cookie = "ripalt_session=..."
//! poll_interval_secs = 5
//!
//! [[rooms]]
//! id = "public"
//! nid = 1
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, ShoutboxError};

/// One shoutbox the client follows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Page-level identifier, e.g. `public`.
    pub id: String,
    /// Numeric id used as `chat=` in API requests.
    #[serde(rename = "nid", alias = "network_id")]
    pub network_id: i16,
}

impl RoomConfig {
    pub fn new(id: impl Into<String>, network_id: i16) -> Self {
        RoomConfig { id: id.into(), network_id }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Origin of the tracker, also the base for relative links in messages.
    pub base_url: String,
    /// Sent verbatim as the `Cookie` header on every request.
    pub session_cookie: Option<String>,
    pub poll_interval_secs: u64,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    /// `limit=` for message fetches; the server default applies when unset.
    pub limit: Option<u32>,
    /// Subtracted from the watermark when building `since=`. Zero keeps the
    /// plain wall-clock watermark.
    pub since_overlap_secs: i64,
    /// Room whose tab starts out active.
    pub focus: Option<String>,
    pub rooms: Vec<RoomConfig>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            base_url: "http://127.0.0.1:8081".to_string(),
            session_cookie: None,
            poll_interval_secs: 5,
            connect_timeout_secs: 3,
            request_timeout_secs: 10,
            limit: None,
            since_overlap_secs: 0,
            focus: None,
            rooms: vec![RoomConfig::new("public", 1), RoomConfig::new("team", 2)],
        }
    }
}

impl ClientConfig {
    /// Read and validate a TOML config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate TOML. Missing keys take their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: ClientConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the cross-field rules serde cannot express.
    pub fn validate(&self) -> Result<()> {
        self.base_url()?;
        if self.rooms.is_empty() {
            return Err(ShoutboxError::Config("at least one room is required".into()));
        }
        let mut seen = HashSet::new();
        for room in &self.rooms {
            if !seen.insert(room.id.as_str()) {
                return Err(ShoutboxError::Config(format!("duplicate room id '{}'", room.id)));
            }
        }
        if let Some(focus) = &self.focus {
            if !seen.contains(focus.as_str()) {
                return Err(ShoutboxError::Config(format!("focus room '{focus}' is not configured")));
            }
        }
        if self.poll_interval_secs == 0 {
            return Err(ShoutboxError::Config("poll_interval_secs must be positive".into()));
        }
        if self.since_overlap_secs < 0 {
            return Err(ShoutboxError::Config("since_overlap_secs must not be negative".into()));
        }
        Ok(())
    }

    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url).map_err(|source| ShoutboxError::InvalidUrl {
            input: self.base_url.clone(),
            source,
        })
    }

    pub fn room(&self, id: &str) -> Option<&RoomConfig> {
        self.rooms.iter().find(|r| r.id == id)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let cfg = ClientConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.poll_interval(), Duration::from_secs(5));
        assert_eq!(cfg.connect_timeout(), Duration::from_secs(3));
        assert_eq!(cfg.request_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.rooms.len(), 2);
    }

    #[test]
    fn empty_file_takes_defaults() {
        let cfg = ClientConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, ClientConfig::default());
    }

    #[test]
    fn parses_rooms_with_nid_key() {
        let cfg = ClientConfig::from_toml_str(
            r#"
            base_url = "https://tracker.example"
            poll_interval_secs = 2
            limit = 25
            focus = "team"

            [[rooms]]
            id = "team"
            nid = 2
            "#,
        )
        .unwrap();
        assert_eq!(cfg.rooms, vec![RoomConfig::new("team", 2)]);
        assert_eq!(cfg.limit, Some(25));
        assert_eq!(cfg.poll_interval(), Duration::from_secs(2));
        assert_eq!(cfg.base_url().unwrap().host_str(), Some("tracker.example"));
        assert_eq!(cfg.room("team").unwrap().network_id, 2);
    }

    #[test]
    fn rejects_duplicate_rooms() {
        let err = ClientConfig::from_toml_str(
            r#"
            [[rooms]]
            id = "public"
            nid = 1
            [[rooms]]
            id = "public"
            nid = 3
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate room id"), "{err}");
    }

    #[test]
    fn rejects_unknown_focus() {
        let err = ClientConfig::from_toml_str(r#"focus = "lobby""#).unwrap_err();
        assert!(matches!(err, ShoutboxError::Config(_)));
    }

    #[test]
    fn rejects_bad_base_url() {
        let err = ClientConfig::from_toml_str(r#"base_url = "not a url""#).unwrap_err();
        assert!(matches!(err, ShoutboxError::InvalidUrl { .. }));
    }

    #[test]
    fn rejects_zero_interval() {
        let err = ClientConfig::from_toml_str("poll_interval_secs = 0").unwrap_err();
        assert!(matches!(err, ShoutboxError::Config(_)));
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = ClientConfig::from_toml_str("rooms = 3").unwrap_err();
        assert!(matches!(err, ShoutboxError::Toml(_)));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "session_cookie = \"sid=abc\"").unwrap();
        let cfg = ClientConfig::load(file.path()).unwrap();
        assert_eq!(cfg.session_cookie.as_deref(), Some("sid=abc"));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ShoutboxError::Io(_)));
    }
}
