//! Hub configuration. Every field has a default, so a config file only needs
//! to mention what it changes. Files are written in [ron]:
//!
//! ```text
//! (
//!     broadcast_port: 7788,
//!     operations: ["Suturing", "Incision"],
//!     bind_max_attempts: Some(10),
//! )
//! ```

use crate::error::HubError;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

/// The number of cursor dropdowns on the panel.
pub const CURSOR_DROPDOWNS: usize = 4;

/// Number of styles on each cursor dropdown: hidden, then three styles.
pub const CURSOR_STYLES: u8 = 4;

/// Tunables for both channels, the retry policies, and the panel's starting
/// state.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct HubConfig {
    /// Port of the one-to-many command/telemetry publisher.
    pub broadcast_port: u16,
    /// Port of the identity-routed gaze/handshake receiver.
    pub ingest_port: u16,
    /// Interface both endpoints bind on, `*` for all of them.
    pub bind_host: String,

    /// Delay between attempts to bind the broadcast endpoint at startup.
    pub bind_retry_delay_ms: u64,
    /// Upper bound on broadcast bind attempts, `None` to retry forever.
    pub bind_max_attempts: Option<u32>,

    /// Sends attempted per command before the channel is rebound.
    pub send_retries: u32,
    /// Delay between command send attempts.
    pub send_retry_delay_ms: u64,

    /// Bounded wait of one listener poll, also its stop-check interval.
    pub poll_timeout_ms: u64,
    /// Period of the aggregated gaze broadcast.
    pub telemetry_period_ms: u64,

    /// Names of the operations the panel can start and stop.
    pub operations: Vec<String>,
    /// Style index selected on each cursor dropdown at startup.
    pub initial_cursor_visuals: [u8; CURSOR_DROPDOWNS],
    /// Cursor size selected at startup.
    pub initial_cursor_size: f64,
    /// Broadcast the initial cursor visuals and size once bound.
    pub send_initial_state: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            broadcast_port: 7788,
            ingest_port: 7789,
            bind_host: "*".to_owned(),
            bind_retry_delay_ms: 1000,
            bind_max_attempts: None,
            send_retries: 5,
            send_retry_delay_ms: 1000,
            poll_timeout_ms: 100,
            telemetry_period_ms: 100,
            operations: vec!["Operation".to_owned()],
            // Both own cursors and the surgeon's view of the trainee hidden,
            // the trainee sees the surgeon's cursor in style 2.
            initial_cursor_visuals: [0, 0, 0, 2],
            initial_cursor_size: 0.25,
            send_initial_state: true,
        }
    }
}

impl HubConfig {
    /// Reads a config from a RON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HubError> {
        let text = fs::read_to_string(path)?;
        Self::from_ron(&text)
    }

    /// Parses a config from RON text and checks the panel's starting state.
    pub fn from_ron(text: &str) -> Result<Self, HubError> {
        let config: Self = ron::de::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the initial cursor state is something the panel could
    /// have selected.
    pub fn validate(&self) -> Result<(), HubError> {
        if let Some(&style) = self
            .initial_cursor_visuals
            .iter()
            .find(|&&style| style >= CURSOR_STYLES)
        {
            return Err(HubError::InvalidStyle(style));
        }
        if !self.initial_cursor_size.is_finite() {
            return Err(HubError::InvalidCursorSize(self.initial_cursor_size));
        }
        Ok(())
    }

    /// Renders the config as pretty RON, handy as a starting point for a
    /// config file.
    pub fn to_ron(&self) -> Result<String, HubError> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    /// Where the broadcast socket binds, e.g. `tcp://*:7788`.
    pub fn broadcast_endpoint(&self) -> String {
        format!("tcp://{}:{}", self.bind_host, self.broadcast_port)
    }

    /// Where the ingest socket binds.
    pub fn ingest_endpoint(&self) -> String {
        format!("tcp://{}:{}", self.bind_host, self.ingest_port)
    }

    /// [`HubConfig::bind_retry_delay_ms`] as a [`Duration`].
    pub fn bind_retry_delay(&self) -> Duration {
        Duration::from_millis(self.bind_retry_delay_ms)
    }

    /// [`HubConfig::send_retry_delay_ms`] as a [`Duration`].
    pub fn send_retry_delay(&self) -> Duration {
        Duration::from_millis(self.send_retry_delay_ms)
    }

    /// [`HubConfig::poll_timeout_ms`] as a [`Duration`].
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// [`HubConfig::telemetry_period_ms`] as a [`Duration`].
    pub fn telemetry_period(&self) -> Duration {
        Duration::from_millis(self.telemetry_period_ms)
    }
}
