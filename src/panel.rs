//! The state behind the control panel's buttons and dropdowns, and the
//! mapping from each UI action to the one [`Command`] it broadcasts.
//!
//! Labels and enabled flags change as soon as an action is handled, before
//! the command is sent, and do not roll back if the send fails.

use crate::{
    config::{HubConfig, CURSOR_DROPDOWNS},
    error::HubError,
    message::{wire_style, Command, CursorSlot},
};
use chrono::{DateTime, Local, TimeDelta};
use log::{info, warn};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{multispace0, not_line_ending, space0, space1, u8, u64},
    combinator::{all_consuming, map, value},
    number::complete::double,
    sequence::{delimited, preceded, separated_pair, terminated},
    Finish, IResult,
};
use std::str::FromStr;

/// Step of the cursor size spinner.
pub const CURSOR_SIZE_STEP: f64 = 0.1;

/// A discrete action from whatever UI drives the hub.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelEvent {
    /// The start recording button.
    StartRecordingClicked,
    /// The stop recording button.
    StopRecordingClicked,
    /// The button of the named operation.
    ToggleOperation(String),
    /// A cursor dropdown moved to another style.
    CursorVisualChanged {
        /// Which dropdown, `0..4` in [`CursorSlot::ALL`] order.
        dropdown: usize,
        /// The panel's style index, below [`CURSOR_STYLES`](crate::config::CURSOR_STYLES).
        style: u8,
    },
    /// The cursor size spinner. Values are clamped to `0.0..=1.0`.
    CursorSizeChanged(f64),
}

/// When the last recording started, and whether it is still running. The
/// start time is only ever replaced by the next start, so stopping twice
/// measures both stops from the same start.
#[derive(Debug, Default, Clone)]
pub struct RecordingSession {
    started: Option<DateTime<Local>>,
    recording: bool,
}

impl RecordingSession {
    /// Starts a session at `now`. Starting again overwrites the start time.
    pub fn start(&mut self, now: DateTime<Local>) {
        info!("Recording Start Time: {}", now.format("%Y-%m-%d %H:%M:%S"));
        self.started = Some(now);
        self.recording = true;
    }

    /// Ends the session and returns how long it ran since the last start,
    /// or `None` if nothing was ever started.
    pub fn stop(&mut self, now: DateTime<Local>) -> Option<TimeDelta> {
        info!("Recording End Time: {}", now.format("%Y-%m-%d %H:%M:%S"));
        self.recording = false;
        match self.started {
            Some(start) => {
                let elapsed = now - start;
                info!(
                    "Elapsed Time: {} sec",
                    elapsed.num_milliseconds() as f64 / 1000.0
                );
                Some(elapsed)
            }
            None => {
                warn!("stop recording without a start, no elapsed time");
                None
            }
        }
    }

    /// The last start time, kept after the recording stops.
    pub fn started(&self) -> Option<DateTime<Local>> {
        self.started
    }

    /// Whether a start has not been followed by a stop yet.
    pub fn is_recording(&self) -> bool {
        self.recording
    }
}

/// The on/off state of every configured operation, in config order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationToggles {
    operations: Vec<(String, bool)>,
}

impl OperationToggles {
    /// Every operation in `names`, all inactive.
    pub fn new(names: &[String]) -> Self {
        Self {
            operations: names.iter().map(|n| (n.clone(), false)).collect(),
        }
    }

    /// Flips `name` and returns its new state.
    pub fn toggle(&mut self, name: &str) -> Result<bool, HubError> {
        let (_, active) = self
            .operations
            .iter_mut()
            .find(|(n, _)| n == name)
            .ok_or_else(|| HubError::UnknownOperation(name.to_owned()))?;
        *active = !*active;
        Ok(*active)
    }

    /// Whether `name` is running, or `None` if there is no such operation.
    pub fn is_active(&self, name: &str) -> Option<bool> {
        self.operations
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, active)| *active)
    }

    /// The button text for an operation: what pressing it would do.
    pub fn label(name: &str, active: bool) -> String {
        if active {
            format!("Stop {}", name)
        } else {
            format!("Start {}", name)
        }
    }

    /// Each operation and whether it is running, in config order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.operations.iter().map(|(n, a)| (n.as_str(), *a))
    }

    /// The operation behind the `index`-th button.
    pub fn name(&self, index: usize) -> Option<&str> {
        self.operations.get(index).map(|(n, _)| n.as_str())
    }

    /// Number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether no operations are configured.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Everything the operator can see and change on the panel.
#[derive(Debug, Clone)]
pub struct ControlPanel {
    operations: OperationToggles,
    recording: RecordingSession,
    start_label: String,
    start_enabled: bool,
    stop_enabled: bool,
    cursor_styles: [u8; CURSOR_DROPDOWNS],
    cursor_size: f64,
}

impl ControlPanel {
    /// A panel in the config's starting state.
    pub fn new(config: &HubConfig) -> Self {
        Self {
            operations: OperationToggles::new(&config.operations),
            recording: RecordingSession::default(),
            start_label: "Start Recording".to_owned(),
            start_enabled: true,
            stop_enabled: true,
            cursor_styles: config.initial_cursor_visuals,
            cursor_size: clamp_size(config.initial_cursor_size),
        }
    }

    /// The commands that put every headset in the panel's current cursor
    /// state.
    pub fn initial_commands(&self) -> Vec<Command> {
        CursorSlot::ALL
            .iter()
            .zip(self.cursor_styles)
            .map(|(&slot, style)| Command::CursorVisual {
                slot,
                style: wire_style(style),
            })
            .chain(std::iter::once(Command::CursorSize(self.cursor_size)))
            .collect()
    }

    /// Applies one UI action and returns the command it should broadcast.
    pub fn handle(&mut self, event: PanelEvent) -> Result<Command, HubError> {
        self.handle_at(event, Local::now())
    }

    /// [`ControlPanel::handle`] with an explicit clock.
    pub fn handle_at(
        &mut self,
        event: PanelEvent,
        now: DateTime<Local>,
    ) -> Result<Command, HubError> {
        match event {
            PanelEvent::StartRecordingClicked => {
                self.recording.start(now);
                self.start_label = "Recording Sent!".to_owned();
                self.start_enabled = false;
                self.stop_enabled = true;
                Ok(Command::StartRecording)
            }
            PanelEvent::StopRecordingClicked => {
                self.recording.stop(now);
                self.start_label = "Start Recording!".to_owned();
                self.start_enabled = true;
                self.stop_enabled = false;
                Ok(Command::StopRecording)
            }
            PanelEvent::ToggleOperation(name) => {
                let active = self.operations.toggle(&name)?;
                Ok(Command::Operation { name, active })
            }
            PanelEvent::CursorVisualChanged { dropdown, style } => {
                let command = Command::cursor_visual(dropdown, style)?;
                self.cursor_styles[dropdown] = style;
                info!("{}", command);
                Ok(command)
            }
            PanelEvent::CursorSizeChanged(size) => {
                if !size.is_finite() {
                    return Err(HubError::InvalidCursorSize(size));
                }
                self.cursor_size = clamp_size(size);
                let command = Command::CursorSize(self.cursor_size);
                info!("{}", command);
                Ok(command)
            }
        }
    }

    /// The operation toggles.
    pub fn operations(&self) -> &OperationToggles {
        &self.operations
    }

    /// The recording session.
    pub fn recording(&self) -> &RecordingSession {
        &self.recording
    }

    /// Text of the start recording button.
    pub fn start_label(&self) -> &str {
        &self.start_label
    }

    /// Whether the start recording button can be pressed.
    pub fn start_enabled(&self) -> bool {
        self.start_enabled
    }

    /// Whether the stop recording button can be pressed.
    pub fn stop_enabled(&self) -> bool {
        self.stop_enabled
    }

    /// The panel-side style index of a dropdown.
    pub fn cursor_style(&self, dropdown: usize) -> Option<u8> {
        self.cursor_styles.get(dropdown).copied()
    }

    /// The selected cursor size.
    pub fn cursor_size(&self) -> f64 {
        self.cursor_size
    }
}

/// Keeps the size in `0.0..=1.0` and at two decimals, like a spin box would.
fn clamp_size(size: f64) -> f64 {
    (size.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

// Console syntax for headless mode, one action per line:
//
//   start | stop | toggle <name> | cursor <dropdown> <style> | size <value>
fn parse_console_line(s: &str) -> IResult<&str, PanelEvent> {
    all_consuming(delimited(
        space0,
        alt((
            value(PanelEvent::StartRecordingClicked, tag("start")),
            value(PanelEvent::StopRecordingClicked, tag("stop")),
            map(
                preceded(terminated(tag("toggle"), space1), not_line_ending),
                |name: &str| PanelEvent::ToggleOperation(name.trim_end().to_owned()),
            ),
            map(
                preceded(
                    terminated(tag("cursor"), space1),
                    separated_pair(u64, space1, u8),
                ),
                |(dropdown, style)| PanelEvent::CursorVisualChanged {
                    dropdown: dropdown as usize,
                    style,
                },
            ),
            map(
                preceded(terminated(tag("size"), space1), double),
                PanelEvent::CursorSizeChanged,
            ),
        )),
        multispace0,
    ))(s)
}

impl FromStr for PanelEvent {
    type Err = nom::error::Error<String>;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_console_line(s).finish() {
            Ok((_remaining, event)) => Ok(event),
            Err(nom::error::Error { input, code }) => Err(nom::error::Error {
                input: input.to_string(),
                code,
            }),
        }
    }
}
