//! The plain-text vocabulary spoken on both channels.
//!
//! Outbound, on the broadcast channel, every message is a [`Command`]:
//!
//! ```text
//! DataCollection: Start Recording
//! Suturing: Stop
//! User1/OtherCursorVisual: 4
//! CursorSize: 0.25
//! Gaze: clientA/1.0,2.0,3.0;clientB/0,0,0;
//! ```
//!
//! Inbound, on the ingest channel, every message has two parts, the sender's
//! identity and a body, which is either a `BUILD: <n>` handshake or an opaque
//! gaze string; see [`Inbound`].

use crate::{config::CURSOR_STYLES, error::HubError, identity::ClientIdentity};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_till1, take_until},
    character::complete::{char, multispace0, space0, u64, u8},
    combinator::{all_consuming, map, rest, value},
    multi::many0,
    number::complete::double,
    sequence::{delimited, preceded, separated_pair, terminated},
    Finish, IResult,
};
use std::{fmt, str::FromStr};

/// Prefix of the aggregated telemetry tick.
pub const GAZE_TAG: &str = "Gaze";

/// Prefix of a client's build handshake.
pub const BUILD_TAG: &str = "BUILD:";

/// The four cursor dropdowns, in panel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorSlot {
    /// User 1's view of their own cursor
    User1Mine,
    /// User 2's view of their own cursor
    User2Mine,
    /// User 1's view of user 2's cursor
    User1Other,
    /// User 2's view of user 1's cursor
    User2Other,
}

impl CursorSlot {
    /// Every slot, indexed by dropdown.
    pub const ALL: [CursorSlot; 4] = [
        CursorSlot::User1Mine,
        CursorSlot::User2Mine,
        CursorSlot::User1Other,
        CursorSlot::User2Other,
    ];

    /// Looks up the slot behind a panel dropdown.
    pub fn from_dropdown(index: usize) -> Result<Self, HubError> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(HubError::InvalidDropdown(index))
    }

    /// The topic this slot is addressed by on the wire.
    pub fn topic(&self) -> &'static str {
        match self {
            CursorSlot::User1Mine => "User1/MyCursorVisual",
            CursorSlot::User2Mine => "User2/MyCursorVisual",
            CursorSlot::User1Other => "User1/OtherCursorVisual",
            CursorSlot::User2Other => "User2/OtherCursorVisual",
        }
    }

    /// A human label for the panel.
    pub fn label(&self) -> &'static str {
        match self {
            CursorSlot::User1Mine => "User 0 - Self Cursor Style",
            CursorSlot::User2Mine => "User 1 - Self Cursor Style",
            CursorSlot::User1Other => "User 0 - Other Cursor Style",
            CursorSlot::User2Other => "User 1 - Other Cursor Style",
        }
    }
}

/// Translates a panel style index into the headset's cursor enumeration,
/// which has no entry 3.
pub fn wire_style(style: u8) -> u8 {
    if style == 3 {
        4
    } else {
        style
    }
}

/// One `identity/value` pair of a telemetry tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GazeEntry {
    /// The sender, as rendered by [`ClientIdentity`]'s `Display`.
    pub identity: String,
    /// The sender's latest gaze, verbatim.
    pub value: String,
}

/// Everything the coordinator broadcasts.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// `DataCollection: Start Recording`
    StartRecording,
    /// `DataCollection: Stop Recording`
    StopRecording,
    /// Starts or stops a named operation on every headset.
    Operation {
        /// The operation, exactly as configured.
        name: String,
        /// `Start` when true, `Stop` when false.
        active: bool,
    },
    /// Sets a cursor style.
    CursorVisual {
        /// Whose cursor, as seen by whom.
        slot: CursorSlot,
        /// The value on the wire, already translated by [`wire_style`].
        style: u8,
    },
    /// The shared cursor size, in `0.0..=1.0`.
    CursorSize(f64),
    /// One telemetry tick: every client's latest gaze.
    Gaze(Vec<GazeEntry>),
}

impl Command {
    /// Builds the command for a dropdown change, applying the style
    /// translation. `style` is the panel's index, below [`CURSOR_STYLES`].
    pub fn cursor_visual(dropdown: usize, style: u8) -> Result<Self, HubError> {
        if style >= CURSOR_STYLES {
            return Err(HubError::InvalidStyle(style));
        }
        Ok(Command::CursorVisual {
            slot: CursorSlot::from_dropdown(dropdown)?,
            style: wire_style(style),
        })
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::StartRecording => write!(f, "DataCollection: Start Recording"),
            Command::StopRecording => write!(f, "DataCollection: Stop Recording"),
            Command::Operation { name, active } => {
                write!(f, "{}: {}", name, if *active { "Start" } else { "Stop" })
            }
            Command::CursorVisual { slot, style } => write!(f, "{}: {}", slot.topic(), style),
            // Debug keeps the trailing `.0` on whole numbers
            Command::CursorSize(size) => write!(f, "CursorSize: {:?}", size),
            Command::Gaze(entries) => {
                write!(f, "{}: ", GAZE_TAG)?;
                for GazeEntry { identity, value } in entries {
                    write!(f, "{}/{};", identity, value)?;
                }
                Ok(())
            }
        }
    }
}

fn parse_recording(s: &str) -> IResult<&str, Command> {
    preceded(
        tag("DataCollection: "),
        alt((
            value(Command::StartRecording, tag("Start Recording")),
            value(Command::StopRecording, tag("Stop Recording")),
        )),
    )(s)
}

fn parse_cursor_slot(s: &str) -> IResult<&str, CursorSlot> {
    alt((
        value(CursorSlot::User1Mine, tag("User1/MyCursorVisual")),
        value(CursorSlot::User2Mine, tag("User2/MyCursorVisual")),
        value(CursorSlot::User1Other, tag("User1/OtherCursorVisual")),
        value(CursorSlot::User2Other, tag("User2/OtherCursorVisual")),
    ))(s)
}

fn parse_cursor_visual(s: &str) -> IResult<&str, Command> {
    map(
        separated_pair(parse_cursor_slot, tag(": "), u8),
        |(slot, style)| Command::CursorVisual { slot, style },
    )(s)
}

fn parse_cursor_size(s: &str) -> IResult<&str, Command> {
    map(preceded(tag("CursorSize: "), double), Command::CursorSize)(s)
}

fn parse_gaze_entry(s: &str) -> IResult<&str, GazeEntry> {
    map(
        terminated(
            separated_pair(take_till1(|c| c == '/'), char('/'), take_until(";")),
            char(';'),
        ),
        |(identity, value): (&str, &str)| GazeEntry {
            identity: identity.to_owned(),
            value: value.to_owned(),
        },
    )(s)
}

fn parse_gaze(s: &str) -> IResult<&str, Command> {
    map(
        preceded(tag("Gaze: "), many0(parse_gaze_entry)),
        Command::Gaze,
    )(s)
}

fn parse_operation(s: &str) -> IResult<&str, Command> {
    map(
        separated_pair(
            take_till1(|c| c == ':'),
            tag(": "),
            alt((value(true, tag("Start")), value(false, tag("Stop")))),
        ),
        |(name, active): (&str, bool)| Command::Operation {
            name: name.to_owned(),
            active,
        },
    )(s)
}

fn parse_command(s: &str) -> IResult<&str, Command> {
    all_consuming(alt((
        parse_recording,
        parse_cursor_visual,
        parse_cursor_size,
        parse_gaze,
        parse_operation,
    )))(s)
}

impl FromStr for Command {
    type Err = nom::error::Error<String>;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_command(s).finish() {
            Ok((_remaining, command)) => Ok(command),
            Err(nom::error::Error { input, code }) => Err(nom::error::Error {
                input: input.to_string(),
                code,
            }),
        }
    }
}

/// The body of one ingest message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// `BUILD: <n>`, sent once by a client when it connects.
    Handshake(u64),
    /// Anything else is the client's latest gaze position, passed through
    /// untouched.
    Gaze(String),
}

fn parse_build_number(s: &str) -> IResult<&str, u64> {
    all_consuming(delimited(space0, u64, multispace0))(s)
}

fn parse_handshake(s: &str) -> IResult<&str, Result<u64, &str>> {
    preceded(
        tag(BUILD_TAG),
        alt((
            map(parse_build_number, Ok),
            map(rest, Err),
        )),
    )(s)
}

impl Inbound {
    /// Classifies a message body.
    pub fn classify(content: &[u8]) -> Result<Self, HubError> {
        let text = String::from_utf8_lossy(content);
        let handshake = parse_handshake(&text)
            .ok()
            .map(|(_, build)| build.ok());
        match handshake {
            Some(Some(build)) => Ok(Inbound::Handshake(build)),
            Some(None) => Err(HubError::BadHandshake(text.into_owned())),
            None => Ok(Inbound::Gaze(text.into_owned())),
        }
    }

    /// Splits a raw multipart message into its sender and classified body.
    /// Anything other than exactly `[identity, body]` is rejected.
    pub fn from_parts(mut parts: Vec<Vec<u8>>) -> Result<(ClientIdentity, Self), HubError> {
        if parts.len() != 2 {
            return Err(HubError::MalformedMessage { parts: parts.len() });
        }
        let content = parts.pop().unwrap_or_default();
        let identity = parts.pop().unwrap_or_default();
        Ok((ClientIdentity::new(identity), Inbound::classify(&content)?))
    }
}
