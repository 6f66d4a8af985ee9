//! Wire protocol and shared world constants for the pong match server.
//!
//! Messages are framed as single UTF-8 JSON objects, one per WebSocket text
//! frame. Inbound frames are dispatched by hand on their `type` field (see
//! [`parse_client_message`]) rather than through a derived tagged enum, so
//! that "not a JSON object" and "unrecognized type" can be told apart and
//! handled per their own policy. Outbound frames are plain tagged enums,
//! since we always construct valid variants ourselves.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// World constants (fixed at build time).

/// World width, abstract units.
pub const W: f64 = 900.0;
/// World height, abstract units.
pub const H: f64 = 1600.0;
/// Physics integration cadence.
pub const TICK_RATE: f64 = 60.0;
/// State broadcast cadence.
pub const SEND_RATE: f64 = 30.0;
/// Clamp for the integration step, in seconds.
pub const MAX_DT: f64 = 0.05;
/// Distance from top/bottom edge to paddle center line.
pub const PADDING: f64 = 70.0;
/// Paddle width as a fraction of W.
pub const PADDLE_WIDTH_FRAC: f64 = 0.28;
/// Paddle height as a fraction of H.
pub const PADDLE_HEIGHT_FRAC: f64 = 0.02;
/// Ball radius as a fraction of W.
pub const BALL_RADIUS_FRAC: f64 = 0.018;
/// Initial ball speed, units/sec.
pub const INIT_BALL_SPEED: f64 = 780.0;
/// Ball speed cap, units/sec.
pub const MAX_BALL_SPEED: f64 = 1200.0;
/// Speed multiplier applied on every paddle hit.
pub const SPEED_UP: f64 = 1.03;
/// Maximum deflection from vertical after a paddle bounce, radians.
pub const MAX_BOUNCE_ANGLE: f64 = 1.05;
/// Starting hearts per player.
pub const HEARTS_START: u8 = 3;
/// Floor speed enforced after a paddle bounce.
pub const MIN_BOUNCE_SPEED: f64 = 100.0;

/// Which half of the court a player defends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Top,
    Bottom,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Top => Side::Bottom,
            Side::Bottom => Side::Top,
        }
    }
}

/// Room lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Countdown,
    Playing,
    Between,
    GameOver,
}

/// Reason a match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndReason {
    Hearts,
    Disconnect,
    Tie,
}

/// Derived, per-room geometry, computed once at room construction from W/H.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Params {
    #[serde(rename = "W")]
    pub w: f64,
    #[serde(rename = "H")]
    pub h: f64,
    pub r: f64,
    pub pw: f64,
    pub ph: f64,
}

impl Params {
    pub fn derive() -> Self {
        Params {
            w: W,
            h: H,
            r: BALL_RADIUS_FRAC * W,
            pw: PADDLE_WIDTH_FRAC * W,
            ph: PADDLE_HEIGHT_FRAC * H,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BallPos {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Paddles {
    #[serde(rename = "topX")]
    pub top_x: f64,
    #[serde(rename = "bottomX")]
    pub bottom_x: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Hearts {
    pub top: u8,
    pub bottom: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerInfo {
    pub name: String,
    pub side: Side,
}

/// Messages sent from the server to a peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    Hello {
        id: String,
    },
    Finding {
        #[serde(rename = "queueSize")]
        queue_size: usize,
    },
    QueueCancelled,
    #[serde(rename_all = "camelCase")]
    MatchFound {
        #[serde(rename = "roomId")]
        room_id: String,
        players: [PlayerInfo; 2],
        you: Side,
        countdown: u32,
    },
    #[serde(rename_all = "camelCase")]
    State {
        t: i64,
        phase: Phase,
        ball: BallPos,
        paddles: Paddles,
        hearts: Hearts,
        params: Params,
        you: Side,
    },
    #[serde(rename_all = "camelCase")]
    Score {
        hearts: Hearts,
        #[serde(rename = "lastMiss")]
        last_miss: Side,
    },
    #[serde(rename_all = "camelCase")]
    GameOver {
        winner: Option<Side>,
        reason: EndReason,
        hearts: Hearts,
    },
    RematchOffered,
    RematchStart {
        countdown: u32,
    },
    Error {
        message: String,
    },
}

impl ServerMessage {
    /// Serializes to the single-line JSON text sent as a WebSocket text frame.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("ServerMessage always serializes")
    }
}

/// Messages recognized from a peer, already validated and defaulted.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    JoinQueue { name: Option<String> },
    CancelQueue,
    Paddle { x: f64 },
    RematchRequest,
    LeaveRoom,
}

/// Outcome of attempting to interpret one inbound text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Message(ClientMessage),
    /// Frame parsed as JSON but was not an object, or was not valid UTF-8 JSON at all.
    Malformed,
    /// Frame was a JSON object but its `type` field was missing or unrecognized.
    UnknownType,
}

/// Parses one inbound frame per the dispatch-by-`type` rule: malformed frames
/// are reported distinctly from recognized-but-unknown ones so callers can
/// apply §7's differing policies (silently drop vs. reply with `error`).
pub fn parse_client_message(text: &str) -> ParseOutcome {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => return ParseOutcome::Malformed,
    };
    let Value::Object(obj) = value else {
        return ParseOutcome::Malformed;
    };
    let Some(kind) = obj.get("type").and_then(Value::as_str) else {
        return ParseOutcome::UnknownType;
    };
    let message = match kind {
        "joinQueue" => ClientMessage::JoinQueue {
            name: obj.get("name").and_then(Value::as_str).map(str::to_owned),
        },
        "cancelQueue" => ClientMessage::CancelQueue,
        "paddle" => ClientMessage::Paddle {
            x: obj.get("x").and_then(Value::as_f64).unwrap_or(0.0),
        },
        "rematchRequest" => ClientMessage::RematchRequest,
        "leaveRoom" => ClientMessage::LeaveRoom,
        _ => return ParseOutcome::UnknownType,
    };
    ParseOutcome::Message(message)
}

/// Sanitizes a display name per §6: trim, truncate to 16 code units, strip
/// control characters, substitute "Player" if nothing printable remains.
pub fn sanitize_name(raw: Option<&str>) -> String {
    let trimmed = raw.unwrap_or("").trim();
    let cleaned: String = trimmed
        .chars()
        .take(16)
        .filter(|c| !matches!(*c as u32, 0x00..=0x1F | 0x7F))
        .collect();
    if cleaned.is_empty() {
        "Player".to_owned()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_trims_and_truncates() {
        assert_eq!(sanitize_name(Some("  Ada Lovelace  ")), "Ada Lovelace");
        assert_eq!(sanitize_name(Some("0123456789abcdefghij")), "0123456789abcdef");
    }

    #[test]
    fn sanitize_strips_control_chars() {
        assert_eq!(sanitize_name(Some("a\u{0007}b\u{007F}c")), "abc");
    }

    #[test]
    fn sanitize_truncates_before_stripping_control_chars() {
        // 8 letters + 8 control chars + 8 more letters: the 16-code-unit
        // truncation window lands entirely inside the control-char run, so
        // only the first 8 letters should survive, not 16.
        let raw = "abcdefgh\u{0001}\u{0002}\u{0003}\u{0004}\u{0005}\u{0006}\u{0007}\u{0008}ijklmnop";
        assert_eq!(sanitize_name(Some(raw)), "abcdefgh");
    }

    #[test]
    fn sanitize_defaults_when_empty() {
        assert_eq!(sanitize_name(None), "Player");
        assert_eq!(sanitize_name(Some("   ")), "Player");
        assert_eq!(sanitize_name(Some("\u{0001}\u{0002}")), "Player");
    }

    #[test]
    fn parse_known_types() {
        assert_eq!(
            parse_client_message(r#"{"type":"joinQueue","name":"Ada"}"#),
            ParseOutcome::Message(ClientMessage::JoinQueue {
                name: Some("Ada".to_owned())
            })
        );
        assert_eq!(
            parse_client_message(r#"{"type":"paddle","x":0.75}"#),
            ParseOutcome::Message(ClientMessage::Paddle { x: 0.75 })
        );
        assert_eq!(
            parse_client_message(r#"{"type":"leaveRoom","extra":123}"#),
            ParseOutcome::Message(ClientMessage::LeaveRoom)
        );
    }

    #[test]
    fn parse_rejects_malformed_and_unknown() {
        assert_eq!(parse_client_message("not json"), ParseOutcome::Malformed);
        assert_eq!(parse_client_message("[1,2,3]"), ParseOutcome::Malformed);
        assert_eq!(
            parse_client_message(r#"{"type":"selfDestruct"}"#),
            ParseOutcome::UnknownType
        );
        assert_eq!(parse_client_message(r#"{"notype":true}"#), ParseOutcome::UnknownType);
    }

    #[test]
    fn server_message_json_tags_match_schema() {
        let msg = ServerMessage::MatchFound {
            room_id: "r1".to_owned(),
            players: [
                PlayerInfo { name: "A".to_owned(), side: Side::Top },
                PlayerInfo { name: "B".to_owned(), side: Side::Bottom },
            ],
            you: Side::Top,
            countdown: 3,
        };
        let json = msg.to_json();
        assert!(json.contains(r#""type":"matchFound""#));
        assert!(json.contains(r#""roomId":"r1""#));
        assert!(json.contains(r#""side":"top""#));
    }

    #[test]
    fn params_use_capitalized_keys() {
        let json = serde_json::to_string(&Params::derive()).unwrap();
        assert!(json.contains(r#""W":900"#));
        assert!(json.contains(r#""H":1600"#));
    }
}
