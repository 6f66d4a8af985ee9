//! A live two-player match: physics state, phase machine, rematch voting,
//! and the tick/broadcast loops. Exactly one task ever owns a `Room` value
//! (see [`actor`]), so every method here may mutate freely without locking.

pub mod actor;
mod physics;

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use protocol::{EndReason, Hearts, Params, Phase, PlayerInfo, ServerMessage, Side};
use tokio::time::Instant;

use crate::rng::RoomRng;
use crate::session::Session;

pub use actor::{spawn_match, RoomEvent, RoomHandle};

struct PlayerSlot {
    session: Option<Arc<Session>>,
    name: String,
    hearts: u8,
}

impl PlayerSlot {
    fn occupied(name: String) -> Self {
        PlayerSlot { session: None, name, hearts: protocol::HEARTS_START }
    }
}

struct Ball {
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
    speed: f64,
}

impl Ball {
    fn centered() -> Self {
        Ball {
            x: protocol::W / 2.0,
            y: protocol::H / 2.0,
            vx: 0.0,
            vy: 0.0,
            speed: protocol::INIT_BALL_SPEED,
        }
    }
}

pub struct Room {
    pub id: String,
    top: PlayerSlot,
    bottom: PlayerSlot,
    params: Params,
    top_x: f64,
    bottom_x: f64,
    ball: Ball,
    phase: Phase,
    serve_toward: Side,
    next_phase_at: Option<Instant>,
    last_tick_at: Instant,
    rematch_top: bool,
    rematch_bottom: bool,
    rng: Box<dyn RoomRng>,
}

/// A session plus the name and side it is entering a room with.
pub struct Entrant {
    pub session: Arc<Session>,
    pub name: String,
    pub side: Side,
}

impl Room {
    fn new(id: String, top: Entrant, bottom: Entrant, mut rng: Box<dyn RoomRng>) -> Self {
        let now = Instant::now();
        let serve_toward = rng.random_side();
        Room {
            id,
            top: PlayerSlot { session: Some(top.session), name: top.name, hearts: protocol::HEARTS_START },
            bottom: PlayerSlot { session: Some(bottom.session), name: bottom.name, hearts: protocol::HEARTS_START },
            params: Params::derive(),
            top_x: 0.5,
            bottom_x: 0.5,
            ball: Ball::centered(),
            phase: Phase::Countdown,
            serve_toward,
            next_phase_at: Some(now + std::time::Duration::from_millis(3000)),
            last_tick_at: now,
            rematch_top: false,
            rematch_bottom: false,
            rng,
        }
    }

    /// Builds the initial room for a freshly matched pair and announces
    /// `matchFound` to both sides. `top`/`bottom` sides are decided by the
    /// caller (the Matchmaker), per §4.2.
    pub fn new_match(id: String, top: Entrant, bottom: Entrant, rng: Box<dyn RoomRng>) -> Self {
        let room = Room::new(id, top, bottom, rng);
        room.announce_match_found();
        room
    }

    /// Builds a rematch room for the same two entrants with swapped sides,
    /// per §4.6 and the design-note resolution in favor of a clean factory
    /// rather than reusing the initial-match constructor with a swap flag.
    pub fn new_rematch(id: String, new_top: Entrant, new_bottom: Entrant, rng: Box<dyn RoomRng>) -> Self {
        Room::new(id, new_top, new_bottom, rng)
    }

    fn slot(&self, side: Side) -> &PlayerSlot {
        match side {
            Side::Top => &self.top,
            Side::Bottom => &self.bottom,
        }
    }

    fn slot_mut(&mut self, side: Side) -> &mut PlayerSlot {
        match side {
            Side::Top => &mut self.top,
            Side::Bottom => &mut self.bottom,
        }
    }

    fn hearts(&self) -> Hearts {
        Hearts { top: self.top.hearts, bottom: self.bottom.hearts }
    }

    fn send_to(&self, side: Side, message: ServerMessage) {
        if let Some(session) = &self.slot(side).session {
            session.send(message);
        }
    }

    fn broadcast(&self, f: impl Fn(Side) -> ServerMessage) {
        self.send_to(Side::Top, f(Side::Top));
        self.send_to(Side::Bottom, f(Side::Bottom));
    }

    fn match_found_for(&self, you: Side) -> ServerMessage {
        ServerMessage::MatchFound {
            room_id: self.id.clone(),
            players: [
                PlayerInfo { name: self.top.name.clone(), side: Side::Top },
                PlayerInfo { name: self.bottom.name.clone(), side: Side::Bottom },
            ],
            you,
            countdown: 3,
        }
    }

    pub fn announce_match_found(&self) {
        self.broadcast(|side| self.match_found_for(side));
    }

    fn announce_rematch_start(&self) {
        self.broadcast(|_| ServerMessage::RematchStart { countdown: 3 });
    }

    /// `true` once both slots are empty — the Room should be torn down.
    pub fn is_empty(&self) -> bool {
        self.top.session.is_none() && self.bottom.session.is_none()
    }

    fn now_ms() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    fn state_for(&self, side: Side) -> ServerMessage {
        ServerMessage::State {
            t: Self::now_ms(),
            phase: self.phase,
            ball: protocol::BallPos { x: self.ball.x, y: self.ball.y },
            paddles: protocol::Paddles { top_x: self.top_x, bottom_x: self.bottom_x },
            hearts: self.hearts(),
            params: self.params,
            you: side,
        }
    }

    /// Emitted by the broadcast loop at SEND_RATE (§4.5).
    pub fn broadcast_state(&self) {
        self.broadcast(|side| self.state_for(side));
    }

    pub fn set_paddle(&mut self, side: Side, x: f64) {
        let clamped = x.clamp(0.0, 1.0);
        match side {
            Side::Top => self.top_x = clamped,
            Side::Bottom => self.bottom_x = clamped,
        }
    }

    /// Handles a `rematchRequest` (§4.6). Returns the freshly constructed
    /// replacement room once both sides have voted; `None` otherwise (or if
    /// the room is not in `gameover`, per the out-of-context policy in §7).
    pub fn request_rematch(&mut self, side: Side) -> Option<Room> {
        if self.phase != Phase::GameOver {
            return None;
        }
        match side {
            Side::Top => self.rematch_top = true,
            Side::Bottom => self.rematch_bottom = true,
        }
        self.send_to(side.opposite(), ServerMessage::RematchOffered);
        if !(self.rematch_top && self.rematch_bottom) {
            return None;
        }
        let new_top_session = self.bottom.session.clone()?;
        let new_bottom_session = self.top.session.clone()?;
        let new_top = Entrant { session: new_top_session, name: self.bottom.name.clone(), side: Side::Top };
        let new_bottom = Entrant { session: new_bottom_session, name: self.top.name.clone(), side: Side::Bottom };
        let new_room = Room::new_rematch(
            uuid::Uuid::new_v4().to_string(),
            new_top,
            new_bottom,
            Box::new(crate::rng::ThreadRoomRng),
        );
        new_room.announce_rematch_start();
        Some(new_room)
    }

    /// Removes a side from the room, applying forfeit semantics if the match
    /// is still live (§4.7). Returns the session that was removed, if any,
    /// so the caller can clear that session's own room link.
    pub fn leave(&mut self, side: Side) -> Option<Arc<Session>> {
        let departed = self.slot_mut(side).session.take();
        if self.phase != Phase::GameOver {
            if self.slot(side.opposite()).session.is_some() {
                self.phase = Phase::GameOver;
                self.ball.vx = 0.0;
                self.ball.vy = 0.0;
                let winner = side.opposite();
                let hearts = self.hearts();
                self.broadcast(move |_| ServerMessage::GameOver {
                    winner: Some(winner),
                    reason: EndReason::Disconnect,
                    hearts,
                });
            }
        }
        departed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::FixedRng;
    use crate::session::Outbound;
    use tokio::sync::mpsc;

    fn entrant(id: &str, side: Side) -> (Entrant, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(16);
        let session = Arc::new(Session::new(id.to_owned(), tx));
        (Entrant { session, name: id.to_owned(), side }, rx)
    }

    fn fixed_rng() -> Box<dyn RoomRng> {
        Box::new(FixedRng::new(vec![Side::Top], vec![0.0]))
    }

    #[test]
    fn new_match_announces_match_found_to_both_sides() {
        let (top, mut top_rx) = entrant("top", Side::Top);
        let (bottom, mut bottom_rx) = entrant("bottom", Side::Bottom);
        let _room = Room::new_match("room1".to_owned(), top, bottom, fixed_rng());

        assert!(matches!(
            top_rx.try_recv(),
            Ok(Outbound::Message(ServerMessage::MatchFound { .. }))
        ));
        assert!(matches!(
            bottom_rx.try_recv(),
            Ok(Outbound::Message(ServerMessage::MatchFound { .. }))
        ));
    }

    #[test]
    fn leave_during_play_forfeits_to_remaining_side() {
        let (top, _top_rx) = entrant("top", Side::Top);
        let (bottom, mut bottom_rx) = entrant("bottom", Side::Bottom);
        let mut room = Room::new_match("room1".to_owned(), top, bottom, fixed_rng());
        room.phase = Phase::Playing;
        let _ = bottom_rx.try_recv(); // drain matchFound

        room.leave(Side::Top);

        match bottom_rx.try_recv() {
            Ok(Outbound::Message(ServerMessage::GameOver { winner, reason, .. })) => {
                assert_eq!(winner, Some(Side::Bottom));
                assert_eq!(reason, EndReason::Disconnect);
            }
            other => panic!("expected GameOver, got {other:?}"),
        }
    }

    #[test]
    fn leave_while_already_over_does_not_rebroadcast() {
        let (top, _top_rx) = entrant("top", Side::Top);
        let (bottom, mut bottom_rx) = entrant("bottom", Side::Bottom);
        let mut room = Room::new_match("room1".to_owned(), top, bottom, fixed_rng());
        room.phase = Phase::GameOver;
        let _ = bottom_rx.try_recv(); // drain matchFound

        room.leave(Side::Top);

        assert!(bottom_rx.try_recv().is_err());
    }

    #[test]
    fn rematch_requires_both_sides_and_swaps_sides() {
        let (top, _top_rx) = entrant("top", Side::Top);
        let (bottom, _bottom_rx) = entrant("bottom", Side::Bottom);
        let mut room = Room::new_match("room1".to_owned(), top, bottom, fixed_rng());
        room.phase = Phase::GameOver;

        assert!(room.request_rematch(Side::Top).is_none());
        let new_room = room.request_rematch(Side::Bottom).expect("both sides voted");

        assert_eq!(new_room.top.name, "bottom");
        assert_eq!(new_room.bottom.name, "top");
    }
}
