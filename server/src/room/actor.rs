//! The dedicated per-room task (§5): the sole owner of a [`Room`]'s state.
//! Paddle input, rematch votes, leaves, and the tick/broadcast timers are all
//! serialized through one `tokio::select!` loop — no `Room` field is ever
//! touched from outside this task.

use std::sync::Arc;
use std::time::Duration;

use protocol::Side;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant};

use crate::registry::Registry;
use crate::session::RoomLink;

use super::{Entrant, Room};

/// Events a room's owning task accepts from the outside. The tick and
/// broadcast cadences are driven by the task's own timers, not this channel.
pub enum RoomEvent {
    Paddle { side: Side, x: f64 },
    RematchRequest { side: Side },
    Leave { side: Side },
}

/// A cloneable reference to a running room: enough for a `Session` to route
/// its own messages without touching the room's state directly.
#[derive(Clone)]
pub struct RoomHandle {
    pub id: String,
    pub events: mpsc::Sender<RoomEvent>,
}

const EVENT_BUFFER: usize = 64;

fn link_for(handle: &RoomHandle, side: Side) -> RoomLink {
    RoomLink {
        room_id: handle.id.clone(),
        side,
        events: handle.events.clone(),
    }
}

/// Points each occupied slot's session at this room, per the "weak pointer to
/// its Room" design in §9. Reaches into `Room`'s private slots directly,
/// since this module is a descendant of `room` and shares its privacy scope.
fn link_sessions(room: &Room, handle: &RoomHandle) {
    if let Some(session) = &room.top.session {
        session.set_room(link_for(handle, Side::Top));
    }
    if let Some(session) = &room.bottom.session {
        session.set_room(link_for(handle, Side::Bottom));
    }
}

/// Builds a freshly matched room from two Matchmaker entrants, registers it,
/// links both sessions, and announces `matchFound` (§4.3).
pub async fn spawn_match(registry: Arc<Registry>, id: String, top: Entrant, bottom: Entrant) {
    let room = Room::new_match(id, top, bottom, Box::new(crate::rng::ThreadRoomRng));
    spawn_room(registry, room).await;
}

/// Spawns the owning task for a room, whether freshly matched or a rematch
/// replacement. `room.announce_match_found` / `announce_rematch_start` must
/// already have been called by the time this runs (room construction does
/// that itself for a fresh match; [`Room::request_rematch`] does it for a
/// rematch before handing the new room back to this actor).
async fn spawn_room(registry: Arc<Registry>, room: Room) {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let handle = RoomHandle { id: room.id.clone(), events: tx };

    link_sessions(&room, &handle);
    registry.rooms.lock().await.insert(handle.id.clone(), handle.clone());

    tokio::spawn(run_room(registry, room, rx, handle));
}

async fn run_room(
    registry: Arc<Registry>,
    mut room: Room,
    mut events: mpsc::Receiver<RoomEvent>,
    handle: RoomHandle,
) {
    let mut tick_timer = interval(Duration::from_secs_f64(1.0 / protocol::TICK_RATE));
    let mut broadcast_timer = interval(Duration::from_secs_f64(1.0 / protocol::SEND_RATE));

    tracing::info!(room = %handle.id, "room started");

    loop {
        tokio::select! {
            _ = tick_timer.tick() => {
                room.tick(Instant::now());
            }
            _ = broadcast_timer.tick() => {
                room.broadcast_state();
            }
            event = events.recv() => {
                let Some(event) = event else {
                    // Every sender is gone (including the registry's own
                    // clone) only once we've already torn this room down.
                    break;
                };
                match event {
                    RoomEvent::Paddle { side, x } => room.set_paddle(side, x),
                    RoomEvent::RematchRequest { side } => {
                        if let Some(new_room) = room.request_rematch(side) {
                            spawn_room(registry.clone(), new_room).await;
                            break;
                        }
                    }
                    RoomEvent::Leave { side } => {
                        room.leave(side);
                        if room.is_empty() {
                            break;
                        }
                    }
                }
            }
        }
    }

    tracing::info!(room = %handle.id, "room destroyed");
    registry.rooms.lock().await.remove(&handle.id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;
    use crate::session::{Outbound, Session};
    use protocol::ServerMessage;

    fn entrant(id: &str, side: Side) -> (Entrant, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(16);
        let session = Arc::new(Session::new(id.to_owned(), tx));
        (Entrant { session, name: id.to_owned(), side }, rx)
    }

    #[tokio::test]
    async fn spawn_match_registers_the_room_and_links_both_sides() {
        let registry = Registry::new();
        let (top, mut top_rx) = entrant("top", Side::Top);
        let (bottom, mut bottom_rx) = entrant("bottom", Side::Bottom);
        let top_session = top.session.clone();

        spawn_match(registry.clone(), "room1".to_owned(), top, bottom).await;

        assert!(matches!(
            top_rx.recv().await,
            Some(Outbound::Message(ServerMessage::MatchFound { .. }))
        ));
        assert!(matches!(
            bottom_rx.recv().await,
            Some(Outbound::Message(ServerMessage::MatchFound { .. }))
        ));
        assert!(registry.rooms.lock().await.contains_key("room1"));
        assert!(top_session.room_link().is_some());
    }

    #[tokio::test]
    async fn a_leave_from_both_sides_tears_the_room_down() {
        let registry = Registry::new();
        let (top, mut top_rx) = entrant("top", Side::Top);
        let (bottom, mut bottom_rx) = entrant("bottom", Side::Bottom);
        let top_session = top.session.clone();
        let bottom_session = bottom.session.clone();

        spawn_match(registry.clone(), "room1".to_owned(), top, bottom).await;
        let _ = top_rx.recv().await; // matchFound
        let _ = bottom_rx.recv().await;

        let top_link = top_session.room_link().expect("top linked to the room");
        top_link.events.send(RoomEvent::Leave { side: Side::Top }).await.unwrap();

        match bottom_rx.recv().await {
            Some(Outbound::Message(ServerMessage::GameOver { winner, .. })) => {
                assert_eq!(winner, Some(Side::Bottom));
            }
            other => panic!("expected GameOver, got {other:?}"),
        }

        let bottom_link = bottom_session.room_link().expect("bottom still linked");
        bottom_link.events.send(RoomEvent::Leave { side: Side::Bottom }).await.unwrap();

        // The room task removes itself from the registry asynchronously;
        // yield until it has had a chance to run.
        for _ in 0..100 {
            if !registry.rooms.lock().await.contains_key("room1") {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("room1 was never removed from the registry");
    }

    #[tokio::test(start_paused = true)]
    async fn a_paddle_event_is_reflected_in_the_next_broadcast() {
        let registry = Registry::new();
        let (top, mut top_rx) = entrant("top", Side::Top);
        let (bottom, mut bottom_rx) = entrant("bottom", Side::Bottom);
        let top_session = top.session.clone();

        spawn_match(registry.clone(), "room1".to_owned(), top, bottom).await;
        let _ = top_rx.recv().await; // matchFound
        let _ = bottom_rx.recv().await;

        let link = top_session.room_link().expect("linked to the room");
        // Out-of-range input must be clamped, per the room's paddle-input rule.
        link.events.send(RoomEvent::Paddle { side: Side::Top, x: 1.5 }).await.unwrap();
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_secs_f64(1.0 / protocol::SEND_RATE)).await;
        match bottom_rx.recv().await {
            Some(Outbound::Message(ServerMessage::State { paddles, .. })) => {
                assert_eq!(paddles.top_x, 1.0);
            }
            other => panic!("expected State, got {other:?}"),
        }
    }
}
