//! Per-peer session records.
//!
//! A Session is created when a peer connects and destroyed when it
//! disconnects. Its identity is immutable; its liveness flag is owned by the
//! Endpoint/Keep-Alive sweep, and its room/side link is owned by whichever of
//! Matchmaker or Room last assigned it (§9: "a Session holds a weak pointer
//! to its Room").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use protocol::{ServerMessage, Side};
use tokio::sync::{mpsc, Notify};

use crate::room::RoomEvent;

/// A lightweight, cloneable handle back into the Room a session currently
/// occupies: just enough to route `paddle`/`rematchRequest`/`leaveRoom`
/// without the Session owning any Room state directly.
#[derive(Clone)]
pub struct RoomLink {
    pub room_id: String,
    pub side: Side,
    pub events: mpsc::Sender<RoomEvent>,
}

/// Everything the writer task can be asked to put on the wire: application
/// frames, plus the keep-alive sweep's protocol-level ping (§4.8), which has
/// no JSON schema of its own.
#[derive(Debug)]
pub enum Outbound {
    Message(ServerMessage),
    Ping,
}

pub struct Session {
    pub id: String,
    name: Mutex<String>,
    room: Mutex<Option<RoomLink>>,
    alive: AtomicBool,
    /// Set once the connection is known gone; checked by the Matchmaker so it
    /// never pairs a socket that has already closed (§4.2).
    closed: AtomicBool,
    /// Signaled by the keep-alive sweep to force the connection's read loop
    /// to unwind through the ordinary disconnect path (§4.8).
    killed: Notify,
    outbound: mpsc::Sender<Outbound>,
}

impl Session {
    pub fn new(id: String, outbound: mpsc::Sender<Outbound>) -> Self {
        Session {
            id,
            name: Mutex::new("Player".to_owned()),
            room: Mutex::new(None),
            alive: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            killed: Notify::new(),
            outbound,
        }
    }

    pub fn name(&self) -> String {
        self.name.lock().unwrap().clone()
    }

    pub fn set_name(&self, name: String) {
        *self.name.lock().unwrap() = name;
    }

    pub fn room_link(&self) -> Option<RoomLink> {
        self.room.lock().unwrap().clone()
    }

    pub fn is_in_room(&self) -> bool {
        self.room.lock().unwrap().is_some()
    }

    pub fn set_room(&self, link: RoomLink) {
        *self.room.lock().unwrap() = Some(link);
    }

    pub fn clear_room(&self) {
        *self.room.lock().unwrap() = None;
    }

    pub fn mark_alive(&self) {
        self.alive.store(true, Ordering::Relaxed);
    }

    /// Returns the previous liveness value and resets it to false, as the
    /// keep-alive sweep does each cycle before sending a fresh ping.
    pub fn take_alive(&self) -> bool {
        self.alive.swap(false, Ordering::Relaxed)
    }

    /// Marks the session as gone so the Matchmaker discards it instead of
    /// pairing a dead socket (§4.2).
    pub fn mark_closed(&self) {
        self.closed.store(true, Ordering::Relaxed);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    /// Wakes the connection's read loop so it unwinds through the disconnect
    /// path, per the stale-peer policy in §4.8/§7.
    pub fn terminate(&self) {
        self.killed.notify_one();
    }

    pub async fn wait_for_termination(&self) {
        self.killed.notified().await;
    }

    /// Best-effort, non-blocking send: the outbound channel is small and
    /// bounded, so a slow or closed peer simply drops the frame rather than
    /// stalling whoever is pushing state out (§4.1, §9 "best-effort send").
    pub fn send(&self, message: ServerMessage) {
        if let Err(err) = self.outbound.try_send(Outbound::Message(message)) {
            tracing::trace!(session = %self.id, ?err, "dropped outbound message");
        }
    }

    /// Queues a protocol-level ping frame (§4.8). Same best-effort policy as
    /// [`Session::send`].
    pub fn ping(&self) {
        if let Err(err) = self.outbound.try_send(Outbound::Ping) {
            tracing::trace!(session = %self.id, ?err, "dropped ping");
        }
    }
}
