//! A FIFO queue of sessions seeking a match (§4.2). The queue itself is
//! dumb — pairing discards stale entries, but building the resulting Room
//! happens outside the queue's lock (§5: "must not hold its lock while
//! constructing a Room").

use std::collections::VecDeque;
use std::sync::Arc;

use protocol::Side;

use crate::registry::Registry;
use crate::rng::RoomRng;
use crate::room::Entrant;
use crate::session::Session;

#[derive(Default)]
pub struct Matchmaker {
    queue: VecDeque<Arc<Session>>,
}

impl Matchmaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.queue.iter().any(|s| s.id == session_id)
    }

    /// Appends `session` unless it's already queued. Returns the queue depth
    /// after insertion on success, so the caller can ack with `queueSize`.
    pub fn enqueue(&mut self, session: Arc<Session>) -> Option<usize> {
        if self.contains(&session.id) {
            return None;
        }
        self.queue.push_back(session);
        Some(self.queue.len())
    }

    pub fn remove(&mut self, session_id: &str) {
        self.queue.retain(|s| s.id != session_id);
    }

    /// Drains the queue into as many valid pairs as it can, skipping entries
    /// that closed or got matched elsewhere while waiting. At most one
    /// session is left behind (pushed back to the front) to wait its turn.
    pub fn drain_pairs(&mut self) -> Vec<(Arc<Session>, Arc<Session>)> {
        let mut pairs = Vec::new();
        let mut pending: Option<Arc<Session>> = None;
        while let Some(candidate) = self.queue.pop_front() {
            if candidate.is_closed() || candidate.is_in_room() {
                continue;
            }
            match pending.take() {
                None => pending = Some(candidate),
                Some(first) => pairs.push((first, candidate)),
            }
        }
        if let Some(left) = pending {
            self.queue.push_front(left);
        }
        pairs
    }
}

/// Drains whatever valid pairs the queue currently holds and spins up a room
/// for each. Side assignment at initial match is an even coin flip (§4.2),
/// drawn from the same `RoomRng` seam the room lifecycle uses for its own
/// randomness (§9), so a test can pin down which entrant lands on which side.
pub async fn try_match(registry: &Arc<Registry>, rng: &mut dyn RoomRng) {
    let pairs = {
        let mut matchmaker = registry.matchmaker.lock().await;
        matchmaker.drain_pairs()
    };

    for (a, b) in pairs {
        let (top, bottom) = if rng.random_side() == Side::Top {
            (a, b)
        } else {
            (b, a)
        };
        let top_name = top.name();
        let bottom_name = bottom.name();
        let top_entrant = Entrant { session: top, name: top_name, side: Side::Top };
        let bottom_entrant = Entrant { session: bottom, name: bottom_name, side: Side::Bottom };
        crate::room::spawn_match(
            registry.clone(),
            uuid::Uuid::new_v4().to_string(),
            top_entrant,
            bottom_entrant,
        )
        .await;
    }
}
