//! Process-wide state: the session table, the room table, and the
//! matchmaking queue (§5, "Shared resources" / "Registry discipline"). Both
//! maps are initialized empty at startup and live for the process lifetime;
//! all mutating access goes through a `tokio::sync::Mutex`, and that lock is
//! never held across outbound I/O.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::matchmaker::Matchmaker;
use crate::room::RoomHandle;
use crate::session::Session;

#[derive(Default)]
pub struct Registry {
    pub sessions: Mutex<HashMap<String, Arc<Session>>>,
    pub rooms: Mutex<HashMap<String, RoomHandle>>,
    pub matchmaker: Mutex<Matchmaker>,
}

impl Registry {
    pub fn new() -> Arc<Self> {
        Arc::new(Registry::default())
    }
}
