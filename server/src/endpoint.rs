//! Per-connection glue (§4.1): accepts one upgraded WebSocket, runs the
//! `hello` handshake, and thereafter treats the socket as a JSON frame
//! channel dispatched by `type`. Reader and writer run as a paired-task race
//! — whichever ends first (close, error, or a keep-alive termination) is the
//! signal to tear the connection down; the other side is aborted.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use protocol::{parse_client_message, sanitize_name, ClientMessage, ParseOutcome, ServerMessage};
use tokio::sync::mpsc;

use crate::matchmaker::try_match;
use crate::registry::Registry;
use crate::room::RoomEvent;
use crate::session::{Outbound, Session};

const OUTBOUND_BUFFER: usize = 64;

pub async fn handle_connection(socket: WebSocket, registry: Arc<Registry>) {
    let (sink, stream) = socket.split();

    let id = uuid::Uuid::new_v4().to_string();
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_BUFFER);
    let session = Arc::new(Session::new(id.clone(), outbound_tx));
    registry.sessions.lock().await.insert(id.clone(), session.clone());

    tracing::info!(session = %id, "peer connected");
    session.send(ServerMessage::Hello { id: id.clone() });

    let mut writer = tokio::spawn(run_writer(sink, outbound_rx));
    let mut reader = tokio::spawn(run_reader(stream, registry.clone(), session.clone()));

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    session.mark_closed();
    leave_everything(&registry, &session).await;
    registry.sessions.lock().await.remove(&id);
    tracing::info!(session = %id, "peer disconnected");
}

async fn run_writer(mut sink: SplitSink<WebSocket, Message>, mut outbound: mpsc::Receiver<Outbound>) {
    while let Some(item) = outbound.recv().await {
        let frame = match item {
            Outbound::Message(message) => Message::Text(message.to_json().into()),
            Outbound::Ping => Message::Ping(Vec::new().into()),
        };
        if sink.send(frame).await.is_err() {
            return;
        }
    }
}

async fn run_reader(mut stream: SplitStream<WebSocket>, registry: Arc<Registry>, session: Arc<Session>) {
    loop {
        tokio::select! {
            _ = session.wait_for_termination() => return,
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => dispatch(&registry, &session, &text).await,
                Some(Ok(Message::Pong(_))) => session.mark_alive(),
                Some(Ok(Message::Close(_))) => return,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::debug!(session = %session.id, ?err, "read error");
                    return;
                }
                None => return,
            },
        }
    }
}

/// Dispatches one parsed frame per the recognized-types table in §4.1,
/// applying §7's per-kind error policy.
async fn dispatch(registry: &Arc<Registry>, session: &Arc<Session>, text: &str) {
    match parse_client_message(text) {
        ParseOutcome::Malformed => {}
        ParseOutcome::UnknownType => {
            session.send(ServerMessage::Error { message: "Unknown message type".to_owned() });
        }
        ParseOutcome::Message(message) => match message {
            ClientMessage::JoinQueue { name } => handle_join_queue(registry, session, name).await,
            ClientMessage::CancelQueue => handle_cancel_queue(registry, session).await,
            ClientMessage::Paddle { x } => handle_paddle(session, x).await,
            ClientMessage::RematchRequest => handle_rematch(session).await,
            ClientMessage::LeaveRoom => handle_leave(registry, session).await,
        },
    }
}

async fn handle_join_queue(registry: &Arc<Registry>, session: &Arc<Session>, name: Option<String>) {
    session.set_name(sanitize_name(name.as_deref()));
    if session.is_in_room() {
        return;
    }
    let queue_size = {
        let mut matchmaker = registry.matchmaker.lock().await;
        matchmaker.enqueue(session.clone())
    };
    let Some(queue_size) = queue_size else { return };
    session.send(ServerMessage::Finding { queue_size });
    try_match(registry, &mut crate::rng::ThreadRoomRng).await;
}

async fn handle_cancel_queue(registry: &Arc<Registry>, session: &Arc<Session>) {
    registry.matchmaker.lock().await.remove(&session.id);
    session.send(ServerMessage::QueueCancelled);
}

async fn handle_paddle(session: &Arc<Session>, x: f64) {
    if let Some(link) = session.room_link() {
        let _ = link.events.send(RoomEvent::Paddle { side: link.side, x }).await;
    }
}

async fn handle_rematch(session: &Arc<Session>) {
    if let Some(link) = session.room_link() {
        let _ = link.events.send(RoomEvent::RematchRequest { side: link.side }).await;
    }
}

async fn handle_leave(registry: &Arc<Registry>, session: &Arc<Session>) {
    leave_everything(registry, session).await;
}

/// The convergence point for `leaveRoom`, socket close, and socket error
/// (§4.7): drop out of the queue if still waiting, and forfeit any live room.
async fn leave_everything(registry: &Arc<Registry>, session: &Arc<Session>) {
    registry.matchmaker.lock().await.remove(&session.id);
    if let Some(link) = session.room_link() {
        let _ = link.events.send(RoomEvent::Leave { side: link.side }).await;
        session.clear_room();
    }
}
