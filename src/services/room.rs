//! Room service — applies engine operations and delivers their events.
//!
//! DESIGN
//! ======
//! Each operation takes the room write lock, runs the engine, and turns the
//! returned `RoomEvent`s into frames while still holding the lock, so peers
//! observe events in the order the engine produced them. Frames for other
//! sockets are queued on their channels; the payload for the requesting
//! socket is returned to the websocket layer, which sends it as the `done`
//! reply.
//!
//! DELIVERY
//! ========
//! | event              | requester         | others                   |
//! |--------------------|-------------------|--------------------------|
//! | Joined             | reply             | `room:newuser`           |
//! | Left               | reply             | `room:userleft`          |
//! | UsersUpdated       | reply             | `room:updateusers`       |
//! | PositionComputed   | `room:updateposition` (everyone)             |
//! | PositionFailed     | `position_error` in reply | -                |
//! | NextCalibration    | `calibration:next` to the addressed socket   |
//! | Reset              | reply             | `room:reset`             |

use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::engine::{EngineError, ParticipantView, Profile, RoomEvent};
use crate::frame::{Data, ErrorCode, FRAME_CODE, FRAME_MESSAGE, FRAME_RETRYABLE, Frame};
use crate::state::{AppState, RoomState};

// =============================================================================
// CONNECTIONS
// =============================================================================

/// Register a socket's outbound channel and return the current roster.
pub async fn connect(state: &AppState, client_id: Uuid, tx: mpsc::Sender<Frame>) -> Vec<ParticipantView> {
    let mut guard = state.room.write().await;
    guard.clients.insert(client_id, tx);
    info!(%client_id, clients = guard.clients.len(), "room: socket connected");
    guard.room.users()
}

/// Drop a socket. A closed socket leaves the room if it had joined.
pub async fn disconnect(state: &AppState, client_id: Uuid) {
    let mut guard = state.room.write().await;
    guard.clients.remove(&client_id);
    if guard.room.roster().contains(client_id) {
        if let Ok(events) = guard.room.leave(client_id) {
            deliver(&guard, client_id, events);
        }
    }
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Join the socket as a participant.
///
/// # Errors
///
/// Returns `DuplicateParticipant` if the socket already joined.
pub async fn join(state: &AppState, client_id: Uuid, profile: Profile) -> Result<Data, EngineError> {
    let mut guard = state.room.write().await;
    let events = guard.room.join(client_id, profile)?;
    Ok(deliver(&guard, client_id, events))
}

/// # Errors
///
/// Returns `NotFound` if the socket never joined.
pub async fn leave(state: &AppState, client_id: Uuid) -> Result<Data, EngineError> {
    let mut guard = state.room.write().await;
    let events = guard.room.leave(client_id)?;
    Ok(deliver(&guard, client_id, events))
}

/// Record a calibration from `client_id` toward `target_id`.
///
/// # Errors
///
/// Any rejection from `Room::submit_calibration`; nothing is delivered.
pub async fn submit_calibration(
    state: &AppState,
    client_id: Uuid,
    target_id: Uuid,
    bearing: f64,
) -> Result<Data, EngineError> {
    let mut guard = state.room.write().await;
    let events = guard.room.submit_calibration(client_id, target_id, bearing)?;
    Ok(deliver(&guard, client_id, events))
}

pub async fn reset(state: &AppState, client_id: Uuid) -> Data {
    let mut guard = state.room.write().await;
    let events = guard.room.reset();
    deliver(&guard, client_id, events)
}

pub async fn users(state: &AppState) -> Vec<ParticipantView> {
    state.room.read().await.room.users()
}

// =============================================================================
// DELIVERY
// =============================================================================

/// Best-effort send to every socket except `exclude`. A full channel drops
/// the frame for that socket only.
pub fn broadcast(room: &RoomState, frame: &Frame, exclude: Option<Uuid>) {
    for (client_id, tx) in &room.clients {
        if exclude == Some(*client_id) {
            continue;
        }
        let _ = tx.try_send(frame.clone());
    }
}

fn send_to(room: &RoomState, client_id: Uuid, frame: Frame) {
    if let Some(tx) = room.clients.get(&client_id) {
        let _ = tx.try_send(frame);
    }
}

/// Queue frames for everyone but the requester and build its reply payload.
fn deliver(room: &RoomState, origin: Uuid, events: Vec<RoomEvent>) -> Data {
    let mut reply = Data::new();
    for event in events {
        match event {
            RoomEvent::Joined { participant, users } => {
                let users = json(&users);
                reply.insert("participant".into(), json(&participant));
                reply.insert("users".into(), users.clone());
                notify(room, "room:newuser", origin, Some(origin), [("users", users)]);
            }
            RoomEvent::Left { removed, users } => {
                let removed = json(&removed);
                let users = json(&users);
                reply.insert("removed".into(), removed.clone());
                reply.insert("users".into(), users.clone());
                notify(room, "room:userleft", origin, Some(origin), [("removed", removed), ("users", users)]);
            }
            RoomEvent::UsersUpdated { changed, users } => {
                let changed = json(&changed);
                let users = json(&users);
                reply.insert("changed".into(), changed.clone());
                reply.insert("users".into(), users.clone());
                notify(room, "room:updateusers", origin, Some(origin), [("changed", changed), ("users", users)]);
            }
            RoomEvent::PositionComputed { changed, users, positions } => {
                notify(
                    room,
                    "room:updateposition",
                    origin,
                    None,
                    [("changed", json(&changed)), ("users", json(&users)), ("positions", json(&positions))],
                );
            }
            RoomEvent::PositionFailed { error, .. } => {
                reply.insert("position_error".into(), error_payload(&error));
            }
            RoomEvent::NextCalibration(next) => {
                let frame = Frame::request("calibration:next", Data::new())
                    .with_data("participant_id", next.participant_id.to_string())
                    .with_data("partner", json(&next.partner));
                send_to(room, next.participant_id, frame);
            }
            RoomEvent::Reset => {
                notify(room, "room:reset", origin, Some(origin), []);
            }
        }
    }
    reply
}

fn notify<const N: usize>(
    room: &RoomState,
    syscall: &str,
    origin: Uuid,
    exclude: Option<Uuid>,
    fields: [(&str, serde_json::Value); N],
) {
    let mut data = Data::new();
    for (key, value) in fields {
        data.insert(key.into(), value);
    }
    let frame = Frame::request(syscall, data).with_from(origin.to_string());
    broadcast(room, &frame, exclude);
}

fn error_payload(err: &EngineError) -> serde_json::Value {
    serde_json::json!({
        FRAME_CODE: err.error_code(),
        FRAME_MESSAGE: err.to_string(),
        FRAME_RETRYABLE: err.retryable(),
    })
}

fn json(value: &impl serde::Serialize) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or_default()
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
