//! WebSocket handler — one device session.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID (which becomes the participant id on
//! `room:join`) and enters a `select!` loop:
//! - Incoming device frames → parse + dispatch by syscall prefix
//! - Frames queued by services for this socket → forward to device
//!
//! Handlers validate the request, call a service, and return an `Outcome`.
//! Services queue whatever other sockets must see; the dispatch layer only
//! answers the requester.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with `client_id` and the roster
//! 2. Device sends frames → dispatch → handler returns Outcome
//! 3. Dispatch sends `done` (with or without data) or an error frame
//! 4. Close → leave the room if joined → drop the socket's channel

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::Profile;
use crate::frame::{Data, Frame, Status};
use crate::services;
use crate::services::orientation::Orientation;
use crate::state::AppState;

// =============================================================================
// OUTCOME
// =============================================================================

/// What the requester gets back. Handlers never send frames directly.
#[derive(Debug)]
enum Outcome {
    /// Send done+data to sender.
    Reply(Data),
    /// Send empty done to sender.
    Done,
    /// Nothing goes back to the sender.
    Silent,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let client_id = Uuid::new_v4();

    // Per-connection channel for frames queued by services.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(256);
    let users = services::room::connect(&state, client_id, client_tx).await;

    let welcome = Frame::request("session:connected", Data::new())
        .with_data("client_id", client_id.to_string())
        .with_data("users", serde_json::to_value(&users).unwrap_or_default());
    if send_frame(&mut socket, &welcome).await.is_ok() {
        info!(%client_id, "ws: client connected");

        loop {
            tokio::select! {
                msg = socket.recv() => {
                    let Some(Ok(msg)) = msg else { break };
                    match msg {
                        Message::Text(text) => {
                            for frame in process_inbound_text(&state, client_id, &text).await {
                                let _ = send_frame(&mut socket, &frame).await;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
                Some(frame) = client_rx.recv() => {
                    if send_frame(&mut socket, &frame).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    services::room::disconnect(&state, client_id).await;
    info!(%client_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and process one inbound text frame and return frames for the sender.
async fn process_inbound_text(state: &AppState, client_id: Uuid, text: &str) -> Vec<Frame> {
    let mut req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(%client_id, error = %e, "ws: invalid inbound frame");
            let err = Frame::request("gateway:error", Data::new()).with_data("message", format!("invalid json: {e}"));
            return vec![err];
        }
    };

    if req.status != Status::Request {
        return vec![req.error(format!("expected request status, got {:?}", req.status))];
    }

    // The socket decides who a frame is from, never the payload.
    req.from = Some(client_id.to_string());

    let prefix = req.prefix();
    if prefix != "device" {
        info!(%client_id, id = %req.id, syscall = %req.syscall, "ws: recv frame");
    }

    let result = match prefix {
        "room" => handle_room(state, client_id, &req).await,
        "calibration" => handle_calibration(state, client_id, &req).await,
        "device" => handle_device(state, client_id, &req).await,
        _ => Err(req.error(format!("unknown prefix: {prefix}"))),
    };

    match result {
        Ok(Outcome::Reply(data)) => vec![req.done_with(data)],
        Ok(Outcome::Done) => vec![req.done()],
        Ok(Outcome::Silent) => vec![],
        Err(err_frame) => vec![err_frame],
    }
}

// =============================================================================
// ROOM HANDLERS
// =============================================================================

async fn handle_room(state: &AppState, client_id: Uuid, req: &Frame) -> Result<Outcome, Frame> {
    match req.op() {
        "join" => {
            let name = str_field(req, "name").unwrap_or("anonymous");
            let color = str_field(req, "color").unwrap_or_default();
            let profile = Profile { name: name.to_string(), color: color.to_string() };
            services::room::join(state, client_id, profile)
                .await
                .map(Outcome::Reply)
                .map_err(|e| req.error_from(&e))
        }
        "leave" => services::room::leave(state, client_id)
            .await
            .map(Outcome::Reply)
            .map_err(|e| req.error_from(&e)),
        "users" => {
            let users = services::room::users(state).await;
            let mut data = Data::new();
            data.insert("users".into(), serde_json::to_value(&users).unwrap_or_default());
            Ok(Outcome::Reply(data))
        }
        "reset" => {
            services::room::reset(state, client_id).await;
            Ok(Outcome::Done)
        }
        op => Err(req.error(format!("unknown room op: {op}"))),
    }
}

// =============================================================================
// CALIBRATION HANDLER
// =============================================================================

async fn handle_calibration(state: &AppState, client_id: Uuid, req: &Frame) -> Result<Outcome, Frame> {
    match req.op() {
        "submit" => {
            let Some(target_id) = str_field(req, "target_id").and_then(|s| s.parse::<Uuid>().ok()) else {
                return Err(req.error("target_id required"));
            };
            let Some(bearing) = f64_field(req, "bearing") else {
                return Err(req.error("bearing required"));
            };
            services::room::submit_calibration(state, client_id, target_id, bearing)
                .await
                .map(Outcome::Reply)
                .map_err(|e| req.error_from(&e))
        }
        op => Err(req.error(format!("unknown calibration op: {op}"))),
    }
}

// =============================================================================
// DEVICE HANDLER
// =============================================================================

async fn handle_device(state: &AppState, client_id: Uuid, req: &Frame) -> Result<Outcome, Frame> {
    match req.op() {
        "orientation" => {
            let Some(heading) = f64_field(req, "heading") else {
                return Err(req.error("heading required"));
            };
            let reading = Orientation {
                heading,
                tilt_lr: f64_field(req, "tilt_lr").unwrap_or(0.0),
                tilt_fb: f64_field(req, "tilt_fb").unwrap_or(0.0),
            };
            services::orientation::relay(state, client_id, reading)
                .await
                .map(|_| Outcome::Silent)
                .map_err(|e| req.error_from(&e))
        }
        op => Err(req.error(format!("unknown device op: {op}"))),
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn str_field<'a>(req: &'a Frame, key: &str) -> Option<&'a str> {
    req.data.get(key).and_then(|v| v.as_str())
}

fn f64_field(req: &Frame, key: &str) -> Option<f64> {
    req.data.get(key).and_then(serde_json::Value::as_f64)
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if frame.status == Status::Error {
        let code = frame.data.get("code").and_then(|v| v.as_str()).unwrap_or("-");
        let message = frame.data.get("message").and_then(|v| v.as_str()).unwrap_or("-");
        warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
    } else if !frame.syscall.starts_with("device:") {
        info!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
    }
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
