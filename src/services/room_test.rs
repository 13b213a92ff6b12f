use super::*;
use crate::state::test_helpers;
use tokio::time::{Duration, timeout};

async fn recv(rx: &mut mpsc::Receiver<Frame>) -> Frame {
    timeout(Duration::from_millis(200), rx.recv())
        .await
        .expect("frame receive timed out")
        .expect("channel closed unexpectedly")
}

async fn assert_silent(rx: &mut mpsc::Receiver<Frame>) {
    assert!(timeout(Duration::from_millis(50), rx.recv()).await.is_err(), "expected no frame");
}

fn profile(name: &str) -> Profile {
    Profile { name: name.into(), color: "Teal".into() }
}

#[tokio::test]
async fn join_notifies_peers_and_addresses_next_turn() {
    let state = test_helpers::test_app_state();
    let (a, mut rx_a) = test_helpers::connect_client(&state).await;
    let (b, mut rx_b) = test_helpers::connect_client(&state).await;

    let reply = join(&state, a, profile("annie")).await.unwrap();
    assert_eq!(reply["participant"]["join_index"], 0);
    assert_eq!(recv(&mut rx_b).await.syscall, "room:newuser");
    assert_silent(&mut rx_a).await;

    join(&state, b, profile("bep")).await.unwrap();
    let newuser = recv(&mut rx_a).await;
    assert_eq!(newuser.syscall, "room:newuser");
    assert_eq!(newuser.data["users"].as_array().map(Vec::len), Some(2));

    let next = recv(&mut rx_a).await;
    assert_eq!(next.syscall, "calibration:next");
    assert_eq!(next.data["participant_id"], a.to_string());
    assert_eq!(next.data["partner"]["id"], b.to_string());
    assert_silent(&mut rx_b).await;
}

#[tokio::test]
async fn calibration_broadcasts_update_and_position() {
    let state = test_helpers::test_app_state();
    let (a, mut rx_a) = test_helpers::connect_client(&state).await;
    let (b, mut rx_b) = test_helpers::connect_client(&state).await;
    join(&state, a, profile("a")).await.unwrap();
    join(&state, b, profile("b")).await.unwrap();
    while timeout(Duration::from_millis(20), rx_a.recv()).await.is_ok() {}
    while timeout(Duration::from_millis(20), rx_b.recv()).await.is_ok() {}

    let reply = submit_calibration(&state, a, b, 90.0).await.unwrap();
    assert_eq!(reply["changed"]["calibration_count"], 1);
    assert!(!reply.contains_key("position_error"));

    // Peer: update, position, then its own turn.
    assert_eq!(recv(&mut rx_b).await.syscall, "room:updateusers");
    let position = recv(&mut rx_b).await;
    assert_eq!(position.syscall, "room:updateposition");
    assert_eq!(position.data["positions"][0]["join_index"], 0);
    assert_eq!(recv(&mut rx_b).await.syscall, "calibration:next");

    // Requester only sees the position broadcast.
    assert_eq!(recv(&mut rx_a).await.syscall, "room:updateposition");
    assert_silent(&mut rx_a).await;
}

#[tokio::test]
async fn rejected_calibration_delivers_nothing() {
    let state = test_helpers::test_app_state();
    let (a, _rx_a) = test_helpers::connect_client(&state).await;
    let (b, mut rx_b) = test_helpers::connect_client(&state).await;
    join(&state, a, profile("a")).await.unwrap();
    join(&state, b, profile("b")).await.unwrap();
    while timeout(Duration::from_millis(20), rx_b.recv()).await.is_ok() {}

    let ghost = Uuid::new_v4();
    assert_eq!(submit_calibration(&state, a, ghost, 10.0).await, Err(EngineError::NotFound(ghost)));
    assert_silent(&mut rx_b).await;
}

#[tokio::test]
async fn degenerate_solve_reports_position_error() {
    let state = test_helpers::test_app_state();
    let mut ids = Vec::new();
    for name in ["a", "b", "c"] {
        let (id, _rx) = test_helpers::connect_client(&state).await;
        join(&state, id, profile(name)).await.unwrap();
        ids.push(id);
    }
    for (from, to, bearing) in [(0, 1, 0.0), (1, 0, 180.0), (1, 2, 0.0), (2, 0, 180.0)] {
        submit_calibration(&state, ids[from], ids[to], bearing).await.unwrap();
    }

    let reply = submit_calibration(&state, ids[2], ids[1], 180.0).await.unwrap();
    assert_eq!(reply["position_error"]["code"], "E_DEGENERATE_GEOMETRY");
    assert_eq!(reply["position_error"]["retryable"], true);
}

#[tokio::test]
async fn disconnect_leaves_and_hands_turn_on() {
    let state = test_helpers::test_app_state();
    let (a, mut rx_a) = test_helpers::connect_client(&state).await;
    let (b, _rx_b) = test_helpers::connect_client(&state).await;
    let (c, mut rx_c) = test_helpers::connect_client(&state).await;
    for (id, name) in [(a, "a"), (b, "b"), (c, "c")] {
        join(&state, id, profile(name)).await.unwrap();
    }
    submit_calibration(&state, a, b, 45.0).await.unwrap();
    while timeout(Duration::from_millis(20), rx_a.recv()).await.is_ok() {}
    while timeout(Duration::from_millis(20), rx_c.recv()).await.is_ok() {}

    disconnect(&state, b).await;

    let left = recv(&mut rx_a).await;
    assert_eq!(left.syscall, "room:userleft");
    assert_eq!(left.data["removed"]["id"], b.to_string());
    assert_eq!(recv(&mut rx_c).await.syscall, "room:userleft");
    let next = recv(&mut rx_c).await;
    assert_eq!(next.syscall, "calibration:next");
    assert_eq!(next.data["partner"]["id"], a.to_string());

    let guard = state.room.read().await;
    assert!(!guard.clients.contains_key(&b));
    assert_eq!(guard.room.roster().len(), 2);
}

#[tokio::test]
async fn disconnect_before_join_is_quiet() {
    let state = test_helpers::test_app_state();
    let (a, mut rx_a) = test_helpers::connect_client(&state).await;
    let (b, _rx_b) = test_helpers::connect_client(&state).await;
    join(&state, a, profile("a")).await.unwrap();

    disconnect(&state, b).await;
    assert_silent(&mut rx_a).await;
}

#[tokio::test]
async fn reset_clears_roster_and_notifies_others() {
    let state = test_helpers::test_app_state();
    let (a, mut rx_a) = test_helpers::connect_client(&state).await;
    let (_b, mut rx_b) = test_helpers::connect_client(&state).await;
    join(&state, a, profile("a")).await.unwrap();
    while timeout(Duration::from_millis(20), rx_b.recv()).await.is_ok() {}

    assert!(reset(&state, a).await.is_empty());
    assert_eq!(recv(&mut rx_b).await.syscall, "room:reset");
    assert_silent(&mut rx_a).await;
    assert!(users(&state).await.is_empty());
}
