use super::*;

const TOLERANCE: f64 = 1e-6;

fn profile(name: &str) -> Profile {
    Profile { name: name.into(), color: "Coral".into() }
}

fn room_with(n: usize) -> (Room, Vec<Uuid>) {
    let mut room = Room::default();
    let ids: Vec<Uuid> = (0..n).map(|_| Uuid::new_v4()).collect();
    for (i, id) in ids.iter().enumerate() {
        room.join(*id, profile(&format!("user{i}"))).unwrap();
    }
    (room, ids)
}

fn next_of(events: &[RoomEvent]) -> Option<&NextCalibration> {
    events.iter().find_map(|e| match e {
        RoomEvent::NextCalibration(next) => Some(next),
        _ => None,
    })
}

/// Answer every "your turn" notice until the room goes quiet.
fn drive(room: &mut Room, ids: &[Uuid], bearing: impl Fn(usize, usize) -> f64) -> Vec<(usize, usize)> {
    let index_of = |id: Uuid| ids.iter().position(|x| *x == id).expect("known id");
    let mut order = Vec::new();
    let mut next = room.next_calibration();
    while let Some(turn) = next {
        let from = index_of(turn.participant_id);
        let to = index_of(turn.partner.id);
        order.push((from, to));
        let events = room
            .submit_calibration(turn.participant_id, turn.partner.id, bearing(from, to))
            .expect("calibration in sequence is accepted");
        next = next_of(&events).cloned();
    }
    order
}

fn position_of(room: &Room, id: Uuid) -> Position {
    room.participant(id).unwrap().position().expect("participant is positioned")
}

// =============================================================================
// SCENARIOS
// =============================================================================

#[test]
fn two_participants_anchor_and_position() {
    let (mut room, ids) = room_with(2);

    room.submit_calibration(ids[0], ids[1], 90.0).unwrap();
    room.submit_calibration(ids[1], ids[0], -90.0).unwrap();

    let a = room.participant(ids[0]).unwrap();
    let b = room.participant(ids[1]).unwrap();
    assert_eq!(a.position(), Some(Position::ORIGIN));
    assert_eq!(b.position(), Some(Position::new(0.0, 100.0)));
    assert!(a.is_positioned() && b.is_positioned());
    assert_eq!(a.angle_to_grid(), Some(90.0));
    // 0's bearing to 1 is grid 0, so 1's -90 toward 0 (grid 180) gives 90.
    assert_eq!(b.angle_to_grid(), Some(90.0));
    assert!(a.has_calibrated());
    assert!(!b.has_calibrated(), "join index 1 still owes a bearing to 2");
}

#[test]
fn demo_bearings_follow_canonical_order_and_close_the_triangle() {
    let (mut room, ids) = room_with(3);
    let order = drive(&mut room, &ids, |from, to| match (from, to) {
        (0, 1) => 320.0,
        (1, 0) => 250.0,
        (1, 2) => 310.0,
        (2, 0) => 90.0,
        (2, 1) => 40.0,
        other => panic!("unexpected calibration {other:?}"),
    });
    assert_eq!(order, vec![(0, 1), (1, 0), (1, 2), (2, 0), (2, 1)]);

    let a = position_of(&room, ids[0]);
    let b = position_of(&room, ids[1]);
    let n = position_of(&room, ids[2]);

    // Recorded bearings give 70° at A, 60° at B and 50° at N.
    let law = 100.0 / 50f64.to_radians().sin();
    assert!((a.distance_to(n) - law * 60f64.to_radians().sin()).abs() < TOLERANCE);
    assert!((b.distance_to(n) - law * 70f64.to_radians().sin()).abs() < TOLERANCE);
}

#[test]
fn synthetic_layout_is_recovered_for_a_chain_of_five() {
    let truth = [
        Position::ORIGIN,
        Position::new(0.0, 100.0),
        Position::new(60.0, 150.0),
        Position::new(-80.0, -40.0),
        Position::new(120.0, 20.0),
    ];
    let compass_offset = [12.0, -75.0, 200.0, 33.3, -150.0];

    let (mut room, ids) = room_with(truth.len());
    drive(&mut room, &ids, |from, to| truth[from].bearing_to(truth[to]) + compass_offset[from]);

    for (i, id) in ids.iter().enumerate() {
        let got = position_of(&room, *id);
        assert!(got.distance_to(truth[i]) < TOLERANCE, "participant {i}: expected {:?}, got {got:?}", truth[i]);

        let angle = room.participant(*id).unwrap().angle_to_grid().unwrap();
        assert!(angle::angular_distance(angle, compass_offset[i]) < TOLERANCE);
    }
    assert_eq!(room.positions().len(), truth.len());
}

#[test]
fn positions_log_keeps_computation_order() {
    let (mut room, ids) = room_with(3);
    drive(&mut room, &ids, |from, to| match (from, to) {
        (0, 1) => 320.0,
        (1, 0) => 250.0,
        (1, 2) => 310.0,
        (2, 0) => 90.0,
        _ => 40.0,
    });

    let logged: Vec<u32> = room.positions().iter().map(|r| r.join_index).collect();
    assert_eq!(logged, vec![0, 1, 2]);
    assert_eq!(room.positions()[2].participant_id, ids[2]);
}

// =============================================================================
// EVENTS
// =============================================================================

#[test]
fn join_reports_roster_and_next_turn() {
    let mut room = Room::default();
    let a = Uuid::new_v4();
    let events = room.join(a, profile("annie")).unwrap();
    assert_eq!(events.len(), 1, "single participant gets no turn");
    let RoomEvent::Joined { participant, users } = &events[0] else {
        panic!("expected Joined, got {:?}", events[0]);
    };
    assert_eq!(participant.join_index, 0);
    assert!(participant.is_reference);
    assert_eq!(users.len(), 1);

    let b = Uuid::new_v4();
    let events = room.join(b, profile("bep")).unwrap();
    let next = next_of(&events).expect("reference is up");
    assert_eq!(next.participant_id, a);
    assert_eq!(next.partner.id, b);
}

#[test]
fn calibration_emits_update_then_position() {
    let (mut room, ids) = room_with(2);
    let events = room.submit_calibration(ids[0], ids[1], 90.0).unwrap();

    assert!(matches!(&events[0], RoomEvent::UsersUpdated { changed, .. } if changed.calibration_count == 1));
    let RoomEvent::PositionComputed { changed, positions, .. } = &events[1] else {
        panic!("expected PositionComputed, got {:?}", events[1]);
    };
    assert_eq!(changed.id, ids[0]);
    assert_eq!(positions.len(), 1);
    assert_eq!(next_of(&events).map(|n| n.participant_id), Some(ids[1]));
}

#[test]
fn second_calibration_of_join_index_one_does_not_reposition() {
    let (mut room, ids) = room_with(3);
    room.submit_calibration(ids[0], ids[1], 0.0).unwrap();
    room.submit_calibration(ids[1], ids[0], 180.0).unwrap();
    let events = room.submit_calibration(ids[1], ids[2], 45.0).unwrap();

    assert!(!events.iter().any(|e| matches!(e, RoomEvent::PositionComputed { .. })));
    assert_eq!(room.positions().len(), 2);
    assert!(room.participant(ids[1]).unwrap().has_calibrated());
}

// =============================================================================
// REJECTIONS
// =============================================================================

#[test]
fn unknown_target_is_rejected_without_mutation() {
    let (mut room, ids) = room_with(2);
    let before = room.users();
    let ghost = Uuid::new_v4();

    assert_eq!(room.submit_calibration(ids[0], ghost, 90.0), Err(EngineError::NotFound(ghost)));
    assert_eq!(room.users(), before);
}

#[test]
fn unknown_sender_is_rejected() {
    let (mut room, ids) = room_with(2);
    let ghost = Uuid::new_v4();
    assert_eq!(room.submit_calibration(ghost, ids[0], 90.0), Err(EngineError::NotFound(ghost)));
}

#[test]
fn non_finite_bearing_is_rejected_without_mutation() {
    let (mut room, ids) = room_with(2);
    let before = room.users();

    assert!(matches!(room.submit_calibration(ids[0], ids[1], f64::NAN), Err(EngineError::InvalidAngle(_))));
    assert_eq!(
        room.submit_calibration(ids[0], ids[1], f64::INFINITY),
        Err(EngineError::InvalidAngle(f64::INFINITY))
    );
    assert_eq!(room.users(), before);
}

#[test]
fn self_calibration_is_rejected() {
    let (mut room, ids) = room_with(2);
    assert_eq!(room.submit_calibration(ids[0], ids[0], 10.0), Err(EngineError::SelfCalibration(ids[0])));
}

#[test]
fn extra_calibration_after_completion_is_rejected() {
    let (mut room, ids) = room_with(2);
    room.submit_calibration(ids[0], ids[1], 90.0).unwrap();
    let before = room.users();

    assert_eq!(room.submit_calibration(ids[0], ids[1], 95.0), Err(EngineError::AlreadyCalibrated(ids[0])));
    assert_eq!(room.users(), before);
}

#[test]
fn out_of_order_anchor_is_rejected_without_mutation() {
    let (mut room, ids) = room_with(2);
    let before = room.users();

    // Join index 1 calibrating before the reference has anchored.
    let err = room.submit_calibration(ids[1], ids[0], 10.0).unwrap_err();
    assert_eq!(err, EngineError::AnchorNotReady(ids[0]));
    assert!(err.is_out_of_turn());
    assert_eq!(room.users(), before);
}

#[test]
fn reference_calibrating_toward_the_wrong_peer_is_rejected() {
    let (mut room, ids) = room_with(3);
    let before = room.users();

    assert_eq!(
        room.submit_calibration(ids[0], ids[2], 45.0),
        Err(EngineError::UnexpectedTarget { participant: ids[0], target: ids[2], expected: Some(1) })
    );
    assert_eq!(room.users(), before);

    // The chain is still intact: the reference can point at 1 and 1 goes next.
    let events = room.submit_calibration(ids[0], ids[1], 320.0).unwrap();
    assert_eq!(next_of(&events).map(|n| n.participant_id), Some(ids[1]));
    room.submit_calibration(ids[1], ids[0], 250.0).unwrap();
    assert!(room.participant(ids[1]).unwrap().is_positioned());
}

#[test]
fn skipping_the_bearing_to_the_reference_is_rejected() {
    let (mut room, ids) = room_with(3);
    for (from, to, bearing) in [(0, 1, 320.0), (1, 0, 250.0), (1, 2, 310.0)] {
        room.submit_calibration(ids[from], ids[to], bearing).unwrap();
    }
    let before = room.users();

    assert_eq!(
        room.submit_calibration(ids[2], ids[1], 40.0),
        Err(EngineError::UnexpectedTarget { participant: ids[2], target: ids[1], expected: Some(0) })
    );
    assert_eq!(room.users(), before);

    room.submit_calibration(ids[2], ids[0], 90.0).unwrap();
    room.submit_calibration(ids[2], ids[1], 40.0).unwrap();
    assert!(room.participant(ids[2]).unwrap().is_positioned());
}

#[test]
fn unexpected_target_maps_to_its_error_code() {
    use crate::frame::ErrorCode;

    let (mut room, ids) = room_with(3);
    let err = room.submit_calibration(ids[0], ids[2], 45.0).unwrap_err();
    assert_eq!(err.error_code(), "E_UNEXPECTED_TARGET");
    assert!(!err.retryable());
}

#[test]
fn duplicate_join_is_rejected() {
    let (mut room, ids) = room_with(1);
    assert_eq!(room.join(ids[0], profile("again")), Err(EngineError::DuplicateParticipant(ids[0])));
    assert_eq!(room.roster().len(), 1);
}

// =============================================================================
// DEGENERATE GEOMETRY
// =============================================================================

#[test]
fn collinear_layout_keeps_calibration_but_not_position() {
    let (mut room, ids) = room_with(3);
    room.submit_calibration(ids[0], ids[1], 0.0).unwrap();
    room.submit_calibration(ids[1], ids[0], 180.0).unwrap();
    room.submit_calibration(ids[1], ids[2], 0.0).unwrap();
    room.submit_calibration(ids[2], ids[0], 180.0).unwrap();
    let events = room.submit_calibration(ids[2], ids[1], 180.0).unwrap();

    let failure = events.iter().find_map(|e| match e {
        RoomEvent::PositionFailed { error, .. } => Some(error.clone()),
        _ => None,
    });
    assert_eq!(failure, Some(EngineError::DegenerateGeometry(2)));

    let n = room.participant(ids[2]).unwrap();
    assert_eq!(n.calibration_count(), 2);
    assert_eq!(n.angle_to_grid(), Some(0.0));
    assert!(!n.is_positioned());
    assert_eq!(room.positions().len(), 2);
}

#[test]
fn degenerate_participant_retries_on_its_next_calibration() {
    let (mut room, ids) = room_with(3);
    room.submit_calibration(ids[0], ids[1], 0.0).unwrap();
    room.submit_calibration(ids[1], ids[0], 180.0).unwrap();
    room.submit_calibration(ids[1], ids[2], 0.0).unwrap();
    room.submit_calibration(ids[2], ids[0], 180.0).unwrap();
    room.submit_calibration(ids[2], ids[1], 180.0).unwrap();

    let late = Uuid::new_v4();
    let events = room.join(late, profile("late")).unwrap();
    let next = next_of(&events).expect("join index 2 owes a bearing to 3");
    assert_eq!(next.participant_id, ids[2]);

    let events = room.submit_calibration(ids[2], late, 0.0).unwrap();
    assert!(events.iter().any(|e| matches!(e, RoomEvent::PositionFailed { .. })));
}

// =============================================================================
// LEAVE / RESET
// =============================================================================

#[test]
fn leave_mid_sequence_skips_departed_participant() {
    let (mut room, ids) = room_with(3);
    room.submit_calibration(ids[0], ids[1], 90.0).unwrap();

    let events = room.leave(ids[1]).unwrap();
    let RoomEvent::Left { removed, users } = &events[0] else {
        panic!("expected Left, got {:?}", events[0]);
    };
    assert_eq!(removed.id, ids[1]);
    assert_eq!(users.len(), 2);

    let next = next_of(&events).expect("join index 2 is live");
    assert_eq!(next.participant_id, ids[2]);
    assert_eq!(next.partner.id, ids[0]);
    assert_eq!(room.participant(ids[2]).unwrap().join_index(), 2);
}

#[test]
fn leave_unknown_is_not_found() {
    let (mut room, _) = room_with(1);
    let ghost = Uuid::new_v4();
    assert_eq!(room.leave(ghost), Err(EngineError::NotFound(ghost)));
}

#[test]
fn reset_clears_everything() {
    let (mut room, ids) = room_with(2);
    room.submit_calibration(ids[0], ids[1], 90.0).unwrap();

    assert_eq!(room.reset(), vec![RoomEvent::Reset]);
    assert!(room.users().is_empty());
    assert!(room.positions().is_empty());

    let events = room.join(ids[1], profile("again")).unwrap();
    assert!(matches!(&events[0], RoomEvent::Joined { participant, .. } if participant.join_index == 0));
}

#[test]
fn custom_reference_length_scales_the_grid() {
    let mut room = Room::new(GridConfig { reference_length: 250.0, ..GridConfig::default() });
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    room.join(a, profile("a")).unwrap();
    room.join(b, profile("b")).unwrap();
    room.submit_calibration(a, b, 0.0).unwrap();
    room.submit_calibration(b, a, 180.0).unwrap();

    assert_eq!(position_of(&room, b), Position::new(0.0, 250.0));
}
