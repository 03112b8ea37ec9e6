use super::*;

use wire::Data;

fn member(n: u128, status: ParticipantStatus) -> Participant {
    Participant {
        user_id: Uuid::from_u128(n),
        nickname: format!("owl-{n}"),
        status,
        joined_at_ms: 1_700_000_000_000 + i64::try_from(n).unwrap(),
    }
}

fn snapshot_frame(items: &[Participant]) -> Frame {
    Frame::request("participant:snapshot", Data::new())
        .with_data("items", serde_json::to_value(items).unwrap())
}

// =============================================================================
// SNAPSHOT INGEST
// =============================================================================

#[test]
fn apply_snapshot_replaces_the_roster() {
    let mut view = ParticipantsView::default();
    view.items = vec![member(9, ParticipantStatus::Completed)];

    let roster = vec![
        member(1, ParticipantStatus::NotStarted),
        member(2, ParticipantStatus::InProgress),
    ];
    view.apply_snapshot(&snapshot_frame(&roster)).unwrap();

    assert_eq!(view.len(), 2);
    assert_eq!(view.items[0].user_id, Uuid::from_u128(1));
}

#[test]
fn apply_snapshot_rejects_malformed_payloads() {
    let mut view = ParticipantsView::default();
    let bad = Frame::request("participant:snapshot", Data::new())
        .with_data("items", serde_json::json!([{"user_id": "not-a-uuid"}]));

    assert!(view.apply_snapshot(&bad).is_err());
}

#[test]
fn empty_snapshot_clears_the_roster() {
    let mut view = ParticipantsView::default();
    view.items = vec![member(1, ParticipantStatus::NotStarted)];

    view.apply_snapshot(&snapshot_frame(&[])).unwrap();
    assert!(view.is_empty());
}

// =============================================================================
// DERIVED STATE
// =============================================================================

#[test]
fn counts_tally_each_status() {
    let mut view = ParticipantsView::default();
    view.items = vec![
        member(1, ParticipantStatus::NotStarted),
        member(2, ParticipantStatus::InProgress),
        member(3, ParticipantStatus::InProgress),
        member(4, ParticipantStatus::Completed),
    ];

    let counts = view.counts();
    assert_eq!(counts.not_started, 1);
    assert_eq!(counts.in_progress, 2);
    assert_eq!(counts.completed, 1);
    assert_eq!(counts.total(), 4);
}

#[test]
fn counts_on_an_empty_roster_are_zero() {
    let view = ParticipantsView::default();
    assert_eq!(view.counts(), StatusCounts::default());
    assert_eq!(view.counts().total(), 0);
}

#[test]
fn my_status_and_is_joined_look_up_by_user() {
    let mut view = ParticipantsView::default();
    view.items = vec![member(1, ParticipantStatus::InProgress)];

    assert_eq!(view.my_status(Uuid::from_u128(1)), Some(ParticipantStatus::InProgress));
    assert!(view.is_joined(Uuid::from_u128(1)));

    assert_eq!(view.my_status(Uuid::from_u128(2)), None);
    assert!(!view.is_joined(Uuid::from_u128(2)));
}
