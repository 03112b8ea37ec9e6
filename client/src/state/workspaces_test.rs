use super::*;

fn ws(n: u128, due_at_ms: i64) -> Workspace {
    Workspace {
        id: Uuid::from_u128(n),
        title: format!("night-{n}"),
        due_at_ms,
    }
}

// 2024-03-15T00:00:00Z, in milliseconds.
const MAR_15: i64 = 1_710_460_800_000;
const HOUR: i64 = 3_600_000;
const MINUTE: i64 = 60_000;

// =============================================================================
// VIEW
// =============================================================================

#[test]
fn set_items_sorts_soonest_due_first() {
    let mut view = WorkspacesView { loading: true, ..WorkspacesView::default() };
    view.set_items(vec![ws(1, 300), ws(2, 100), ws(3, 200)]);

    let dues: Vec<i64> = view.items.iter().map(|w| w.due_at_ms).collect();
    assert_eq!(dues, vec![100, 200, 300]);
    assert!(!view.loading);
}

#[test]
fn upsert_replaces_by_id_and_resorts() {
    let mut view = WorkspacesView::default();
    view.set_items(vec![ws(1, 100), ws(2, 200)]);

    view.upsert(ws(1, 500));

    assert_eq!(view.items.len(), 2);
    assert_eq!(view.items[0].id, Uuid::from_u128(2));
    assert_eq!(view.get(Uuid::from_u128(1)).unwrap().due_at_ms, 500);
}

#[test]
fn upsert_inserts_new_workspaces_in_order() {
    let mut view = WorkspacesView { create_pending: true, ..WorkspacesView::default() };
    view.set_items(vec![ws(1, 100), ws(3, 300)]);

    view.upsert(ws(2, 200));

    let ids: Vec<u128> = view.items.iter().map(|w| w.id.as_u128()).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert!(!view.create_pending);
}

#[test]
fn get_misses_return_none() {
    let view = WorkspacesView::default();
    assert!(view.get(Uuid::from_u128(7)).is_none());
}

// =============================================================================
// DUE-DATE LABELLING
// =============================================================================

#[test]
fn same_utc_date_is_today() {
    let due = MAR_15 + 22 * HOUR;
    let now = MAR_15 + 10 * HOUR;

    assert_eq!(due_day(due, now, UtcOffset::UTC), DueDay::Today);
    assert_eq!(due_label(due, now, UtcOffset::UTC), "today 22:00");
}

#[test]
fn next_utc_date_is_another_day() {
    let due = MAR_15 + 25 * HOUR + 30 * MINUTE;
    let now = MAR_15 + 10 * HOUR;

    assert_eq!(due_day(due, now, UtcOffset::UTC), DueDay::OtherDay);
    assert_eq!(due_label(due, now, UtcOffset::UTC), "03-16 01:30");
}

#[test]
fn positive_offset_can_pull_both_into_the_same_day() {
    // Due 01:30 UTC on the 16th, viewer at 23:00 UTC on the 15th. At +03:00
    // both land on the 16th locally.
    let due = MAR_15 + 25 * HOUR + 30 * MINUTE;
    let now = MAR_15 + 23 * HOUR;
    let tehranish = UtcOffset::from_hms(3, 0, 0).unwrap();

    assert_eq!(due_day(due, now, UtcOffset::UTC), DueDay::OtherDay);
    assert_eq!(due_day(due, now, tehranish), DueDay::Today);
    assert_eq!(due_label(due, now, tehranish), "today 04:30");
}

#[test]
fn negative_offset_can_split_the_day() {
    // Due 00:30 UTC on the 15th: local date is still the 14th at -02:00.
    let due = MAR_15 + 30 * MINUTE;
    let now = MAR_15 + 10 * HOUR;
    let atlantic = UtcOffset::from_hms(-2, 0, 0).unwrap();

    assert_eq!(due_day(due, now, atlantic), DueDay::OtherDay);
    assert_eq!(due_label(due, now, atlantic), "03-14 22:30");
}

#[test]
fn unrepresentable_timestamps_never_panic() {
    assert_eq!(due_day(i64::MAX, 0, UtcOffset::UTC), DueDay::OtherDay);
    assert_eq!(due_label(i64::MAX, 0, UtcOffset::UTC), "invalid date");
}
