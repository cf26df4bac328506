// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::{Arc, Mutex};

use crate::config::HistoryConfig;
use crate::event::{CanvasEvent, EventKind};
use crate::executor::ApplyOutcome;
use crate::tests::fixtures::*;
use crate::types::geometry::Color;
use crate::types::id::{EventId, LayerId};

fn small_config() -> HistoryConfig {
    HistoryConfig {
        cost_ceiling: 30,
        event_cost: 10,
        marker_cost: 1,
    }
}

#[test]
fn test_event_appends_only_on_success() {
    let mut history = history(1);

    assert_eq!(history.event(drawn(0, "a", 0, line(0, 0, 5, 5, Color::BLACK))), ApplyOutcome::Applied);
    assert_eq!(history.event(drawn(1, "a", 3, line(0, 0, 5, 5, Color::BLACK))), ApplyOutcome::RolledBack);

    let ids: Vec<EventId> = history.real_history().map(|e| e.id).collect();
    assert_eq!(ids, vec![EventId(0)]);
    assert_eq!(history.total_cost(), 10);
}

#[test]
fn test_costs_distinguish_markers() {
    let mut history = history(1);
    history.event(drawn(0, "a", 0, line(0, 0, 5, 5, Color::BLACK)));
    history.event(revoked(1, "a", 0));
    history.event(restored(2, "a", 0));
    assert_eq!(history.total_cost(), 12);
}

#[test]
fn test_compaction_evicts_oldest_until_excess_covered() {
    let mut history = history_with(1, small_config());
    for i in 0..3 {
        history.event(drawn(i, "a", 0, line(0, i as i32, 20, i as i32, Color::BLACK)));
    }
    assert_eq!(history.total_cost(), 30);
    assert_eq!(history.real_history().count(), 3);

    history.event(drawn(3, "a", 0, line(0, 3, 20, 3, Color::BLACK)));
    let ids: Vec<u64> = history.real_history().map(|e| e.id.0).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(history.total_cost(), 30);
}

#[test]
fn test_compaction_is_transparent() {
    let mut compacting = history_with(2, small_config());
    let mut unbounded = history_with(2, HistoryConfig {
        cost_ceiling: u64::MAX,
        ..small_config()
    });

    let mut rng = Pcg32::new(7);
    for i in 0..40u64 {
        let layer = rng.below(2);
        let (x, y) = (rng.below(24) as i32, rng.below(24) as i32);
        let color = Color::rgba(rng.below(256) as u8, 40, 90, 128 + rng.below(128) as u8);
        let event = drawn(i, "a", layer, line(x, y, 23 - x, 23 - y, color));
        compacting.event(event.clone());
        unbounded.event(event);
        assert_eq!(composite(compacting.drawer()), composite(unbounded.drawer()));
    }

    assert!(compacting.real_history().count() < unbounded.real_history().count());

    // Checkpoint plus what is left must re-derive the same canvas.
    compacting.re_execute().unwrap();
    assert_eq!(model_hash(compacting.model()), model_hash(unbounded.model()));
}

#[test]
fn test_compaction_keeps_revoked_events_out_of_checkpoint() {
    let mut history = history_with(1, small_config());
    let empty = model_hash(history.model());

    history.event(drawn(0, "a", 0, line(0, 5, 20, 5, Color::BLACK)));
    history.event(revoked(1, "a", 0));
    assert_eq!(model_hash(history.model()), empty);

    for i in 2..6 {
        history.event(drawn(i, "b", 0, line(0, 20, 1, 20, Color::WHITE)));
    }
    assert!(history.real_history().all(|e| e.id != EventId(0)));

    // Re-deriving from the compacted checkpoint must not resurrect event 0.
    history.re_execute().unwrap();
    let mut reference = crate::tests::fixtures::history(1);
    for i in 2..6 {
        reference.event(drawn(i, "b", 0, line(0, 20, 1, 20, Color::WHITE)));
    }
    assert_eq!(model_hash(history.model()), model_hash(reference.model()));
}

#[test]
fn test_observers_run_in_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut history = history_with(1, small_config());
    history.add_observer(Box::new(Recorder::tagged("A:", log.clone())));
    history.add_observer(Box::new(Recorder::tagged("B:", log.clone())));

    history.event(drawn(0, "a", 0, line(0, 0, 3, 3, Color::BLACK)));
    let entries = log.lock().unwrap().clone();
    assert_eq!(entries, vec!["A:event #0", "B:event #0", "A:changed", "B:changed"]);
}

#[test]
fn test_compaction_notifies_wipe() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut history = history_with(1, small_config());
    history.add_observer(Box::new(Recorder::tagged("", log.clone())));

    for i in 0..4 {
        history.event(drawn(i, "a", 0, line(0, 0, 3, 3, Color::BLACK)));
    }
    assert!(log.lock().unwrap().iter().any(|e| e == "wiped 1"));
}

#[test]
fn test_rolled_back_event_is_not_observed() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut history = history(1);
    history.add_observer(Box::new(Recorder::tagged("", log.clone())));

    history.event(revoked(0, "a", 99));
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn test_broken_compaction_resets_history() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let (mut history, faulty) = faulty_history(1, small_config());
    history.add_observer(Box::new(Recorder::tagged("", log.clone())));

    for i in 0..3 {
        history.event(drawn(i, "a", 0, line(0, i as i32, 20, i as i32, Color::BLACK)));
    }
    // The next event is an erase, which still applies, but folding the
    // evicted stroke into the checkpoint fails.
    faulty.arm(true);
    let erase = CanvasEvent::new(
        EventId(3),
        user("a"),
        EventKind::LayerDrawn {
            layer_id: LayerId(0),
            draw: crate::state::command::DrawCommand::Erase {
                positions: vec![crate::types::geometry::Position::new(0, 0)],
                opacity: 255,
                width: 1,
            },
        },
    );
    assert_eq!(history.event(erase), ApplyOutcome::Applied);
    faulty.arm(false);

    assert!(log.lock().unwrap().iter().any(|e| e == "broken"));
    assert_eq!(history.real_history().count(), 0);
    assert_eq!(history.total_cost(), 0);
    assert_eq!(model_hash(history.checkpoint()), model_hash(history.model()));
}

#[test]
fn test_sync_state_roundtrip_reproduces_live_model() {
    let mut server = history_with(2, small_config());
    for i in 0..6u64 {
        server.event(drawn(i, "a", (i % 2) as u32, line(i as i32, 0, 0, i as i32 * 3, Color::BLACK)));
    }
    server.event(revoked(6, "a", 5));

    let state = server.sync_state();
    assert_eq!(state.history.len(), server.real_history().count());

    let mut client = history(1);
    client.install_sync_state(state).unwrap();
    assert_eq!(model_hash(client.model()), model_hash(server.model()));
    assert_eq!(model_hash(client.checkpoint()), model_hash(server.checkpoint()));
    assert!(client.timeline().find(EventId(5)).unwrap().is_revoked);
}

#[test]
fn test_set_history_with_inconsistent_events_breaks() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut history = history(1);
    history.add_observer(Box::new(Recorder::tagged("", log.clone())));

    let result = history.set_history(blank_model(1), vec![drawn(0, "a", 7, line(0, 0, 1, 1, Color::BLACK))]);
    assert!(result.is_err());
    assert!(history.timeline().is_empty());
    assert!(log.lock().unwrap().iter().any(|e| e == "broken"));
}
