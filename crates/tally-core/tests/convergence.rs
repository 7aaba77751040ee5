//! Order-independence of snapshot resolution and the view derivation laws.

use proptest::prelude::*;

use tally_core::event::PushEvent;
use tally_core::model::{Task, TaskId, TaskPriority, TaskStatus, WorkspaceId};
use tally_core::view::{SortKey, ViewParams, ViewState, derive};

use fixtures::*;

const ID_SPACE: u8 = 8;

#[derive(Debug, Clone)]
enum Op {
    Create { id: u8, foreign: bool },
    Update { id: u8, status: TaskStatus },
    Delete { id: u8 },
}

fn arb_status() -> impl Strategy<Value = TaskStatus> {
    prop::sample::select(TaskStatus::ALL.to_vec())
}

fn arb_priority() -> impl Strategy<Value = TaskPriority> {
    prop::sample::select(TaskPriority::ALL.to_vec())
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..ID_SPACE, any::<bool>()).prop_map(|(id, foreign)| Op::Create { id, foreign }),
        (0..ID_SPACE, arb_status()).prop_map(|(id, status)| Op::Update { id, status }),
        (0..ID_SPACE).prop_map(|id| Op::Delete { id }),
    ]
}

/// Turn ops into events with strictly increasing timestamps, all newer than
/// the snapshot.
fn events(ops: &[Op]) -> Vec<PushEvent> {
    ops.iter()
        .enumerate()
        .map(|(n, op)| {
            let stamp = i64::try_from(n).unwrap_or(i64::MAX) + 1;
            match op {
                Op::Create { id, foreign } => {
                    let mut t = task(&id.to_string(), TaskStatus::Stale, TaskPriority::Medium);
                    if *foreign {
                        t = in_workspace(t, "elsewhere");
                    }
                    t.updated_at = at(stamp);
                    PushEvent::TaskCreated(t)
                }
                Op::Update { id, status } => {
                    let mut t = task(&id.to_string(), *status, TaskPriority::Medium);
                    t.updated_at = at(stamp);
                    PushEvent::TaskUpdated(t)
                }
                Op::Delete { id } => PushEvent::TaskDeleted(TaskId::new(id.to_string())),
            }
        })
        .collect()
}

/// Reference model: snapshot, then each event folded in order.
fn expected(snapshot: &[Task], events: &[PushEvent]) -> Vec<Task> {
    let mut model: Vec<Task> = snapshot.to_vec();
    for event in events {
        match event {
            PushEvent::TaskCreated(t) if t.workspace_id.as_str() == WS => {
                match model.iter_mut().find(|held| held.id == t.id) {
                    Some(held) => *held = t.clone(),
                    None => model.push(t.clone()),
                }
            }
            PushEvent::TaskUpdated(t) => {
                if let Some(held) = model.iter_mut().find(|held| held.id == t.id) {
                    *held = t.clone();
                }
            }
            PushEvent::TaskDeleted(id) => model.retain(|held| held.id != *id),
            _ => {}
        }
    }
    model
}

fn arb_snapshot() -> impl Strategy<Value = Vec<Task>> {
    prop::collection::btree_set(0..ID_SPACE, 0..5).prop_map(|ids| {
        ids.into_iter()
            .map(|id| task(&id.to_string(), TaskStatus::Stale, TaskPriority::Low))
            .collect()
    })
}

fn arb_tasks() -> impl Strategy<Value = Vec<Task>> {
    prop::collection::vec(
        (arb_status(), arb_priority(), prop::option::of(0u32..60)),
        0..40,
    )
    .prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(n, (status, priority, due))| {
                let mut t = task(&n.to_string(), status, priority);
                t.due_date = due.map(|offset| {
                    date("2025-01-01") + chrono::Days::new(u64::from(offset))
                });
                t
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn snapshot_position_does_not_change_outcome(
        snapshot in arb_snapshot(),
        ops in prop::collection::vec(arb_op(), 0..24),
        split in any::<prop::sample::Index>(),
    ) {
        let events = events(&ops);
        let at_snapshot = split.index(events.len() + 1);

        let mut state = ViewState::new(WorkspaceId::new(WS));
        for event in &events[..at_snapshot] {
            state.apply(event);
        }
        state.load_snapshot(snapshot.clone());
        for event in &events[at_snapshot..] {
            state.apply(event);
        }

        let actual: Vec<Task> = state.tasks().cloned().collect();
        prop_assert_eq!(actual, expected(&snapshot, &events));
    }

    #[test]
    fn filter_keeps_only_matching_in_original_order(
        tasks in arb_tasks(),
        status in arb_status(),
    ) {
        let params = ViewParams { filter: Some(status), sort: None };
        let view = derive(&tasks, &params);
        let want: Vec<&Task> = tasks.iter().filter(|t| t.status == status).collect();
        prop_assert_eq!(view, want);
    }

    #[test]
    fn priority_sort_is_non_increasing(tasks in arb_tasks()) {
        let params = ViewParams { filter: None, sort: Some(SortKey::Priority) };
        let view = derive(&tasks, &params);
        prop_assert_eq!(view.len(), tasks.len());
        for pair in view.windows(2) {
            prop_assert!(pair[0].priority.rank() >= pair[1].priority.rank());
        }
    }

    #[test]
    fn due_date_sort_puts_dated_first_ascending(tasks in arb_tasks()) {
        let params = ViewParams { filter: None, sort: Some(SortKey::DueDate) };
        let view = derive(&tasks, &params);
        let first_undated = view.iter().position(|t| t.due_date.is_none()).unwrap_or(view.len());
        prop_assert!(view[first_undated..].iter().all(|t| t.due_date.is_none()));
        for pair in view[..first_undated].windows(2) {
            prop_assert!(pair[0].due_date <= pair[1].due_date);
        }
    }

    #[test]
    fn derivation_is_a_pure_function(
        tasks in arb_tasks(),
        status in prop::option::of(arb_status()),
    ) {
        let params = ViewParams { filter: status, sort: Some(SortKey::Priority) };
        prop_assert_eq!(derive(&tasks, &params), derive(&tasks, &params));
    }
}
