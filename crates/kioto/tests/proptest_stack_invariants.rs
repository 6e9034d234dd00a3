//! Stack invariants under random operation sequences.

mod common;

use common::Harness;
use kioto::{BackEvent, Background, Direction, Tag};
use proptest::prelude::*;

const LABELS: [&str; 6] = ["n0", "n1", "n2", "n3", "n4", "n5"];

#[derive(Debug, Clone)]
enum Op {
    Navigate(usize),
    BeginStack(usize),
    Replace(usize),
    ReplaceStack(usize),
    Back(usize),
    Up(usize),
    PopToRoot(usize),
    Reset(usize),
    Present,
    PresentDropped,
    BackPressed,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<usize>().prop_map(Op::Navigate),
        2 => any::<usize>().prop_map(Op::BeginStack),
        1 => any::<usize>().prop_map(Op::Replace),
        1 => any::<usize>().prop_map(Op::ReplaceStack),
        2 => any::<usize>().prop_map(Op::Back),
        1 => any::<usize>().prop_map(Op::Up),
        1 => any::<usize>().prop_map(Op::PopToRoot),
        1 => any::<usize>().prop_map(Op::Reset),
        1 => Just(Op::Present),
        1 => Just(Op::PresentDropped),
        1 => Just(Op::BackPressed),
    ]
}

fn apply(h: &Harness, op: &Op, step: usize) {
    let entries = h.nav.entries();
    let pick = |sel: usize| entries[sel % entries.len()].pane.navigator();
    let token = || h.token(LABELS[step % LABELS.len()]);
    match *op {
        Op::Navigate(sel) => pick(sel).navigate(token()),
        Op::BeginStack(sel) => pick(sel).begin_stack(token()),
        Op::Replace(sel) => pick(sel).replace(token()),
        Op::ReplaceStack(sel) => pick(sel).replace_stack(token()),
        Op::Back(sel) => pick(sel).navigate_back(),
        Op::Up(sel) => pick(sel).navigate_up(),
        Op::PopToRoot(sel) => pick(sel).pop_to_root(),
        Op::Reset(sel) => pick(sel).reset_navigation(token()),
        Op::Present => h.nav.present_stack(token()),
        Op::PresentDropped => drop(h.nav.await_present_stack(token())),
        Op::BackPressed => {
            h.nav.on_back(BackEvent::Pressed);
        }
    }
}

/// Nodes built minus nodes cleared since the last call.
fn live_delta(h: &Harness) -> isize {
    let log = h.registry.take_log();
    let count = |prefix: &str| log.iter().filter(|line| line.starts_with(prefix)).count() as isize;
    count("built:") - count("cleared:")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_operations_keep_the_stack_well_formed(
        ops in prop::collection::vec(op_strategy(), 1..40)
    ) {
        let h = Harness::new();
        h.nav.set_navigation(h.token("root"));
        let mut live = live_delta(&h);

        for (step, op) in ops.iter().enumerate() {
            apply(&h, op, step);
            live += live_delta(&h);

            let entries = h.nav.entries();
            prop_assert!(!entries.is_empty());
            prop_assert_eq!(entries[0].tag, Tag::Root);
            prop_assert!(entries[1..].iter().all(|entry| entry.tag != Tag::Root));
            prop_assert_eq!(live, entries.len() as isize);

            let panes = h.nav.active_panes().expect("snapshot");
            let ids: Vec<_> = entries.iter().map(|entry| entry.id).collect();
            prop_assert_eq!(&panes.active_ids, &ids);
            prop_assert_eq!(panes.foreground.id(), ids[ids.len() - 1]);
            match &panes.background {
                Some(Background::Pane { pane, .. }) => {
                    prop_assert!(ids.len() >= 2);
                    prop_assert_eq!(pane.id(), ids[ids.len() - 2]);
                }
                Some(Background::Handled) => prop_assert!(false, "no dismiss handler installed"),
                None => prop_assert_eq!(ids.len(), 1),
            }
        }

        let snapshots = h.snapshots();
        for pair in snapshots.windows(2) {
            let (before, after) = (&pair[0], &pair[1]);
            prop_assert_ne!(before, after);
            let (from, to) = (before.active_ids.len(), after.active_ids.len());
            if to > from {
                prop_assert_eq!(after.transition.direction(), Direction::Forward);
            } else if to < from {
                prop_assert_ne!(after.transition.direction(), Direction::Forward);
            }
        }
    }
}
