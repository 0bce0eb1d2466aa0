//! Property tests for the reducer invariants.

use loomtrack::{reduce, Action, AppState, Origin, ProductionEntry};
use proptest::prelude::*;
use std::collections::HashSet;

/// Small key space to force collisions.
fn taka_strategy() -> impl Strategy<Value = String> {
    (0u32..20).prop_map(|n| format!("{}", 2400 + n))
}

fn entry_strategy() -> impl Strategy<Value = ProductionEntry> {
    (taka_strategy(), 1u32..15, 50u32..200).prop_map(|(taka, machine, meter)| {
        ProductionEntry::new(taka, machine.to_string(), meter.to_string(), "15/8/25").unwrap()
    })
}

proptest! {
    /// For all sequences of `AddProductionEntries`, no two entries share
    /// a taka number.
    #[test]
    fn prop_taka_numbers_stay_unique(
        batches in prop::collection::vec(prop::collection::vec(entry_strategy(), 0..5), 0..10)
    ) {
        let mut state = AppState::default();
        for batch in batches {
            state = reduce(&state, &Action::AddProductionEntries(batch), Origin::Local);
        }

        let mut seen = HashSet::new();
        for entry in &state.production_entries {
            prop_assert!(
                seen.insert(entry.taka_number.clone()),
                "duplicate taka number {}",
                entry.taka_number
            );
        }
    }

    /// Under any interleaving of adds, deletes, and push completions,
    /// the queue never simultaneously holds an add and a delete for the
    /// same key, and every queued add still exists in the collection.
    #[test]
    fn prop_queue_never_holds_add_and_delete_for_same_key(
        ops in prop::collection::vec((taka_strategy(), 0u8..10), 1..40)
    ) {
        let mut state = AppState::default();
        for (taka, kind) in ops {
            let action = match kind {
                // Occasional simulated successful push.
                0 => Action::ClearUnsyncedChanges,
                1..=5 => Action::AddProductionEntries(vec![
                    ProductionEntry::new(taka, "1", "100", "15/8/25").unwrap(),
                ]),
                _ => Action::DeleteProductionEntry(taka),
            };
            state = reduce(&state, &action, Origin::Local);
        }

        let queue = &state.unsynced.production;
        for key in &queue.delete {
            prop_assert!(
                !queue.add.iter().any(|e| &e.taka_number == key),
                "queue holds both add and delete for {key}"
            );
        }
        for entry in &queue.add {
            prop_assert!(state.find_production(&entry.taka_number).is_some());
        }
    }
}
