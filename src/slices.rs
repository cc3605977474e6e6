//! Decides which gameweek slices a run must (re)capture and (re)transform.

use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Season bootstrap or full resync: every gameweek from 1 to current.
    Full,
    /// Tail update: the live gameweek, plus the most recently captured one
    /// when it differs (its bonus points and final stats are confirmed some
    /// time after the matches finish, so the first run after completion must
    /// re-fetch it once more).
    Incremental,
}

/// Ordered set of gameweeks requiring (re)capture, ascending. The caller has
/// already established `current_gameweek` from the live API; an unknowable
/// current gameweek aborts the run before selection happens.
pub fn select_slices(
    mode: RunMode,
    current_gameweek: u32,
    captured: &BTreeSet<u32>,
) -> Vec<u32> {
    match mode {
        RunMode::Full => (1..=current_gameweek).collect(),
        RunMode::Incremental => {
            let mut out = Vec::with_capacity(2);
            if let Some(&latest) = captured.iter().next_back() {
                if latest != current_gameweek {
                    out.push(latest);
                }
            }
            out.push(current_gameweek);
            out.sort_unstable();
            out.dedup();
            out
        }
    }
}
