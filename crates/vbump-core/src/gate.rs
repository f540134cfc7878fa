//! Run-wide consistency decision.
//!
//! Every occurrence found during scanning records its old version here.
//! Once scanning is over the pipeline calls [`ConsistencyGate::decide`]
//! exactly once, and every writer blocked in [`ConsistencyGate::wait`]
//! wakes up with the same [`Decision`]. Writers that call `wait` after
//! the decision return immediately.

use std::collections::BTreeSet;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use tracing::{debug, instrument};

/// What writers should do once scanning is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Exactly one old version was found; write.
    Proceed,
    /// Zero or several old versions, or scanning failed; do nothing.
    Abort,
}

/// Outcome of [`ConsistencyGate::decide`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// All occurrences share this old version.
    Consistent(String),
    /// Nothing was recorded.
    Empty,
    /// Distinct old versions, sorted.
    Inconsistent(Vec<String>),
}

/// Collects old versions and broadcasts a single decision.
#[derive(Debug, Default)]
pub struct ConsistencyGate {
    versions: Mutex<BTreeSet<String>>,
    decision: Mutex<Option<Decision>>,
    decided: Condvar,
}

impl ConsistencyGate {
    /// A fresh gate in the scanning state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the old version of one occurrence.
    ///
    /// Ignored once the gate has decided or aborted.
    pub fn record(&self, old_version: &str) {
        if self.decision().is_some() {
            debug!(old_version, "gate already closed, not recorded");
            return;
        }
        let mut versions = lock(&self.versions);
        if versions.insert(old_version.to_string()) {
            debug!(old_version, "new distinct version recorded");
        }
    }

    /// Distinct versions recorded so far, sorted.
    pub fn versions(&self) -> Vec<String> {
        lock(&self.versions).iter().cloned().collect()
    }

    /// Close the gate based on what was recorded.
    ///
    /// If a decision was already broadcast (e.g. by [`abort`](Self::abort))
    /// it stands; the verdict is still computed for the caller.
    #[instrument(skip(self))]
    pub fn decide(&self) -> Verdict {
        let versions = self.versions();
        let (verdict, decision) = match versions.len() {
            0 => (Verdict::Empty, Decision::Abort),
            1 => {
                let only = versions.into_iter().next().unwrap_or_default();
                (Verdict::Consistent(only), Decision::Proceed)
            }
            _ => (Verdict::Inconsistent(versions), Decision::Abort),
        };
        self.broadcast(decision);
        debug!(?verdict, "gate decided");
        verdict
    }

    /// Open the gate in abort mode so no writer is left waiting.
    pub fn abort(&self) {
        self.broadcast(Decision::Abort);
    }

    /// Block until a decision is available.
    pub fn wait(&self) -> Decision {
        let guard = lock(&self.decision);
        let guard = self
            .decided
            .wait_while(guard, |d| d.is_none())
            .unwrap_or_else(PoisonError::into_inner);
        guard.unwrap_or(Decision::Abort)
    }

    /// The decision, if one was made.
    pub fn decision(&self) -> Option<Decision> {
        *lock(&self.decision)
    }

    fn broadcast(&self, decision: Decision) {
        let mut slot = lock(&self.decision);
        if slot.is_none() {
            *slot = Some(decision);
            self.decided.notify_all();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn versions_are_frozen_once_decided() {
        let gate = ConsistencyGate::new();
        gate.record("1.0.0");
        assert_eq!(gate.decide(), Verdict::Consistent("1.0.0".into()));
        gate.record("2.0.0");
        assert_eq!(gate.versions(), vec!["1.0.0".to_string()]);

        let aborted = ConsistencyGate::new();
        aborted.abort();
        aborted.record("1.0.0");
        assert!(aborted.versions().is_empty());
    }

    #[test]
    fn empty_gate_aborts() {
        let gate = ConsistencyGate::new();
        assert_eq!(gate.decide(), Verdict::Empty);
        assert_eq!(gate.wait(), Decision::Abort);
    }

    #[test]
    fn single_version_proceeds() {
        let gate = ConsistencyGate::new();
        gate.record("1.0.0");
        gate.record("1.0.0");
        assert_eq!(gate.decide(), Verdict::Consistent("1.0.0".into()));
        assert_eq!(gate.wait(), Decision::Proceed);
    }

    #[test]
    fn distinct_versions_are_sorted() {
        let gate = ConsistencyGate::new();
        gate.record("1.2.0");
        gate.record("1.10.0");
        gate.record("0.9.0");
        assert_eq!(
            gate.decide(),
            Verdict::Inconsistent(vec!["0.9.0".into(), "1.10.0".into(), "1.2.0".into()])
        );
        assert_eq!(gate.wait(), Decision::Abort);
    }

    #[test]
    fn abort_wins_over_later_decide() {
        let gate = ConsistencyGate::new();
        gate.record("1.0.0");
        gate.abort();
        assert_eq!(gate.decide(), Verdict::Consistent("1.0.0".into()));
        assert_eq!(gate.decision(), Some(Decision::Abort));
    }

    #[test]
    fn every_waiter_sees_the_decision() {
        let gate = ConsistencyGate::new();
        gate.record("2.0.0");
        let seen = thread::scope(|s| {
            let handles: Vec<_> = (0..8).map(|_| s.spawn(|| gate.wait())).collect();
            gate.decide();
            // a late waiter after the broadcast
            let late = s.spawn(|| gate.wait());
            let mut seen: Vec<Decision> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            seen.push(late.join().unwrap());
            seen
        });
        assert_eq!(seen.len(), 9);
        assert!(seen.iter().all(|d| *d == Decision::Proceed));
    }
}
