//! Per-measurement fault state machines.
//!
//! Each (pod, measurement) pair moves between three states:
//!
//! ```text
//!            Warning                    Critical
//!   Clear ───────────► WarningOpen ◄──────────────► CriticalOpen
//!     ▲                    │        Warning / Critical    │
//!     └────────────────────┴──────────────────────────────┘
//!                             None (Cleared)
//! ```
//!
//! A transition emits at most one [`FaultEvent`]; staying in the same state
//! emits nothing. Transitions for one key are serialized by that key's mutex,
//! distinct keys never contend.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use podwatch_types::{BreachLevel, FaultEvent, FaultLevel, Measurement, Reading};

/// Identifies one fault slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaultKey {
    pub pod_id: String,
    pub key: String,
}

impl FaultKey {
    pub fn new(pod_id: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            pod_id: pod_id.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for FaultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pod_id, self.key)
    }
}

/// Current state of a fault slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultState {
    #[default]
    Clear,
    WarningOpen,
    CriticalOpen,
}

impl FaultState {
    /// The level of the open fault, if any.
    pub fn open_level(&self) -> Option<FaultLevel> {
        match self {
            FaultState::Clear => None,
            FaultState::WarningOpen => Some(FaultLevel::Warning),
            FaultState::CriticalOpen => Some(FaultLevel::Critical),
        }
    }

    fn from_breach(breach: BreachLevel) -> Self {
        match breach {
            BreachLevel::None => FaultState::Clear,
            BreachLevel::Warning => FaultState::WarningOpen,
            BreachLevel::Critical => FaultState::CriticalOpen,
        }
    }
}

#[derive(Debug, Default)]
struct Slot {
    state: FaultState,
    last_reading: Option<Reading>,
}

/// Shared table of fault state machines.
#[derive(Debug, Default)]
pub struct FaultTracker {
    slots: RwLock<HashMap<FaultKey, Arc<Mutex<Slot>>>>,
}

impl FaultTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &FaultKey) -> Arc<Mutex<Slot>> {
        // Fast path: slot already exists
        {
            let slots = self.slots.read();
            if let Some(slot) = slots.get(key) {
                return slot.clone();
            }
        }

        let mut slots = self.slots.write();
        slots
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(Slot::default())))
            .clone()
    }

    /// Apply a breach decision for `reading` and return the resulting event.
    pub fn track(
        &self,
        measurement: &Measurement,
        reading: &Reading,
        breach: BreachLevel,
    ) -> Option<FaultEvent> {
        let key = FaultKey::new(reading.pod_id.as_str(), reading.key.as_str());

        // A clear reading for a key never seen needs no slot.
        if breach == BreachLevel::None && !self.slots.read().contains_key(&key) {
            return None;
        }

        let slot = self.slot(&key);
        let mut slot = slot.lock();
        let previous = slot.state.open_level();
        let next = FaultState::from_breach(breach);
        slot.state = next;
        slot.last_reading = Some(reading.clone());

        let measurement = measurement.clone();
        let reading = reading.clone();
        match (previous, next.open_level()) {
            (None, None) => None,
            (None, Some(level)) => Some(FaultEvent::opened(level, measurement, reading)),
            (Some(from), Some(to)) if from == to => None,
            (Some(from), Some(to)) => Some(FaultEvent::changed(from, to, measurement, reading)),
            (Some(level), None) => Some(FaultEvent::cleared(level, measurement, reading)),
        }
    }

    /// The current state for a key. Unknown keys are clear.
    pub fn state(&self, pod_id: &str, key: &str) -> FaultState {
        self.slots
            .read()
            .get(&FaultKey::new(pod_id, key))
            .map(|slot| slot.lock().state)
            .unwrap_or_default()
    }

    /// The last reading applied to a key.
    pub fn last_reading(&self, pod_id: &str, key: &str) -> Option<Reading> {
        self.slots
            .read()
            .get(&FaultKey::new(pod_id, key))
            .and_then(|slot| slot.lock().last_reading.clone())
    }

    /// All currently open faults, ordered by key.
    pub fn open_faults(&self) -> Vec<(FaultKey, FaultLevel)> {
        let mut open: Vec<_> = self
            .slots
            .read()
            .iter()
            .filter_map(|(key, slot)| slot.lock().state.open_level().map(|l| (key.clone(), l)))
            .collect();
        open.sort_by(|a, b| a.0.cmp(&b.0));
        open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::evaluate;
    use podwatch_types::{FaultEventKind, Limits, Nanoseconds, Range};

    fn velocity() -> Measurement {
        Measurement::builder("velocity")
            .limits(Limits::new(Range::new(0.0, 100.0)).with_warning(Range::new(10.0, 90.0)))
            .build()
    }

    fn feed(tracker: &FaultTracker, m: &Measurement, values: &[f64]) -> Vec<FaultEvent> {
        values
            .iter()
            .enumerate()
            .filter_map(|(i, &v)| {
                let reading = Reading::measurement("pod_1", "velocity", v, Nanoseconds(i as u64));
                tracker.track(m, &reading, evaluate(m, v))
            })
            .collect()
    }

    #[test]
    fn warning_then_critical_then_clear() {
        let tracker = FaultTracker::new();
        let m = velocity();

        let events = feed(&tracker, &m, &[50.0, 95.0, 150.0, 50.0]);
        assert_eq!(events.len(), 3);

        assert_eq!(events[0].kind, FaultEventKind::Opened);
        assert_eq!(events[0].level, FaultLevel::Warning);
        assert_eq!(events[0].previous, None);
        assert_eq!(events[0].trip_reading.value, 95.0);

        assert_eq!(events[1].kind, FaultEventKind::Opened);
        assert_eq!(events[1].level, FaultLevel::Critical);
        assert_eq!(events[1].previous, Some(FaultLevel::Warning));

        assert_eq!(events[2].kind, FaultEventKind::Cleared);
        assert_eq!(events[2].level, FaultLevel::Critical);

        assert_eq!(tracker.state("pod_1", "velocity"), FaultState::Clear);
    }

    #[test]
    fn repeated_level_emits_nothing() {
        let tracker = FaultTracker::new();
        let m = velocity();

        let events = feed(&tracker, &m, &[95.0, 96.0, 97.0, 150.0, 160.0]);
        assert_eq!(events.len(), 2);
        assert_eq!(tracker.state("pod_1", "velocity"), FaultState::CriticalOpen);
        assert_eq!(tracker.last_reading("pod_1", "velocity").unwrap().value, 160.0);
    }

    #[test]
    fn critical_to_warning_is_one_event() {
        let tracker = FaultTracker::new();
        let m = velocity();

        let events = feed(&tracker, &m, &[150.0, 95.0]);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, FaultEventKind::Opened);
        assert_eq!(events[1].level, FaultLevel::Warning);
        assert_eq!(events[1].previous, Some(FaultLevel::Critical));
        assert!(!events[1].is_escalation());
    }

    #[test]
    fn clear_readings_on_fresh_key_emit_nothing() {
        let tracker = FaultTracker::new();
        let m = velocity();
        assert!(feed(&tracker, &m, &[50.0, 50.0, 50.0]).is_empty());
        assert!(tracker.open_faults().is_empty());
    }

    #[test]
    fn identical_reading_is_idempotent() {
        let tracker = FaultTracker::new();
        let m = velocity();
        let reading = Reading::measurement("pod_1", "velocity", 95.0, Nanoseconds(1));

        assert!(tracker.track(&m, &reading, BreachLevel::Warning).is_some());
        for _ in 0..10 {
            assert!(tracker.track(&m, &reading, BreachLevel::Warning).is_none());
        }
    }

    #[test]
    fn keys_are_independent() {
        let tracker = FaultTracker::new();
        let m = velocity();

        let a = Reading::measurement("pod_1", "velocity", 150.0, Nanoseconds(1));
        let b = Reading::measurement("pod_2", "velocity", 95.0, Nanoseconds(1));
        assert!(tracker.track(&m, &a, BreachLevel::Critical).is_some());
        assert!(tracker.track(&m, &b, BreachLevel::Warning).is_some());

        assert_eq!(
            tracker.open_faults(),
            vec![
                (FaultKey::new("pod_1", "velocity"), FaultLevel::Critical),
                (FaultKey::new("pod_2", "velocity"), FaultLevel::Warning),
            ]
        );
    }

    #[test]
    fn concurrent_breaches_open_once() {
        let tracker = Arc::new(FaultTracker::new());
        let m = velocity();

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let tracker = tracker.clone();
                let m = m.clone();
                std::thread::spawn(move || {
                    let reading =
                        Reading::measurement("pod_1", "velocity", 150.0 + i as f64, Nanoseconds(i));
                    tracker.track(&m, &reading, BreachLevel::Critical)
                })
            })
            .collect();

        let opened = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .count();
        assert_eq!(opened, 1);
    }
}
