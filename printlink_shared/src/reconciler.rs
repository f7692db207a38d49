//! Status snapshot reconstruction from full snapshots and partial pushes.
//!
//! One reconciler lives inside each adapter. A full snapshot always replaces
//! the cache; a delta can only be merged once a full snapshot has been seen.
//! For vendors with a monotonically increasing push id, gaps are counted and a
//! run of [`DEFAULT_RESYNC_THRESHOLD`] anomalies asks the adapter to resync.

use serde_json::Value;

pub const DEFAULT_RESYNC_THRESHOLD: u32 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub cached: Value,
    pub has_cache: bool,
    pub last_sequence_id: Option<i64>,
    pub anomaly_run: u32,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            cached: Value::Null,
            has_cache: false,
            last_sequence_id: None,
            anomaly_run: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeltaOutcome {
    /// Merged and continuous; carries the new cached value.
    Merged(Value),
    /// Merged into the cache, but out of sequence and not to be emitted.
    Withheld,
    /// No full snapshot to merge onto.
    DroppedNoCache,
    /// The anomaly run reached the threshold. Request a full snapshot.
    Resync,
}

#[derive(Debug)]
pub struct StatusReconciler {
    snapshot: StatusSnapshot,
    threshold: u32,
}

impl Default for StatusReconciler {
    fn default() -> Self {
        Self::new(DEFAULT_RESYNC_THRESHOLD)
    }
}

impl StatusReconciler {
    pub fn new(threshold: u32) -> Self {
        Self {
            snapshot: StatusSnapshot::default(),
            threshold: threshold.max(1),
        }
    }

    pub fn snapshot(&self) -> &StatusSnapshot {
        &self.snapshot
    }

    pub fn has_cache(&self) -> bool {
        self.snapshot.has_cache
    }

    pub fn cached(&self) -> Option<&Value> {
        self.snapshot.has_cache.then_some(&self.snapshot.cached)
    }

    /// Replace the cache wholesale and reset the anomaly run.
    pub fn apply_full(&mut self, full: Value, sequence_id: Option<i64>) -> &Value {
        self.snapshot.cached = full;
        self.snapshot.has_cache = true;
        self.snapshot.anomaly_run = 0;
        if sequence_id.is_some() {
            self.snapshot.last_sequence_id = sequence_id;
        }
        &self.snapshot.cached
    }

    pub fn apply_delta(&mut self, delta: &Value, sequence_id: Option<i64>) -> DeltaOutcome {
        if !self.snapshot.has_cache {
            tracing::debug!("Dropping status delta, no full snapshot cached yet");
            return DeltaOutcome::DroppedNoCache;
        }

        let continuous = match sequence_id {
            Some(id) => {
                let continuous = is_continuous(self.snapshot.last_sequence_id, id);
                self.snapshot.last_sequence_id = Some(id);
                continuous
            }
            None => true,
        };

        merge_json(&mut self.snapshot.cached, delta);

        if continuous {
            self.snapshot.anomaly_run = 0;
            return DeltaOutcome::Merged(self.snapshot.cached.clone());
        }

        self.snapshot.anomaly_run += 1;
        tracing::warn!(
            "Out-of-sequence status push {:?} (anomaly run {}/{})",
            sequence_id, self.snapshot.anomaly_run, self.threshold
        );
        if self.snapshot.anomaly_run >= self.threshold {
            self.snapshot.anomaly_run = 0;
            DeltaOutcome::Resync
        } else {
            DeltaOutcome::Withheld
        }
    }

    /// Merge result without committing it. `None` without a cache, or when
    /// `sequence_id` would break the sequence (such a delta is never emitted).
    pub fn preview(&self, delta: &Value, sequence_id: Option<i64>) -> Option<Value> {
        if sequence_id.is_some_and(|id| !is_continuous(self.snapshot.last_sequence_id, id)) {
            return None;
        }
        let mut merged = self.cached()?.clone();
        merge_json(&mut merged, delta);
        Some(merged)
    }

    pub fn clear(&mut self) {
        self.snapshot = StatusSnapshot::default();
    }
}

/// A push id continues the sequence when it follows the last one, or is 0 (restart).
pub fn is_continuous(last: Option<i64>, id: i64) -> bool {
    if id == 0 {
        return true;
    }
    match last {
        Some(last) => last.checked_add(1) == Some(id),
        None => true,
    }
}

/// Recursively merge `delta` onto `target`.
///
/// Objects merge key by key; any other value, arrays included, is replaced.
pub fn merge_json(target: &mut Value, delta: &Value) {
    match (target, delta) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                let nested = value.is_object() && base.get(key).is_some_and(Value::is_object);
                if nested {
                    if let Some(existing) = base.get_mut(key) {
                        merge_json(existing, value);
                    }
                } else {
                    base.insert(key.clone(), value.clone());
                }
            }
        }
        (target, delta) => *target = delta.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_keeps_siblings() {
        let mut base = json!({"a": {"x": 1, "y": 2}, "b": 5});
        merge_json(&mut base, &json!({"a": {"x": 9}}));
        assert_eq!(base, json!({"a": {"x": 9, "y": 2}, "b": 5}));
    }

    #[test]
    fn test_merge_replaces_arrays_and_scalars() {
        let mut base = json!({"list": [1, 2, 3], "obj": {"k": 1}, "n": 1});
        merge_json(&mut base, &json!({"list": [4], "obj": 7, "new": {"z": true}}));
        assert_eq!(base, json!({"list": [4], "obj": 7, "n": 1, "new": {"z": true}}));
    }

    #[test]
    fn test_delta_without_cache_is_dropped() {
        let mut reconciler = StatusReconciler::default();
        assert_eq!(reconciler.apply_delta(&json!({"a": 1}), Some(1)), DeltaOutcome::DroppedNoCache);
        assert!(!reconciler.has_cache());
        assert_eq!(reconciler.snapshot().last_sequence_id, None);
    }

    #[test]
    fn test_full_snapshot_resets_state() {
        let mut reconciler = StatusReconciler::default();
        reconciler.apply_full(json!({"a": 1}), Some(10));
        reconciler.apply_delta(&json!({"a": 2}), Some(15));
        assert_eq!(reconciler.snapshot().anomaly_run, 1);
        reconciler.apply_full(json!({"b": 1}), None);
        assert_eq!(reconciler.snapshot().anomaly_run, 0);
        assert_eq!(reconciler.cached(), Some(&json!({"b": 1})));
        assert_eq!(reconciler.snapshot().last_sequence_id, Some(15));
    }

    #[test]
    fn test_gap_run_triggers_single_resync() {
        let mut reconciler = StatusReconciler::default();
        reconciler.apply_full(json!({"p": 0}), None);
        let mut merged = 0;
        let mut withheld = 0;
        let mut resyncs = 0;
        for id in [0, 1, 2, 4, 6, 8, 10, 12] {
            match reconciler.apply_delta(&json!({"p": id}), Some(id)) {
                DeltaOutcome::Merged(_) => merged += 1,
                DeltaOutcome::Withheld => withheld += 1,
                DeltaOutcome::Resync => resyncs += 1,
                DeltaOutcome::DroppedNoCache => unreachable!(),
            }
        }
        assert_eq!(merged, 3);
        assert_eq!(withheld, 4);
        assert_eq!(resyncs, 1);
        assert_eq!(reconciler.snapshot().anomaly_run, 0);
    }

    #[test]
    fn test_zero_is_a_restart_marker() {
        assert!(is_continuous(Some(41), 42));
        assert!(is_continuous(Some(41), 0));
        assert!(!is_continuous(Some(41), 43));
        assert!(is_continuous(None, 17));
    }

    #[test]
    fn test_preview_does_not_commit() {
        let mut reconciler = StatusReconciler::default();
        assert!(reconciler.preview(&json!({"a": 1}), None).is_none());
        reconciler.apply_full(json!({"a": 1, "b": 2}), None);
        let preview = reconciler.preview(&json!({"a": 3}), None).unwrap();
        assert_eq!(preview, json!({"a": 3, "b": 2}));
        assert_eq!(reconciler.cached(), Some(&json!({"a": 1, "b": 2})));
    }

    #[test]
    fn test_preview_refuses_out_of_sequence_delta() {
        let mut reconciler = StatusReconciler::default();
        reconciler.apply_full(json!({"a": 1}), Some(4));
        assert!(reconciler.preview(&json!({"a": 2}), Some(7)).is_none());
        assert_eq!(reconciler.preview(&json!({"a": 2}), Some(5)), Some(json!({"a": 2})));
        assert_eq!(reconciler.preview(&json!({"a": 2}), Some(0)), Some(json!({"a": 2})));
    }

    #[test]
    fn test_clear_returns_to_no_cache() {
        let mut reconciler = StatusReconciler::default();
        reconciler.apply_full(json!({"a": 1}), Some(3));
        reconciler.clear();
        assert_eq!(reconciler.snapshot(), &StatusSnapshot::default());
    }
}
