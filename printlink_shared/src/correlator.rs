//! In-flight request tracking.
//!
//! The correlator owns every pending request of one adapter instance. It does
//! not run a timer: deadlines are data, and the layer that issued a request is
//! responsible for giving up and removing it (see [`RequestCorrelator::expire`]).

use crate::operation::OperationKind;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    /// Correlation id handed back to the caller. Never put on the wire.
    pub standard_id: String,
    /// Id the vendor protocol echoes back (issued or synthesized by the adapter).
    pub vendor_id: String,
    pub kind: OperationKind,
    pub deadline: Instant,
    pub created_at: Instant,
    // Insertion order, breaks ties between equal `created_at` instants.
    seq: u64,
}

impl PendingRequest {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    fn age_key(&self) -> (Instant, u64) {
        (self.created_at, self.seq)
    }
}

#[derive(Debug, Default)]
pub struct RequestCorrelator {
    pending: HashMap<String, PendingRequest>,
    next_seq: u64,
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a pending request. An existing entry with the same vendor id is
    /// replaced and returned.
    pub fn record(
        &mut self,
        standard_id: impl Into<String>,
        vendor_id: impl Into<String>,
        kind: OperationKind,
        timeout: Duration,
    ) -> Option<PendingRequest> {
        self.record_at(standard_id, vendor_id, kind, timeout, Instant::now())
    }

    pub fn record_at(
        &mut self,
        standard_id: impl Into<String>,
        vendor_id: impl Into<String>,
        kind: OperationKind,
        timeout: Duration,
        now: Instant,
    ) -> Option<PendingRequest> {
        let vendor_id = vendor_id.into();
        let seq = self.next_seq;
        self.next_seq += 1;
        let request = PendingRequest {
            standard_id: standard_id.into(),
            vendor_id: vendor_id.clone(),
            kind,
            deadline: now + timeout,
            created_at: now,
            seq,
        };
        let replaced = self.pending.insert(vendor_id, request);
        if let Some(old) = &replaced {
            tracing::debug!(
                "Vendor id {} reused, dropping pending {} ({})",
                old.vendor_id, old.standard_id, old.kind
            );
        }
        replaced
    }

    pub fn find_by_vendor_id(&self, vendor_id: &str) -> Option<&PendingRequest> {
        self.pending.get(vendor_id)
    }

    pub fn remove(&mut self, vendor_id: &str) -> Option<PendingRequest> {
        self.pending.remove(vendor_id)
    }

    pub fn remove_by_standard_id(&mut self, standard_id: &str) -> Option<PendingRequest> {
        let vendor_id = self
            .pending
            .values()
            .find(|r| r.standard_id == standard_id)
            .map(|r| r.vendor_id.clone())?;
        self.pending.remove(&vendor_id)
    }

    /// The earliest-created pending request of `kind`.
    ///
    /// Used for protocols whose pushes echo no request id. Two concurrent
    /// requests of the same kind are resolved strictly first-in first-out,
    /// whichever logical caller the push was meant for; callers that care must
    /// serialize same-kind requests themselves.
    pub fn find_oldest_by_kind(&self, kind: OperationKind) -> Option<&PendingRequest> {
        self.pending
            .values()
            .filter(|r| r.kind == kind)
            .min_by_key(|r| r.age_key())
    }

    pub fn remove_oldest_by_kind(&mut self, kind: OperationKind) -> Option<PendingRequest> {
        let vendor_id = self.find_oldest_by_kind(kind)?.vendor_id.clone();
        self.pending.remove(&vendor_id)
    }

    pub fn has_pending_kind(&self, kind: OperationKind) -> bool {
        self.pending.values().any(|r| r.kind == kind)
    }

    /// Remove and return every request whose deadline has passed.
    pub fn expire(&mut self, now: Instant) -> Vec<PendingRequest> {
        let expired: Vec<String> = self
            .pending
            .values()
            .filter(|r| r.is_expired(now))
            .map(|r| r.vendor_id.clone())
            .collect();
        let mut out: Vec<PendingRequest> = expired
            .iter()
            .filter_map(|id| self.pending.remove(id))
            .collect();
        out.sort_by_key(|r| r.age_key());
        out
    }

    /// Remove everything, oldest first. Used on disconnect.
    pub fn drain(&mut self) -> Vec<PendingRequest> {
        let mut out: Vec<PendingRequest> = self.pending.drain().map(|(_, r)| r).collect();
        out.sort_by_key(|r| r.age_key());
        out
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_record_find_remove() {
        let mut correlator = RequestCorrelator::new();
        correlator.record("std-1", "42", OperationKind::StartPrint, TIMEOUT);
        let found = correlator.find_by_vendor_id("42").unwrap();
        assert_eq!(found.standard_id, "std-1");
        assert_eq!(found.kind, OperationKind::StartPrint);
        assert!(correlator.remove("42").is_some());
        assert!(correlator.find_by_vendor_id("42").is_none());
        assert!(correlator.is_empty());
    }

    #[test]
    fn test_vendor_id_overwrite_is_last_write_wins() {
        let mut correlator = RequestCorrelator::new();
        correlator.record("std-1", "7", OperationKind::PausePrint, TIMEOUT);
        let replaced = correlator.record("std-2", "7", OperationKind::StopPrint, TIMEOUT);
        assert_eq!(replaced.unwrap().standard_id, "std-1");
        let found = correlator.find_by_vendor_id("7").unwrap();
        assert_eq!(found.standard_id, "std-2");
        assert_eq!(found.kind, OperationKind::StopPrint);
        assert_eq!(correlator.len(), 1);
    }

    #[test]
    fn test_oldest_by_kind_is_fifo() {
        let mut correlator = RequestCorrelator::new();
        let now = Instant::now();
        correlator.record_at("first", "a", OperationKind::GetStatus, TIMEOUT, now);
        correlator.record_at("other", "b", OperationKind::GetAttributes, TIMEOUT, now);
        correlator.record_at("second", "c", OperationKind::GetStatus, TIMEOUT, now);

        let oldest = correlator.find_oldest_by_kind(OperationKind::GetStatus).unwrap();
        assert_eq!(oldest.standard_id, "first");
        correlator.remove("a");
        let oldest = correlator.find_oldest_by_kind(OperationKind::GetStatus).unwrap();
        assert_eq!(oldest.standard_id, "second");
        correlator.remove("c");
        assert!(correlator.find_oldest_by_kind(OperationKind::GetStatus).is_none());
    }

    #[test]
    fn test_oldest_by_kind_prefers_earlier_instant_over_insertion_order() {
        let mut correlator = RequestCorrelator::new();
        let now = Instant::now();
        correlator.record_at("late", "a", OperationKind::GetStatus, TIMEOUT, now + Duration::from_millis(10));
        correlator.record_at("early", "b", OperationKind::GetStatus, TIMEOUT, now);
        let taken = correlator.remove_oldest_by_kind(OperationKind::GetStatus).unwrap();
        assert_eq!(taken.standard_id, "early");
    }

    #[test]
    fn test_expire_only_removes_past_deadline() {
        let mut correlator = RequestCorrelator::new();
        let now = Instant::now();
        correlator.record_at("short", "1", OperationKind::MoveAxis, Duration::from_millis(10), now);
        correlator.record_at("long", "2", OperationKind::MoveAxis, Duration::from_secs(60), now);
        let expired = correlator.expire(now + Duration::from_secs(1));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].standard_id, "short");
        assert!(correlator.find_by_vendor_id("2").is_some());
    }

    #[test]
    fn test_drain_and_remove_by_standard_id() {
        let mut correlator = RequestCorrelator::new();
        correlator.record("s1", "1", OperationKind::HomeAxis, TIMEOUT);
        correlator.record("s2", "2", OperationKind::SetLight, TIMEOUT);
        correlator.record("s3", "3", OperationKind::SetFanSpeed, TIMEOUT);
        assert_eq!(correlator.remove_by_standard_id("s2").unwrap().vendor_id, "2");
        assert!(correlator.remove_by_standard_id("missing").is_none());
        let drained = correlator.drain();
        let ids: Vec<_> = drained.iter().map(|r| r.standard_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s3"]);
        assert!(correlator.is_empty());
    }
}
