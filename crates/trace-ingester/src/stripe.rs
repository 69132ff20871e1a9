use std::time::Instant;

use ahash::AHashMap;
use trace_types::TraceId;

use crate::builder::TraceBuilder;

/// One shard of the trace key space, independently mutex-guarded so
/// unrelated traces never contend (spec.md §4.1 "Concurrency"; §5 "per-
/// stripe mutex; no cross-stripe operations").
#[derive(Default)]
pub struct Stripe {
    pub traces: AHashMap<TraceId, TraceBuilder>,
    pub live_bytes: u64,
}

impl Stripe {
    /// Traces past their idle timeout or max duration, per the thresholds
    /// resolved for each trace at creation time (spec.md §4.1 completion
    /// policy 1-2).
    pub fn due_for_seal(&self, now: Instant) -> Vec<TraceId> {
        self.traces
            .iter()
            .filter(|(_, b)| b.idle_for(now) > b.idle_period || b.age(now) > b.max_duration)
            .map(|(id, _)| *id)
            .collect()
    }

    /// The single oldest-by-`last_append` trace, for soft-limit LRU
    /// eviction (spec.md §4.1 completion policy 3).
    pub fn oldest(&self) -> Option<TraceId> {
        self.traces.iter().min_by_key(|(_, b)| b.last_append).map(|(id, _)| *id)
    }

    pub fn remove(&mut self, id: &TraceId) -> Option<TraceBuilder> {
        let removed = self.traces.remove(id);
        if let Some(b) = &removed {
            self.live_bytes = self.live_bytes.saturating_sub(b.bytes as u64);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn builder(id: u8, now: Instant) -> TraceBuilder {
        TraceBuilder::new("tenant-a".into(), TraceId([id; 16]), Duration::from_secs(10), Duration::from_secs(3600), now)
    }

    #[test]
    fn due_for_seal_honors_idle_and_duration() {
        let mut stripe = Stripe::default();
        let t0 = Instant::now();
        stripe.traces.insert(TraceId([1; 16]), builder(1, t0));

        let later = t0 + Duration::from_secs(20);
        let due = stripe.due_for_seal(later);
        assert_eq!(due, vec![TraceId([1; 16])]);
    }

    #[test]
    fn oldest_picks_min_last_append() {
        let mut stripe = Stripe::default();
        let t0 = Instant::now();
        stripe.traces.insert(TraceId([1; 16]), builder(1, t0));
        stripe.traces.insert(TraceId([2; 16]), builder(2, t0 + Duration::from_secs(5)));
        assert_eq!(stripe.oldest(), Some(TraceId([1; 16])));
    }
}
