use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::time::interval;
use crate::metrics::RATE_LIMIT_KEYS;

// Rate limit entry - tracks admissions per action + caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    pub count: u32,
    pub window_reset_at: u64, // ms since unix epoch
}

/// Outcome of one admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub admitted: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_at: u64,
}

impl Decision {
    // Whole seconds until the window closes, never below one
    pub fn retry_after_secs(&self, now: u64) -> u64 {
        self.reset_at.saturating_sub(now).div_ceil(1000).max(1)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuotaError {
    #[error("rate limit for {key} must be positive")]
    ZeroLimit { key: String },
    #[error("rate window for {key} must be at least 1ms")]
    ZeroWindow { key: String },
}

// Source of wall-clock time for the gate
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        chrono::Utc::now().timestamp_millis().max(0) as u64
    }
}

/// Hand-driven clock for tests. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start)),
        }
    }

    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

// Per-action quota, kept as policy data outside the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub action: &'static str,
    pub limit: u32,
    pub window: Duration,
}

impl Quota {
    pub const fn new(action: &'static str, limit: u32, window_secs: u64) -> Self {
        Self {
            action,
            limit,
            window: Duration::from_secs(window_secs),
        }
    }

    pub fn key(&self, identity: &str) -> String {
        format!("{}:{}", self.action, identity)
    }
}

pub const DISCOGS_LOOKUP: Quota = Quota::new("discogs-lookup", 10, 60);
pub const CREATE_RECORD: Quota = Quota::new("create-record", 5, 60);
pub const FETCH_RECORDS: Quota = Quota::new("fetch-records", 30, 60);
pub const EXTRACT_RECORD: Quota = Quota::new("extract-record", 3, 300);
// updates and deletes share one bucket
pub const MODIFY_RECORD: Quota = Quota::new("modify-record", 10, 60);

/// Fixed-window admission gate.
///
/// Each key admits up to `limit` requests per window; the window opens on the
/// first request and resets sharply once `window_reset_at` is reached. Entries
/// live in a `DashMap`, so the check-and-increment for one key runs under that
/// key's shard lock and concurrent callers cannot both take the last slot.
pub struct AdmissionGate {
    entries: DashMap<String, RateLimitEntry>,
    clock: Arc<dyn Clock>,
}

impl Default for AdmissionGate {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl AdmissionGate {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    pub fn check(&self, quota: &Quota, identity: &str) -> Result<Decision, QuotaError> {
        self.check_and_consume(&quota.key(identity), quota.limit, quota.window)
    }

    pub fn check_and_consume(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> Result<Decision, QuotaError> {
        if limit == 0 {
            return Err(QuotaError::ZeroLimit { key: key.to_string() });
        }
        let window_ms = window.as_millis() as u64;
        if window_ms == 0 {
            return Err(QuotaError::ZeroWindow { key: key.to_string() });
        }

        let now = self.clock.now_millis();
        let fresh = RateLimitEntry {
            count: 1,
            window_reset_at: now.saturating_add(window_ms),
        };

        // the entry guard holds the shard lock until it drops
        let mut entry = self.entries.entry(key.to_string()).or_insert(RateLimitEntry {
            count: 0,
            window_reset_at: 0,
        });

        // new key or expired window? open a fresh one
        if now >= entry.window_reset_at {
            *entry = fresh;
            return Ok(Decision {
                admitted: true,
                limit,
                remaining: limit - 1,
                reset_at: fresh.window_reset_at,
            });
        }

        // under limit? allow
        if entry.count < limit {
            entry.count += 1;
            return Ok(Decision {
                admitted: true,
                limit,
                remaining: limit - entry.count,
                reset_at: entry.window_reset_at,
            });
        }

        // over limit
        Ok(Decision {
            admitted: false,
            limit,
            remaining: 0,
            reset_at: entry.window_reset_at,
        })
    }

    // Drop entries whose window already closed; returns how many went
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.entries.len();
        self.entries.retain(|_, entry| now < entry.window_reset_at);
        before.saturating_sub(self.entries.len())
    }

    pub fn tracked_keys(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    fn entry(&self, key: &str) -> Option<RateLimitEntry> {
        self.entries.get(key).map(|e| *e)
    }
}

// Background sweep - drops closed windows so idle callers do not pile up
pub async fn sweeper(gate: Arc<AdmissionGate>, every: Duration) {
    let mut interval = interval(every);

    tracing::info!(interval = ?every, "rate limit sweeper started");

    loop {
        interval.tick().await;

        let removed = gate.sweep();
        RATE_LIMIT_KEYS.set(gate.tracked_keys() as f64);
        if removed > 0 {
            tracing::debug!(removed, remaining = gate.tracked_keys(), "swept rate limit windows");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn gate_at(start: u64) -> (AdmissionGate, ManualClock) {
        let clock = ManualClock::new(start);
        (AdmissionGate::new(Arc::new(clock.clone())), clock)
    }

    const MINUTE: Duration = Duration::from_secs(60);

    #[test]
    fn admits_a_burst_then_denies() {
        let (gate, _clock) = gate_at(1_000);
        let limit = 4;
        for expected in (0..limit).rev() {
            let d = gate.check_and_consume("a:1.2.3.4", limit, MINUTE).unwrap();
            assert!(d.admitted);
            assert_eq!(d.remaining, expected);
        }
        let denied = gate.check_and_consume("a:1.2.3.4", limit, MINUTE).unwrap();
        assert!(!denied.admitted);
        assert_eq!(denied.remaining, 0);
        assert_eq!(denied.reset_at, 61_000);
    }

    #[test]
    fn window_resets_at_boundary() {
        let (gate, clock) = gate_at(0);
        for _ in 0..3 {
            gate.check_and_consume("k", 2, MINUTE).unwrap();
        }
        // just before the boundary the window is still closed
        clock.set(59_999);
        assert!(!gate.check_and_consume("k", 2, MINUTE).unwrap().admitted);

        clock.set(60_000);
        let d = gate.check_and_consume("k", 2, MINUTE).unwrap();
        assert!(d.admitted);
        assert_eq!(d.remaining, 1);
        assert_eq!(d.reset_at, 120_000);
    }

    #[test]
    fn denial_leaves_entry_untouched() {
        let (gate, clock) = gate_at(0);
        gate.check_and_consume("k", 1, MINUTE).unwrap();
        clock.set(30_000);
        for _ in 0..5 {
            let d = gate.check_and_consume("k", 1, MINUTE).unwrap();
            assert_eq!(d.reset_at, 60_000);
        }
        assert_eq!(
            gate.entry("k"),
            Some(RateLimitEntry {
                count: 1,
                window_reset_at: 60_000
            })
        );
    }

    #[test]
    fn keys_are_isolated() {
        let (gate, _clock) = gate_at(0);
        assert!(gate.check_and_consume("a:1.2.3.4", 1, MINUTE).unwrap().admitted);
        assert!(!gate.check_and_consume("a:1.2.3.4", 1, MINUTE).unwrap().admitted);

        assert!(gate.check_and_consume("b:1.2.3.4", 1, MINUTE).unwrap().admitted);
        assert!(gate.check_and_consume("a:5.6.7.8", 1, MINUTE).unwrap().admitted);
    }

    #[test]
    fn scenario_five_per_minute() {
        let (gate, clock) = gate_at(0);
        let window = Duration::from_millis(60_000);
        for (t, remaining) in [(0, 4), (1, 3), (2, 2), (3, 1), (4, 0)] {
            clock.set(t);
            let d = gate.check_and_consume("create-record:ip", 5, window).unwrap();
            assert!(d.admitted);
            assert_eq!(d.remaining, remaining);
        }
        clock.set(5);
        let denied = gate.check_and_consume("create-record:ip", 5, window).unwrap();
        assert!(!denied.admitted);
        assert_eq!(denied.reset_at, 60_000);

        clock.set(60_001);
        let d = gate.check_and_consume("create-record:ip", 5, window).unwrap();
        assert!(d.admitted);
        assert_eq!(d.remaining, 4);
    }

    #[test]
    fn rejects_zero_limit_and_window() {
        let (gate, _clock) = gate_at(0);
        assert!(matches!(
            gate.check_and_consume("k", 0, MINUTE),
            Err(QuotaError::ZeroLimit { .. })
        ));
        assert!(matches!(
            gate.check_and_consume("k", 1, Duration::ZERO),
            Err(QuotaError::ZeroWindow { .. })
        ));
        assert_eq!(gate.tracked_keys(), 0);
    }

    #[test]
    fn concurrent_callers_never_exceed_limit() {
        let gate = Arc::new(AdmissionGate::default());
        let limit = 16;
        let handles: Vec<_> = (0..limit * 2)
            .map(|_| {
                let gate = Arc::clone(&gate);
                thread::spawn(move || gate.check_and_consume("hot", limit, MINUTE).unwrap().admitted)
            })
            .collect();
        let admitted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|admitted| *admitted)
            .count();
        assert_eq!(admitted, limit as usize);
    }

    #[test]
    fn sweep_removes_only_expired_windows() {
        let (gate, clock) = gate_at(0);
        gate.check_and_consume("short", 1, Duration::from_secs(1)).unwrap();
        gate.check_and_consume("long", 1, MINUTE).unwrap();

        clock.set(1_000);
        assert_eq!(gate.sweep(), 1);
        assert_eq!(gate.tracked_keys(), 1);
        assert!(gate.entry("long").is_some());

        // a swept key starts over like a fresh one
        let d = gate.check_and_consume("short", 1, Duration::from_secs(1)).unwrap();
        assert!(d.admitted);
        assert_eq!(d.reset_at, 2_000);
    }

    #[test]
    fn quota_builds_composite_key() {
        assert_eq!(EXTRACT_RECORD.key("203.0.113.4"), "extract-record:203.0.113.4");
        assert_eq!(EXTRACT_RECORD.limit, 3);
        assert_eq!(EXTRACT_RECORD.window, Duration::from_secs(300));
        assert_eq!(DISCOGS_LOOKUP.limit, 10);
        assert_eq!(CREATE_RECORD.limit, 5);
        assert_eq!(FETCH_RECORDS.limit, 30);
    }

    #[test]
    fn retry_after_rounds_up() {
        let d = Decision {
            admitted: false,
            limit: 1,
            remaining: 0,
            reset_at: 10_500,
        };
        assert_eq!(d.retry_after_secs(9_000), 2);
        assert_eq!(d.retry_after_secs(10_500), 1);
        assert_eq!(d.retry_after_secs(20_000), 1);
    }
}
