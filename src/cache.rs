use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::time::{Duration, interval};
use tracing::{debug, info};

use crate::metrics::CACHE_SIZE;
use crate::models::PredictionRequest;

pub const KEY_NAMESPACE: &str = "prediction";

// Source of wall-clock time for expiry checks
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

// Durations past i64 milliseconds clamp instead of wrapping
fn millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

// Clock that only moves when told to
#[derive(Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_millis: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
        }
    }

    pub fn advance(&self, by: Duration) {
        let by = millis(by);
        // closure always returns Some
        let _ = self
            .now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| Some(now.saturating_add(by)));
    }

    pub fn set(&self, millis: i64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

// Cache entry with absolute expiry
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheEntry<V> {
    pub value: V,
    #[serde(rename = "expiry")]
    pub expires_at_millis: i64,
}

impl<V> CacheEntry<V> {
    pub fn is_live(&self, now_millis: i64) -> bool {
        now_millis < self.expires_at_millis
    }
}

/// Key/value store with per-entry expiry. Misses, expired entries and
/// anything unreadable all come back as `None`.
pub trait CacheStore<V>: Send + Sync {
    fn get(&self, key: &str) -> Option<V>;
    fn set(&self, key: &str, value: V, ttl: Duration);
    fn invalidate(&self, key: &str);
    fn invalidate_prefix(&self, prefix: &str);
    fn len(&self) -> usize;
}

pub struct MemoryCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> MemoryCache<V> {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    // Drop every expired entry, returns how many went
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now_millis();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.is_live(now));
        let removed = before.saturating_sub(self.entries.len());
        CACHE_SIZE.set(self.entries.len() as f64);
        removed
    }
}

impl<V: Clone + Send + Sync> CacheStore<V> for MemoryCache<V> {
    fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now_millis();
        match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => return Some(entry.value.clone()),
            Some(_) => {}
            None => return None,
        }
        // Lazy eviction; recheck so a concurrent fresh `set` is not dropped
        self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        CACHE_SIZE.set(self.entries.len() as f64);
        None
    }

    fn set(&self, key: &str, value: V, ttl: Duration) {
        let expires_at_millis = self
            .clock
            .now_millis()
            .saturating_add(millis(ttl));
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at_millis,
            },
        );
        CACHE_SIZE.set(self.entries.len() as f64);
    }

    fn invalidate(&self, key: &str) {
        self.entries.remove(key);
        CACHE_SIZE.set(self.entries.len() as f64);
    }

    fn invalidate_prefix(&self, prefix: &str) {
        self.entries.retain(|key, _| !key.starts_with(prefix));
        CACHE_SIZE.set(self.entries.len() as f64);
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

// Sort object keys recursively so logically equal params hash equally
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let body: Vec<String> = keys
                .into_iter()
                .map(|k| {
                    format!(
                        "{}:{}",
                        Value::String(k.clone()),
                        canonical_json(&map[k.as_str()])
                    )
                })
                .collect();
            format!("{{{}}}", body.join(","))
        }
        Value::Array(items) => {
            let body: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", body.join(","))
        }
        other => other.to_string(),
    }
}

// Create a cache key (namespace + kind + hash of kind and canonical params)
pub fn make_cache_key(req: &PredictionRequest) -> String {
    let kind = req.kind();
    let mut hasher = Sha256::new();
    hasher.update(kind.tag());
    hasher.update(b"\0");
    hasher.update(canonical_json(&req.params()));
    format!("{}:{}:{:x}", KEY_NAMESPACE, kind.tag(), hasher.finalize())
}

// Prefix that covers every cached result of one kind
pub fn kind_prefix(kind: crate::models::RequestKind) -> String {
    format!("{}:{}:", KEY_NAMESPACE, kind.tag())
}

// Periodic sweep so entries nobody reads again do not pile up
pub async fn expiry_sweeper<V: Clone + Send + Sync>(cache: Arc<MemoryCache<V>>, every: Duration) {
    let mut interval = interval(every);

    info!(interval = ?every, "cache sweeper started");

    loop {
        interval.tick().await;
        let removed = cache.purge_expired();
        if removed > 0 {
            debug!(removed, remaining = cache.len(), "purged expired cache entries");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SentimentScope, Timeframe};
    use serde_json::json;

    fn cache_at(start: i64) -> (Arc<ManualClock>, MemoryCache<String>) {
        let clock = Arc::new(ManualClock::new(start));
        let cache = MemoryCache::new(clock.clone() as Arc<dyn Clock>);
        (clock, cache)
    }

    #[test]
    fn entry_visible_until_ttl_boundary() {
        let (clock, cache) = cache_at(1_000_000);
        cache.set("k", "v".to_string(), Duration::from_secs(60));

        clock.advance(Duration::from_millis(59_999));
        assert_eq!(cache.get("k").as_deref(), Some("v"));

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn expired_entry_is_evicted_on_read() {
        let (clock, cache) = cache_at(0);
        cache.set("k", "v".to_string(), Duration::from_secs(1));
        assert_eq!(cache.len(), 1);

        clock.advance(Duration::from_secs(2));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn set_overwrites_value_and_expiry() {
        let (clock, cache) = cache_at(0);
        cache.set("k", "old".to_string(), Duration::from_secs(1));
        cache.set("k", "new".to_string(), Duration::from_secs(10));

        clock.advance(Duration::from_secs(5));
        assert_eq!(cache.get("k").as_deref(), Some("new"));
    }

    #[test]
    fn invalidate_and_prefix_invalidation() {
        let (_clock, cache) = cache_at(0);
        cache.set("prediction:a:1", "1".to_string(), Duration::from_secs(10));
        cache.set("prediction:a:2", "2".to_string(), Duration::from_secs(10));
        cache.set("prediction:b:1", "3".to_string(), Duration::from_secs(10));

        cache.invalidate("prediction:a:1");
        assert_eq!(cache.get("prediction:a:1"), None);
        assert_eq!(cache.len(), 2);

        cache.invalidate_prefix("prediction:a:");
        assert_eq!(cache.get("prediction:a:2"), None);
        assert_eq!(cache.get("prediction:b:1").as_deref(), Some("3"));
    }

    #[test]
    fn purge_drops_only_expired() {
        let (clock, cache) = cache_at(0);
        cache.set("short", "s".to_string(), Duration::from_secs(1));
        cache.set("long", "l".to_string(), Duration::from_secs(100));
        clock.advance(Duration::from_secs(5));

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.get("long").as_deref(), Some("l"));
    }

    #[test]
    fn huge_ttl_saturates_instead_of_wrapping() {
        let (clock, cache) = cache_at(1_700_000_000_000);
        cache.set("forever", "f".to_string(), Duration::MAX);
        cache.set("u64", "u".to_string(), Duration::from_millis(u64::MAX));

        clock.advance(Duration::from_secs(100 * 365 * 24 * 60 * 60));
        assert_eq!(cache.get("forever").as_deref(), Some("f"));
        assert_eq!(cache.get("u64").as_deref(), Some("u"));

        clock.advance(Duration::MAX);
        assert_eq!(clock.now_millis(), i64::MAX);
    }

    #[test]
    fn concurrent_writers_on_distinct_keys_keep_their_own_values() {
        const THREADS: usize = 8;
        const KEYS: usize = 200;
        let (_clock, cache) = cache_at(0);

        std::thread::scope(|scope| {
            for t in 0..THREADS {
                let cache = &cache;
                scope.spawn(move || {
                    for k in 0..KEYS {
                        let key = format!("prediction:t{t}:{k}");
                        cache.set(&key, format!("{t}-{k}"), Duration::from_secs(60));
                        assert_eq!(cache.get(&key), Some(format!("{t}-{k}")));
                    }
                });
            }
        });

        assert_eq!(cache.len(), THREADS * KEYS);
        for t in 0..THREADS {
            assert_eq!(cache.get(&format!("prediction:t{t}:0")), Some(format!("{t}-0")));
        }
    }

    #[test]
    fn lazy_eviction_never_drops_a_fresh_set() {
        let (clock, cache) = cache_at(0);

        for round in 0..200_i64 {
            let start = round * 10_000;
            clock.set(start);
            cache.set("k", "stale".to_string(), Duration::from_secs(1));
            clock.set(start + 5_000);

            std::thread::scope(|scope| {
                scope.spawn(|| {
                    for _ in 0..50 {
                        let seen = cache.get("k");
                        assert_ne!(seen.as_deref(), Some("stale"));
                    }
                });
                scope.spawn(|| cache.set("k", "fresh".to_string(), Duration::from_secs(60)));
            });

            assert_eq!(cache.get("k").as_deref(), Some("fresh"), "round {round}");
        }
    }

    #[test]
    fn canonical_json_ignores_key_order() {
        let a = json!({"b": 1, "a": {"y": [1, 2], "x": null}});
        let b = json!({"a": {"x": null, "y": [1, 2]}, "b": 1});
        assert_eq!(canonical_json(&a), canonical_json(&b));
    }

    #[test]
    fn keys_are_stable_and_distinct() {
        let week = PredictionRequest::market_outlook(Timeframe::Week);
        let month = PredictionRequest::market_outlook(Timeframe::Month);
        assert_eq!(make_cache_key(&week), make_cache_key(&week.clone()));
        assert_ne!(make_cache_key(&week), make_cache_key(&month));

        let aapl = PredictionRequest::price_forecast("aapl").unwrap();
        let msft = PredictionRequest::price_forecast("MSFT").unwrap();
        assert_eq!(
            make_cache_key(&aapl),
            make_cache_key(&PredictionRequest::price_forecast("AAPL").unwrap())
        );
        assert_ne!(make_cache_key(&aapl), make_cache_key(&msft));

        // Same ticker, different request type
        let sentiment =
            PredictionRequest::sentiment(SentimentScope::Ticker("AAPL".into())).unwrap();
        assert_ne!(make_cache_key(&aapl), make_cache_key(&sentiment));
        assert!(make_cache_key(&aapl).starts_with("prediction:price-forecast:"));
    }
}
