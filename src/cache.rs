use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Condvar, Mutex},
    time::{Duration, Instant},
};

use crate::{
    error::{ClockError, ClockResult},
    render::Bitmap,
};

/// What to do when a recomputation fails and a previous (now stale) entry
/// still exists. The default refuses to serve past-TTL data and propagates
/// the failure; serving the last good bitmap is an explicit opt-in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StalePolicy {
    #[default]
    Refuse,
    ServeLastKnownGood,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct Entry {
    bitmap: Arc<Bitmap>,
    created_at: Instant,
    ttl: Duration,
}

impl Entry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) < self.ttl
    }
}

/// Broadcast slot for one in-flight computation. The leader fills it exactly
/// once; every waiter on the same key blocks on the condvar until then.
struct Pending {
    done: Mutex<Option<Result<Arc<Bitmap>, Arc<ClockError>>>>,
    cv: Condvar,
}

struct CacheState {
    entries: HashMap<String, Entry>,
    pending: HashMap<String, Arc<Pending>>,
    // most recently used at the back
    lru: VecDeque<String>,
    stats: CacheStats,
}

/// In-memory bitmap cache with per-entry TTL, LRU capacity eviction and
/// at-most-one in-flight computation per key.
pub struct ImageCache {
    state: Mutex<CacheState>,
    capacity: usize,
    policy: StalePolicy,
}

impl ImageCache {
    pub fn new(capacity: usize) -> Self {
        Self::with_policy(capacity, StalePolicy::default())
    }

    pub fn with_policy(capacity: usize, policy: StalePolicy) -> Self {
        Self {
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                pending: HashMap::new(),
                lru: VecDeque::new(),
                stats: CacheStats::default(),
            }),
            capacity: capacity.max(1),
            policy,
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.state.lock().expect("cache state poisoned").stats
    }

    /// Return the cached bitmap for `key` if younger than its TTL, otherwise
    /// run `compute` (once across all concurrent callers) and store the
    /// result. A failed computation stores nothing, evicts any previous
    /// entry (unless [`StalePolicy::ServeLastKnownGood`] applies) and
    /// propagates the same error to every waiter.
    pub fn get_or_compute<F>(&self, key: &str, ttl: Duration, compute: F) -> ClockResult<Arc<Bitmap>>
    where
        F: FnOnce() -> ClockResult<Bitmap>,
    {
        self.get_or_compute_at(key, ttl, Instant::now(), compute)
    }

    /// Same as [`get_or_compute`](Self::get_or_compute) with an explicit
    /// freshness instant, so TTL behavior is testable without sleeping.
    pub fn get_or_compute_at<F>(
        &self,
        key: &str,
        ttl: Duration,
        now: Instant,
        compute: F,
    ) -> ClockResult<Arc<Bitmap>>
    where
        F: FnOnce() -> ClockResult<Bitmap>,
    {
        let (pending, previous) = {
            let mut state = self.state.lock().expect("cache state poisoned");

            if let Some(entry) = state.entries.get(key) {
                if entry.is_fresh(now) {
                    let bitmap = Arc::clone(&entry.bitmap);
                    state.stats.hits += 1;
                    touch(&mut state.lru, key);
                    tracing::debug!(key, "cache hit");
                    return Ok(bitmap);
                }
            }

            if let Some(pending) = state.pending.get(key) {
                let pending = Arc::clone(pending);
                drop(state);
                tracing::debug!(key, "joining in-flight computation");
                return wait_for(&pending);
            }

            // This caller leads the (re)computation for the key.
            state.stats.misses += 1;
            let previous = state.entries.get(key).map(|e| Arc::clone(&e.bitmap));
            let pending = Arc::new(Pending {
                done: Mutex::new(None),
                cv: Condvar::new(),
            });
            state.pending.insert(key.to_string(), Arc::clone(&pending));
            tracing::debug!(key, stale = previous.is_some(), "cache miss, computing");
            (pending, previous)
        };

        let result = compute();

        let mut state = self.state.lock().expect("cache state poisoned");
        state.pending.remove(key);

        let outcome = match result {
            Ok(bitmap) => {
                let bitmap = Arc::new(bitmap);
                state.entries.insert(
                    key.to_string(),
                    Entry {
                        bitmap: Arc::clone(&bitmap),
                        created_at: now,
                        ttl,
                    },
                );
                touch(&mut state.lru, key);
                evict_over_capacity(&mut state, self.capacity);
                Ok(bitmap)
            }
            Err(err) => {
                if self.policy == StalePolicy::ServeLastKnownGood
                    && let Some(last_good) = previous
                {
                    // The stale entry stays put; the next request past TTL
                    // attempts recomputation again.
                    tracing::warn!(key, error = %err, "recompute failed, serving last known good");
                    Ok(last_good)
                } else {
                    state.entries.remove(key);
                    remove_key(&mut state.lru, key);
                    tracing::warn!(key, error = %err, "computation failed, entry evicted");
                    Err(Arc::new(err))
                }
            }
        };

        drop(state);
        broadcast(&pending, &outcome);
        match outcome {
            Ok(bitmap) => Ok(bitmap),
            Err(shared) => Err(ClockError::Shared(shared)),
        }
    }
}

fn wait_for(pending: &Pending) -> ClockResult<Arc<Bitmap>> {
    let mut done = pending.done.lock().expect("pending slot poisoned");
    while done.is_none() {
        done = pending.cv.wait(done).expect("pending slot poisoned");
    }
    match done.as_ref().expect("checked above") {
        Ok(bitmap) => Ok(Arc::clone(bitmap)),
        Err(shared) => Err(ClockError::Shared(Arc::clone(shared))),
    }
}

fn broadcast(pending: &Pending, outcome: &Result<Arc<Bitmap>, Arc<ClockError>>) {
    let mut done = pending.done.lock().expect("pending slot poisoned");
    *done = Some(outcome.clone());
    pending.cv.notify_all();
}

fn touch(lru: &mut VecDeque<String>, key: &str) {
    remove_key(lru, key);
    lru.push_back(key.to_string());
}

fn remove_key(lru: &mut VecDeque<String>, key: &str) {
    lru.retain(|k| k != key);
}

fn evict_over_capacity(state: &mut CacheState, capacity: usize) {
    while state.entries.len() > capacity {
        let Some(oldest) = state.lru.pop_front() else {
            break;
        };
        if state.entries.remove(&oldest).is_some() {
            state.stats.evictions += 1;
            tracing::debug!(key = %oldest, "evicted over capacity");
        }
    }
}
