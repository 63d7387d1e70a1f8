//! Codestream registry.
//!
//! Opening a codestream builds its whole geometry model, so opened models
//! are kept in an LRU cache and shared between requests. Concurrent first
//! requests for the same target wait for a single open.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::debug;

use crate::error::ServiceError;

use super::source::{CodestreamSource, OpenCodestream};

/// Default number of codestreams kept open.
pub const DEFAULT_CODESTREAM_CACHE_CAPACITY: usize = 16;

type Opened<T> = Arc<OpenCodestream<T>>;

struct InFlightState<T> {
    notify: Notify,
    result: Mutex<Option<Result<Opened<T>, ServiceError>>>,
}

/// LRU cache of opened codestreams over a [`CodestreamSource`].
pub struct CodestreamRegistry<S: CodestreamSource> {
    source: S,
    cache: RwLock<LruCache<String, Opened<S::Store>>>,
    in_flight: Mutex<HashMap<String, Arc<InFlightState<S::Store>>>>,
}

impl<S: CodestreamSource> CodestreamRegistry<S> {
    pub fn new(source: S) -> Self {
        Self::with_capacity(source, DEFAULT_CODESTREAM_CACHE_CAPACITY)
    }

    /// Create a registry holding at most `capacity` open codestreams. A
    /// capacity of zero is treated as one.
    pub fn with_capacity(source: S, capacity: usize) -> Self {
        Self {
            source,
            cache: RwLock::new(LruCache::new(
                NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN),
            )),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Get a codestream, opening it on first use.
    ///
    /// Concurrent calls for the same target share a single open. Failed
    /// opens are handed to every waiter but are not cached.
    pub async fn get(&self, target: &str) -> Result<Opened<S::Store>, ServiceError> {
        {
            let mut cache = self.cache.write().await;
            if let Some(opened) = cache.get(target) {
                return Ok(Arc::clone(opened));
            }
        }

        loop {
            let state = {
                let mut in_flight = self.in_flight.lock().await;
                if let Some(state) = in_flight.get(target) {
                    Arc::clone(state)
                } else {
                    let state = Arc::new(InFlightState {
                        notify: Notify::new(),
                        result: Mutex::new(None),
                    });
                    in_flight.insert(target.to_string(), Arc::clone(&state));
                    drop(in_flight);

                    let result = self.source.open(target).await.map(Arc::new);
                    match &result {
                        Ok(opened) => {
                            debug!(
                                target,
                                tiles = opened.codestream.num_tiles(),
                                components = opened.codestream.num_components(),
                                "Opened codestream"
                            );
                            self.cache
                                .write()
                                .await
                                .put(target.to_string(), Arc::clone(opened));
                        }
                        Err(e) => debug!(target, error = %e, "Failed to open codestream"),
                    }
                    *state.result.lock().await = Some(result.clone());

                    self.in_flight.lock().await.remove(target);
                    state.notify.notify_waiters();
                    return result;
                }
            };

            let notified = state.notify.notified();
            let finished = state.result.lock().await.clone();
            if let Some(result) = finished {
                return result;
            }
            notified.await;
            let finished = state.result.lock().await.clone();
            if let Some(result) = finished {
                return result;
            }
        }
    }

    /// Drop a codestream so the next request reopens it.
    pub async fn invalidate(&self, target: &str) {
        self.cache.write().await.pop(target);
    }

    pub async fn clear(&self) {
        self.cache.write().await.clear();
    }

    pub async fn cached_count(&self) -> usize {
        self.cache.read().await.len()
    }
}
