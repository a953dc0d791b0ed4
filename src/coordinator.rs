//! Single-flight coalescing for upstream fetches.
//!
//! Concurrent lookups that miss on the same key would otherwise each hit
//! the upstream. The coordinator keys in-flight fetches by a request
//! string: the first caller becomes the leader and runs the fetch, every
//! later caller subscribes to the leader's broadcast and waits. Errors are
//! shared with the whole flight and never cached, so the next request
//! after a failure starts a fresh flight.
//!
//! ```text
//!   lookup A ──┐
//!   lookup A ──┼──► one flight ──► one upstream call ──► N results
//!   lookup A ──┘
//! ```
//!
//! A cancelled leader removes its flight on drop, letting a waiting
//! follower take over leadership on its retry. A background sweeper reaps
//! flights that outlive `flight_ttl` as a backstop against a wedged
//! upstream call.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::error::CacheError;

const DEFAULT_FLIGHT_TTL: Duration = Duration::from_secs(30);

struct Flight<T> {
    tx: broadcast::Sender<Result<T, CacheError>>,
    started_at: Instant,
}

type FlightMap<T> = Arc<Mutex<FxHashMap<String, Flight<T>>>>;

/// Deduplicates concurrent fetches per request key.
pub struct RequestCoordinator<T> {
    flights: FlightMap<T>,
    flight_ttl: Duration,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl<T> std::fmt::Debug for RequestCoordinator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestCoordinator")
            .field("in_flight", &self.flights.lock().len())
            .field("flight_ttl", &self.flight_ttl)
            .finish()
    }
}

impl<T> Default for RequestCoordinator<T>
where
    T: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RequestCoordinator<T>
where
    T: Clone + Send + 'static,
{
    /// Creates a coordinator with the default stuck-flight TTL.
    pub fn new() -> Self {
        Self::with_flight_ttl(DEFAULT_FLIGHT_TTL)
    }

    /// Creates a coordinator reaping flights older than `flight_ttl`.
    pub fn with_flight_ttl(flight_ttl: Duration) -> Self {
        Self {
            flights: Arc::new(Mutex::new(FxHashMap::default())),
            flight_ttl,
            sweeper: Mutex::new(None),
        }
    }

    /// Number of requests currently in flight.
    pub fn in_flight(&self) -> usize {
        self.flights.lock().len()
    }

    /// Runs `fetch` for `key`, or waits on the flight already running it.
    ///
    /// Exactly one concurrent caller per key executes `fetch`; the rest
    /// receive a clone of its result. The fetch closure is responsible for
    /// any cache writes, which is what guarantees a single store per
    /// flight.
    pub async fn run<F, Fut>(&self, key: &str, fetch: F) -> Result<T, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
    {
        self.ensure_sweeper();
        let mut fetch = Some(fetch);
        loop {
            // Subscribe-or-insert under one lock acquisition; the guard is
            // released before any await.
            let role = {
                let mut flights = self.flights.lock();
                match flights.get(key).map(|flight| flight.tx.subscribe()) {
                    Some(rx) => Ok(rx),
                    None => {
                        let (tx, _) = broadcast::channel(1);
                        flights.insert(
                            key.to_owned(),
                            Flight {
                                tx: tx.clone(),
                                started_at: Instant::now(),
                            },
                        );
                        Err(tx)
                    }
                }
            };
            let mut rx = match role {
                Ok(rx) => rx,
                Err(tx) => return self.lead(key, tx, fetch.take()).await,
            };
            match rx.recv().await {
                Ok(result) => return result,
                // The leader was cancelled or reaped. Loop and contend for
                // leadership.
                Err(_) => continue,
            }
        }
    }

    async fn lead<F, Fut>(
        &self,
        key: &str,
        tx: broadcast::Sender<Result<T, CacheError>>,
        fetch: Option<F>,
    ) -> Result<T, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, CacheError>>,
    {
        let guard = FlightGuard {
            flights: Arc::clone(&self.flights),
            key: key.to_owned(),
        };
        let result = match fetch {
            Some(fetch) => fetch().await,
            // A follower promoted to leader after losing its first recv has
            // already surrendered its closure. Treat it as a lost flight.
            None => Err(CacheError::Source(crate::error::SourceError::new(
                "request flight abandoned by its leader",
            ))),
        };
        drop(guard);
        let _ = tx.send(result.clone());
        result
    }

    fn ensure_sweeper(&self) {
        let mut sweeper = self.sweeper.lock();
        if sweeper.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let flights = Arc::downgrade(&self.flights);
        let ttl = self.flight_ttl;
        *sweeper = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(ttl);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let Some(flights) = flights.upgrade() else {
                    return;
                };
                let mut flights = flights.lock();
                let before = flights.len();
                flights.retain(|_, flight| flight.started_at.elapsed() < ttl);
                let reaped = before - flights.len();
                if reaped > 0 {
                    tracing::warn!(reaped, "reaped stuck request flights");
                }
            }
        }));
    }

    /// Stops the background sweeper. In-flight requests are unaffected.
    pub fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
    }
}

impl<T> Drop for RequestCoordinator<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.lock().take() {
            handle.abort();
        }
    }
}

/// Removes the flight entry when the leader settles or is cancelled.
struct FlightGuard<T> {
    flights: FlightMap<T>,
    key: String,
}

impl<T> Drop for FlightGuard<T> {
    fn drop(&mut self) {
        self.flights.lock().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn coordinator() -> Arc<RequestCoordinator<u64>> {
        Arc::new(RequestCoordinator::new())
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_fetch() {
        let coord = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let coord = Arc::clone(&coord);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                coord
                    .run("task:all", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(20)).await;
                        Ok(7)
                    })
                    .await
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coord.in_flight(), 0);
    }

    #[tokio::test]
    async fn distinct_keys_do_not_coalesce() {
        let coord = coordinator();
        let calls = Arc::new(AtomicUsize::new(0));
        for key in ["a", "b"] {
            let calls = Arc::clone(&calls);
            coord
                .run(key, || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                })
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn errors_are_shared_not_sticky() {
        let coord = coordinator();
        let err = coord
            .run("k", || async {
                Err(CacheError::Source(crate::error::SourceError::new("down")))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Source(_)));

        // The failed flight is gone; the next call fetches fresh.
        let value = coord.run("k", || async { Ok(3) }).await.unwrap();
        assert_eq!(value, 3);
    }

    #[tokio::test]
    async fn cancelled_leader_releases_the_flight() {
        let coord = coordinator();
        let coord2 = Arc::clone(&coord);
        let leader = tokio::spawn(async move {
            coord2
                .run("k", || async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(1)
                })
                .await
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(coord.in_flight(), 1);
        leader.abort();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(coord.in_flight(), 0);

        let value = coord.run("k", || async { Ok(2) }).await.unwrap();
        assert_eq!(value, 2);
    }
}
