//! Coalesces concurrent computations for the same key
//!
//! The first caller for a key starts the computation on the runtime; later
//! callers wait for the same value. Dropping a waiter never cancels the
//! computation, so the remaining waiters still receive it.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use tokio::sync::watch;

use crate::domain::DomainError;

type Flights<K, V> = Arc<Mutex<HashMap<K, watch::Receiver<Option<V>>>>>;

#[derive(Debug)]
pub struct SingleFlight<K, V> {
    flights: Flights<K, V>,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            flights: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

/// Handle on an in-progress computation
#[derive(Debug)]
pub struct Flight<V> {
    receiver: watch::Receiver<Option<V>>,
    leader: bool,
}

impl<V: Clone> Flight<V> {
    /// Whether this caller started the computation
    pub fn is_leader(&self) -> bool {
        self.leader
    }

    /// Waits for the shared value
    pub async fn wait(mut self) -> Result<V, DomainError> {
        let value = self
            .receiver
            .wait_for(Option::is_some)
            .await
            .map_err(|_| DomainError::internal("Shared computation ended without a result"))?;

        value
            .clone()
            .ok_or_else(|| DomainError::internal("Shared computation ended without a result"))
    }
}

/// Removes the flight from the map even if the computation panics
struct FlightGuard<K: Eq + Hash, V> {
    flights: Flights<K, V>,
    key: K,
}

impl<K: Eq + Hash, V> Drop for FlightGuard<K, V> {
    fn drop(&mut self) {
        if let Ok(mut flights) = self.flights.lock() {
            flights.remove(&self.key);
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the flight for `key`, spawning `compute()` if none is in progress
    pub fn join<F, Fut>(&self, key: K, compute: F) -> Result<Flight<V>, DomainError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let mut flights = self
            .flights
            .lock()
            .map_err(|e| DomainError::internal(format!("Failed to acquire lock: {}", e)))?;

        if let Some(receiver) = flights.get(&key) {
            return Ok(Flight {
                receiver: receiver.clone(),
                leader: false,
            });
        }

        let (sender, receiver) = watch::channel(None);
        flights.insert(key.clone(), receiver.clone());

        let guard = FlightGuard {
            flights: self.flights.clone(),
            key,
        };
        let computation = compute();

        tokio::spawn(async move {
            let value = computation.await;
            // Later callers start a fresh flight instead of reusing this value
            drop(guard);
            let _ = sender.send(Some(value));
        });

        Ok(Flight {
            receiver,
            leader: true,
        })
    }

    /// Number of computations in progress
    pub fn in_flight(&self) -> usize {
        self.flights.lock().map(|f| f.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counted(
        counter: Arc<AtomicUsize>,
        value: u32,
        delay: Duration,
    ) -> impl FnOnce() -> std::pin::Pin<Box<dyn Future<Output = u32> + Send>> {
        move || {
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(delay).await;
                value
            })
        }
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_computation() {
        let flights: SingleFlight<&str, u32> = SingleFlight::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let joined: Vec<_> = (0..10)
            .map(|_| {
                flights
                    .join("key", counted(counter.clone(), 7, Duration::from_millis(30)))
                    .unwrap()
            })
            .collect();

        assert_eq!(joined.iter().filter(|f| f.is_leader()).count(), 1);

        let values = futures::future::join_all(joined.into_iter().map(|f| f.wait())).await;

        assert!(values.into_iter().all(|v| v == Ok(7)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_compute_independently() {
        let flights: SingleFlight<&str, u32> = SingleFlight::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let a = flights
            .join("a", counted(counter.clone(), 1, Duration::from_millis(5)))
            .unwrap();
        let b = flights
            .join("b", counted(counter.clone(), 2, Duration::from_millis(5)))
            .unwrap();

        assert_eq!(a.wait().await.unwrap(), 1);
        assert_eq!(b.wait().await.unwrap(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_finished_flight_is_not_reused() {
        let flights: SingleFlight<&str, u32> = SingleFlight::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let first = flights
            .join("key", counted(counter.clone(), 1, Duration::ZERO))
            .unwrap();
        assert_eq!(first.wait().await.unwrap(), 1);

        let second = flights
            .join("key", counted(counter.clone(), 2, Duration::ZERO))
            .unwrap();
        assert!(second.is_leader());
        assert_eq!(second.wait().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_dropped_waiters_do_not_cancel_the_computation() {
        let flights: SingleFlight<&str, u32> = SingleFlight::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(AtomicUsize::new(0));

        let finished = done.clone();
        let leader = flights
            .join("key", move || async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                3
            })
            .unwrap();
        let follower = flights
            .join("key", counted(counter.clone(), 9, Duration::ZERO))
            .unwrap();

        drop(leader);
        assert_eq!(follower.wait().await.unwrap(), 3);
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_panicking_computation_reports_error() {
        let flights: SingleFlight<&str, u32> = SingleFlight::new();

        let flight = flights
            .join("key", || async {
                let fail = true;
                if fail {
                    panic!("boom");
                }
                0
            })
            .unwrap();

        assert!(flight.wait().await.is_err());
        assert_eq!(flights.in_flight(), 0);
    }
}
