//! Backend selection strategies

use rand::Rng;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::backend::registry::{Backend, BackendRegistry};
use crate::error::{AppError, Result};

/// Backoff retry rounds after the initial pass, before giving up
const MAX_RETRY_ROUNDS: u32 = 4;
/// Initial backoff between retry rounds, doubled each round
const RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// Load balancing strategy, fixed at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Uniform random selection
    Random,
    /// Shared-cursor rotation through the registry
    RoundRobin,
    /// Lowest exponentially smoothed round-trip time
    AvgDuration,
}

impl FromStr for Strategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "random" => Ok(Self::Random),
            "round-robin" => Ok(Self::RoundRobin),
            "avg-duration" => Ok(Self::AvgDuration),
            other => Err(AppError::UnknownStrategy(other.to_string())),
        }
    }
}

/// Selects a backend for each request according to the configured strategy.
///
/// Selection never filters by liveness; callers that need a live backend go
/// through [`LoadBalancer::pick_live`].
pub struct LoadBalancer {
    registry: Arc<BackendRegistry>,
    strategy: Strategy,
    round_robin_cursor: AtomicUsize,
}

impl LoadBalancer {
    pub fn new(registry: Arc<BackendRegistry>, strategy: Strategy) -> Self {
        Self {
            registry,
            strategy,
            round_robin_cursor: AtomicUsize::new(0),
        }
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Select a backend for a request
    pub fn pick(&self) -> Arc<Backend> {
        match self.strategy {
            Strategy::Random => self.pick_random(),
            Strategy::RoundRobin => self.pick_round_robin(),
            Strategy::AvgDuration => self.pick_lowest_latency(),
        }
    }

    /// Select a live backend, retrying dead picks with bounded backoff.
    ///
    /// One fast pass over the registry, then up to [`MAX_RETRY_ROUNDS`]
    /// further passes with a doubling delay in between. Exhaustion means
    /// every backend is down and surfaces as 503 to the caller.
    pub async fn pick_live(&self) -> Result<Arc<Backend>> {
        if let Some(backend) = self.try_pick_live() {
            return Ok(backend);
        }

        let mut delay = RETRY_BACKOFF;
        for round in 0..MAX_RETRY_ROUNDS {
            tokio::time::sleep(delay).await;
            delay *= 2;

            if let Some(backend) = self.try_pick_live() {
                debug!(round, backend = %backend.address(), "live backend found on retry");
                return Ok(backend);
            }
        }

        Err(AppError::NoLiveBackends)
    }

    /// One pass of picks, at most one per configured backend
    fn try_pick_live(&self) -> Option<Arc<Backend>> {
        for _ in 0..self.registry.len() {
            let backend = self.pick();
            if backend.is_alive() {
                return Some(backend);
            }
        }
        None
    }

    fn pick_random(&self) -> Arc<Backend> {
        let index = rand::thread_rng().gen_range(0..self.registry.len());
        self.registry.get(index)
    }

    fn pick_round_robin(&self) -> Arc<Backend> {
        // Atomic read-and-advance: concurrent requests never observe the
        // same cursor value, so no backend is skipped or double-served.
        let index = self.round_robin_cursor.fetch_add(1, Ordering::Relaxed);
        self.registry.get(index % self.registry.len())
    }

    fn pick_lowest_latency(&self) -> Arc<Backend> {
        // Registry order is configuration order, so the all-zeros tie at
        // cold start deterministically resolves to the first backend.
        let backends = self.registry.all();
        let mut best = backends[0].clone();
        let mut best_latency = best.avg_latency();

        for backend in &backends[1..] {
            let latency = backend.avg_latency();
            if latency < best_latency {
                best_latency = latency;
                best = backend.clone();
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn balancer(services: &str, strategy: Strategy) -> LoadBalancer {
        let registry = Arc::new(BackendRegistry::from_services(services).unwrap());
        LoadBalancer::new(registry, strategy)
    }

    #[test]
    fn test_strategy_names() {
        assert_eq!("random".parse::<Strategy>().unwrap(), Strategy::Random);
        assert_eq!("round-robin".parse::<Strategy>().unwrap(), Strategy::RoundRobin);
        assert_eq!("avg-duration".parse::<Strategy>().unwrap(), Strategy::AvgDuration);
        assert!(matches!(
            "least-conn".parse::<Strategy>(),
            Err(AppError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn test_round_robin_sequence_and_wrap() {
        let lb = balancer("a:1,b:2,c:3", Strategy::RoundRobin);

        let picks: Vec<String> = (0..4).map(|_| lb.pick().address().to_string()).collect();
        assert_eq!(picks, ["a:1", "b:2", "c:3", "a:1"]);
    }

    #[test]
    fn test_round_robin_visits_each_backend_once_per_cycle() {
        let lb = balancer("a:1,b:2,c:3,d:4,e:5", Strategy::RoundRobin);

        let mut seen: Vec<String> = (0..5).map(|_| lb.pick().address().to_string()).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 5);
    }

    #[test]
    fn test_random_distribution_is_roughly_uniform() {
        let lb = balancer("a:1,b:2,c:3", Strategy::Random);

        let mut counts = [0usize; 3];
        for _ in 0..3000 {
            match lb.pick().address() {
                "a:1" => counts[0] += 1,
                "b:2" => counts[1] += 1,
                "c:3" => counts[2] += 1,
                other => panic!("unexpected backend {other}"),
            }
        }

        // Expect ~1000 per backend; allow a generous band to keep the test
        // stable across seeds.
        for count in counts {
            assert!((700..=1300).contains(&count), "skewed distribution: {counts:?}");
        }
    }

    #[test]
    fn test_lowest_latency_cold_start_picks_first_backend() {
        let lb = balancer("a:1,b:2,c:3", Strategy::AvgDuration);
        assert_eq!(lb.pick().address(), "a:1");
    }

    #[test]
    fn test_lowest_latency_follows_injected_update() {
        let lb = balancer("a:1,b:2,c:3", Strategy::AvgDuration);

        lb.registry.get(0).record_latency(Duration::from_millis(80));
        lb.registry.get(1).record_latency(Duration::from_millis(20));
        lb.registry.get(2).record_latency(Duration::from_millis(60));
        assert_eq!(lb.pick().address(), "b:2");

        // Push c:3 strictly below everyone; the very next pick must move.
        lb.registry.get(2).record_latency(Duration::ZERO);
        lb.registry.get(2).record_latency(Duration::ZERO);
        lb.registry.get(2).record_latency(Duration::ZERO);
        lb.registry.get(2).record_latency(Duration::ZERO);
        assert_eq!(lb.pick().address(), "c:3");
    }

    #[tokio::test]
    async fn test_pick_live_skips_dead_backends() {
        let lb = balancer("a:1,b:2,c:3", Strategy::RoundRobin);
        lb.registry.get(0).set_alive(false);
        lb.registry.get(2).set_alive(false);

        for _ in 0..10 {
            let backend = lb.pick_live().await.unwrap();
            assert_eq!(backend.address(), "b:2");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_pick_live_fails_when_all_dead() {
        let lb = balancer("a:1,b:2", Strategy::Random);
        lb.registry.get(0).set_alive(false);
        lb.registry.get(1).set_alive(false);

        assert!(matches!(lb.pick_live().await, Err(AppError::NoLiveBackends)));
    }

    #[tokio::test]
    async fn test_dead_backend_becomes_eligible_after_recovery() {
        let lb = balancer("a:1,b:2", Strategy::RoundRobin);
        lb.registry.get(0).set_alive(false);

        for _ in 0..4 {
            assert_eq!(lb.pick_live().await.unwrap().address(), "b:2");
        }

        lb.registry.get(0).set_alive(true);
        let picks: Vec<String> = vec![
            lb.pick_live().await.unwrap().address().to_string(),
            lb.pick_live().await.unwrap().address().to_string(),
        ];
        assert!(picks.contains(&"a:1".to_string()));
    }
}
