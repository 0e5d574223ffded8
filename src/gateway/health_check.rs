//! Background health monitor probing backend reachability over TCP

use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::registry::BackendRegistry;

const SWEEP_INTERVAL: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Periodically probes every backend and writes liveness back into the
/// registry. Runs for the lifetime of the process.
pub struct HealthMonitor {
    registry: Arc<BackendRegistry>,
    interval: Duration,
    probe_timeout: Duration,
}

impl HealthMonitor {
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self {
            registry,
            interval: SWEEP_INTERVAL,
            probe_timeout: PROBE_TIMEOUT,
        }
    }

    /// Override the sweep interval and probe timeout (tests use short ones)
    pub fn with_intervals(
        registry: Arc<BackendRegistry>,
        interval: Duration,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            interval,
            probe_timeout,
        }
    }

    /// Detach the monitor loop onto the runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(self.interval).await;
                self.sweep().await;
            }
        })
    }

    /// Probe every backend once and update its liveness.
    ///
    /// A failed probe marks the backend dead with no quarantine: the next
    /// sweep re-probes it and a single success makes it eligible again.
    pub async fn sweep(&self) {
        info!("starting health check sweep");
        let mut faulty = Vec::new();

        for backend in self.registry.all() {
            let alive = self.probe(backend.address()).await;
            backend.set_alive(alive);
            if !alive {
                faulty.push(backend.address().to_string());
            }
        }

        info!("health check sweep completed");
        if !faulty.is_empty() {
            warn!(services = %faulty.join(", "), "faulty or unreachable services");
        }
    }

    /// TCP-dial the address with a short deadline; reachable means alive
    async fn probe(&self, address: &str) -> bool {
        match tokio::time::timeout(self.probe_timeout, TcpStream::connect(address)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(error)) => {
                debug!(service = %address, %error, "service down");
                false
            }
            Err(_elapsed) => {
                debug!(service = %address, "service down: probe timed out");
                false
            }
        }
    }
}
