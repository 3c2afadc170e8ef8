use crate::network::config::NetworkConfig;
use crate::tenancy::TenancyConfig;

/// Sizing for the background [`WorkerPool`](super::worker::WorkerPool).
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of long-lived worker tasks.
    pub worker_count: usize,
    /// Jobs that may wait in the queue before `submit` applies backpressure.
    pub queue_capacity: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            queue_capacity: 256,
        }
    }
}

/// Top-level server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Identifier reported in logs and the health endpoint.
    pub node_id: String,
    pub network: NetworkConfig,
    pub tenancy: TenancyConfig,
    pub worker_pool: WorkerPoolConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            node_id: "tenantry-0".to_string(),
            network: NetworkConfig::default(),
            tenancy: TenancyConfig::default(),
            worker_pool: WorkerPoolConfig::default(),
        }
    }
}
