//! Tenantry server binary.
//!
//! Loads seed tenants, starts the worker pool and serves HTTP until Ctrl-C,
//! then drains requests and the pool.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tenantry_server::network::{NetworkConfig, NetworkModule};
use tenantry_server::service::{ServerConfig, WorkerPool, WorkerPoolConfig};
use tenantry_server::tenancy::{
    CachingTenantDirectory, InMemoryTenantDirectory, TenancyConfig, TenantResolver,
};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "tenantry-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Bind address
    #[arg(long, env = "TENANTRY_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Listen port (0 picks a free one)
    #[arg(long, env = "TENANTRY_PORT", default_value_t = 8080)]
    port: u16,

    /// Allowed CORS origins, comma separated ("*" for any)
    #[arg(long, env = "TENANTRY_CORS_ORIGINS", value_delimiter = ',', default_value = "*")]
    cors_origins: Vec<String>,

    /// Seconds to wait for in-flight requests on shutdown
    #[arg(long, env = "TENANTRY_DRAIN_TIMEOUT_SECS", default_value_t = 30)]
    drain_timeout_secs: u64,

    /// Node identifier reported by /health
    #[arg(long, env = "TENANTRY_NODE_ID", default_value = "tenantry-0")]
    node_id: String,

    /// Request header carrying the tenant key
    #[arg(long, env = "TENANTRY_TENANT_HEADER", default_value = "X-Tenant-Key")]
    tenant_header: String,

    /// Treat suspended and expired tenants as unknown
    #[arg(long, env = "TENANTRY_REJECT_INACTIVE")]
    reject_inactive: bool,

    /// Background worker count
    #[arg(long, env = "TENANTRY_WORKERS", default_value_t = 4)]
    workers: usize,

    /// Background queue capacity
    #[arg(long, env = "TENANTRY_QUEUE_CAPACITY", default_value_t = 256)]
    queue_capacity: usize,

    /// JSON file with an array of tenants to load at startup
    #[arg(long, env = "TENANTRY_SEED_TENANTS")]
    seed_tenants: Option<PathBuf>,

    /// Tenant lookups kept in the resolution cache
    #[arg(long, default_value_t = 1024)]
    tenant_cache_capacity: usize,

    /// Log filter (trace, debug, info, warn, error, or an `EnvFilter` directive)
    #[arg(long, env = "TENANTRY_LOG", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            node_id: self.node_id.clone(),
            network: NetworkConfig {
                host: self.host.clone(),
                port: self.port,
                cors_origins: self.cors_origins.clone(),
                drain_timeout: Duration::from_secs(self.drain_timeout_secs),
                ..NetworkConfig::default()
            },
            tenancy: TenancyConfig {
                header_name: self.tenant_header.clone(),
                reject_inactive: self.reject_inactive,
                ..TenancyConfig::default()
            },
            worker_pool: WorkerPoolConfig {
                worker_count: self.workers,
                queue_capacity: self.queue_capacity,
            },
        }
    }
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level, args.log_format);
    let config = args.server_config();

    let directory = match &args.seed_tenants {
        Some(path) => InMemoryTenantDirectory::from_json_file(path)?,
        None => InMemoryTenantDirectory::new(),
    };
    info!(tenants = directory.len(), "tenant directory loaded");

    let directory = CachingTenantDirectory::new(directory, args.tenant_cache_capacity);
    let resolver = TenantResolver::new(Arc::new(config.tenancy.clone()), Arc::new(directory));

    let workers = Arc::new(WorkerPool::start(&config.worker_pool));

    let mut network = NetworkModule::new(
        config.network.clone(),
        &config.node_id,
        resolver,
        workers,
    );
    let port = network.start().await?;
    info!(node_id = %config.node_id, port, "tenantry server started");

    network
        .serve(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    info!("tenantry server stopped");
    Ok(())
}
