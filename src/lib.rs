//! # worker-dispatch
//!
//! Coordinates purchase-attempt jobs across a pool of worker processes and
//! keeps them supplied with egress proxies.
//!
//! Jobs are first offered to workers already known to the [`WorkerRegistry`]
//! (fed by heartbeats through the [`server`] router). Jobs no worker accepts
//! get a freshly provisioned worker and a disjoint round-robin slice of the
//! proxy list. The [`ProxyProvider`] acquires proxies from a vendor, probes
//! them concurrently and ranks known ones by latency.

pub mod claim;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod heartbeat;
pub mod job;
pub mod middleware;
pub mod pool;
pub mod probe;
pub mod provision;
pub mod proxy;
pub mod registry;
pub mod server;
pub mod settings;
pub mod vendor;
mod utils;

pub use claim::{ClaimOutcome, HttpWorkerClient, WorkerClient};
pub use config::{
    AcquireConfig, AcquireConfigBuilder, DispatchConfig, DispatchConfigBuilder, MiddlewareConfig,
    RankConfig, RegistryConfig,
};
pub use dispatch::{DispatchReport, Dispatcher, JobOutcome};
pub use error::{ClaimError, DispatchError, NoProxyAvailable, ProvisionError, SettingsError, VendorError};
pub use heartbeat::HeartbeatReporter;
pub use job::{ClaimPayload, Job, Notifications, RunOptions};
pub use middleware::ProxySliceMiddleware;
pub use pool::ProxyProvider;
pub use probe::{HttpProbe, ProxyProbe};
pub use provision::{CommandProvisioner, Provisioner, SpawnRequest};
pub use proxy::{split_round_robin, ProbeResult};
pub use registry::{Worker, WorkerRegistry};
pub use settings::{JsonFileSettings, MemorySettings, SettingsStore};
pub use vendor::{HttpVendor, VendorCredentials, VendorSource};
