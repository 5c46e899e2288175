//! Simple coordinator: serve heartbeats and dispatch the job files given on
//! the command line.
//!
//! ```text
//! WORKER_PROGRAM=./buyer cargo run --example simple -- job1.json job2.json
//! ```

use std::sync::Arc;
use std::time::Duration;

use worker_dispatch::{
    server, CommandProvisioner, DispatchConfig, Dispatcher, HttpProbe, HttpWorkerClient, Job,
    JsonFileSettings, Notifications, ProxyProvider, RegistryConfig, RunOptions, SettingsStore,
    WorkerRegistry,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let bind = "127.0.0.1:7860";
    let settings = JsonFileSettings::open("settings.json")?;
    let registry = Arc::new(WorkerRegistry::new(RegistryConfig::default()));

    let listener = tokio::net::TcpListener::bind(bind).await?;
    let app = server::router(Arc::clone(&registry));
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("heartbeat server stopped: {}", e);
        }
    });
    println!("Listening for heartbeats on http://{}", bind);

    let mut jobs = Vec::new();
    for path in std::env::args().skip(1) {
        jobs.push(Job::from_file(&path).await?);
    }

    let config = DispatchConfig::builder()
        .callback_url(format!("http://{}", bind))
        .rank_proxies(true)
        .build();
    let program = std::env::var("WORKER_PROGRAM").unwrap_or_else(|_| "buyer".to_string());
    let dispatcher = Dispatcher::new(
        Arc::clone(&registry),
        Arc::new(HttpWorkerClient::new(config.claim_timeout)?),
        Arc::new(CommandProvisioner::new(program)),
        config,
    )
    .with_provider(Arc::new(ProxyProvider::new(Arc::new(HttpProbe::default()))));

    let raw_proxies = settings
        .get_string(worker_dispatch::settings::keys::HTTPS_PROXY)?
        .unwrap_or_default();
    let notifications = Notifications::from_settings(&settings)?;

    let report = dispatcher
        .dispatch(&jobs, &RunOptions::default(), &notifications, &raw_proxies, |line| {
            println!("{}", line)
        })
        .await?;
    println!(
        "{} jobs claimed by running workers, {} new workers started",
        report.claimed(),
        report.provisioned()
    );

    loop {
        tokio::time::sleep(Duration::from_secs(5)).await;
        for worker in registry.available() {
            println!("{} {}", worker.address, worker.status_detail);
        }
    }
}
