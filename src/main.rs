//! lb-probe: exercise a service's backends through the balancer.
//!
//! # Architecture Overview
//!
//! ```text
//!   config.toml ──▶ loader ──▶ Balancer ◀── watcher (--watch, hot reload)
//!                                 │
//!                                 ▼
//!                   ┌──────────────────────────┐
//!                   │     RetryCoordinator     │
//!                   │ registry ∩ available     │
//!                   │ strategy → attempt       │
//!                   │ record → retry / return  │
//!                   └────────────┬─────────────┘
//!                                ▼
//!                       TcpConnectInvoker ──▶ backend host:port
//! ```
//!
//! Each probe is one logical call. Ctrl+C cancels the current call and stops.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use r01f_loadbalance::config::{load_config, watcher::ConfigWatcher};
use r01f_loadbalance::lifecycle::signals::cancel_on_ctrl_c;
use r01f_loadbalance::observability::{logging, metrics};
use r01f_loadbalance::probe::TcpConnectInvoker;
use r01f_loadbalance::{Balancer, CancelSignal, ServiceId};

#[derive(Parser)]
#[command(name = "lb-probe")]
#[command(about = "Probe a load-balanced service with TCP connects", long_about = None)]
struct Cli {
    /// Balancer configuration file (TOML).
    #[arg(short, long)]
    config: PathBuf,

    /// Service to probe.
    service: String,

    /// Number of probes; 0 runs until Ctrl+C.
    #[arg(short = 'n', long, default_value_t = 1)]
    count: u32,

    /// Pause between probes.
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Connect timeout per attempt.
    #[arg(long, default_value_t = 2000)]
    connect_timeout_ms: u64,

    /// Reload server lists when the config file changes.
    #[arg(long)]
    watch: bool,

    /// Print the final service report as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = load_config(&cli.config)?;
    if let Err(e) = logging::init(&config.observability.log_level) {
        eprintln!("logging already initialised: {e}");
    }

    tracing::info!(
        config = ?cli.config,
        service = %cli.service,
        count = cli.count,
        watch = cli.watch,
        "lb-probe starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let balancer = Arc::new(Balancer::from_config(&config));
    let service = ServiceId::new(&cli.service);

    let cancel = CancelSignal::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    // Keep the watcher handle alive for the whole run.
    let _watcher = if cli.watch {
        let (watcher, mut updates) = ConfigWatcher::new(&cli.config);
        let handle = watcher.run()?;
        let balancer = balancer.clone();
        tokio::spawn(async move {
            while let Some(new_config) = updates.recv().await {
                let changed = balancer.apply_config(&new_config);
                tracing::info!(changed_services = changed, "Server lists reloaded");
            }
        });
        Some(handle)
    } else {
        None
    };

    let invoker = TcpConnectInvoker::new(Duration::from_millis(cli.connect_timeout_ms));
    let interval = Duration::from_millis(cli.interval_ms);
    let mut failures = 0u32;
    let mut round = 0u32;

    while cli.count == 0 || round < cli.count {
        round += 1;
        match balancer.call(&service, &invoker, &(), &cancel).await {
            Ok(connect_time) => {
                tracing::info!(round, connect_time = ?connect_time, "Probe succeeded");
            }
            Err(e) => {
                failures += 1;
                let cause = std::error::Error::source(&e).map(ToString::to_string);
                tracing::error!(round, error = %e, cause = ?cause, "Probe failed");
            }
        }

        if cancel.is_cancelled() || (cli.count != 0 && round >= cli.count) {
            break;
        }
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = cancel.cancelled() => break,
        }
    }

    let report = balancer.report(&service);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "{} ({}): {}/{} available",
            report.service,
            report.strategy,
            report.available,
            report.servers.len()
        );
        for s in &report.servers {
            println!(
                "  {:<24} ok={:<6} fail={:<6} streak={:<3} latency_us={:<8} {}",
                s.server.address(),
                s.successes,
                s.failures,
                s.consecutive_failures,
                s.latency_us.map_or_else(|| "-".to_string(), |l| l.to_string()),
                if s.short_circuited { "SHORT-CIRCUITED" } else { "" }
            );
        }
    }

    tracing::info!(rounds = round, failures, "lb-probe finished");
    Ok(if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
