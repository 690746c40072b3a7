//! TCP connect probing through the balancer.

use std::error::Error as _;
use std::time::Duration;

use r01f_loadbalance::config::loader::parse_config;
use r01f_loadbalance::probe::{ProbeError, TcpConnectInvoker};
use r01f_loadbalance::{BackendServer, Balancer, CallError, CancelSignal, ServiceId};

mod common;

fn balancer() -> Balancer {
    let config = parse_config(
        r#"
        [retries]
        max_attempts = 3

        [[services]]
        name = "probe"
        "#,
    )
    .unwrap();
    Balancer::from_config(&config)
}

#[tokio::test]
async fn test_probe_reaches_live_backend() {
    let live = common::start_mock_backend().await;
    let dead = common::closed_port();
    let balancer = balancer();
    let svc = ServiceId::from("probe");
    balancer.refresh(
        &svc,
        vec![
            BackendServer::new(dead.ip().to_string(), dead.port()),
            BackendServer::new(live.ip().to_string(), live.port()),
        ],
    );
    let invoker = TcpConnectInvoker::new(Duration::from_secs(2));

    let connect_time = balancer
        .call(&svc, &invoker, &(), &CancelSignal::new())
        .await
        .expect("live backend accepts");
    assert!(connect_time < Duration::from_secs(2));

    let report = balancer.report(&svc);
    let live_stats = report
        .servers
        .iter()
        .find(|s| s.server.port() == live.port())
        .unwrap();
    assert_eq!(live_stats.successes, 1);
    assert!(live_stats.latency_us.is_some());
}

#[tokio::test]
async fn test_probe_of_closed_port_fails_with_cause() {
    let dead = common::closed_port();
    let balancer = balancer();
    let svc = ServiceId::from("probe");
    balancer.refresh(&svc, vec![BackendServer::new(dead.ip().to_string(), dead.port())]);
    let invoker = TcpConnectInvoker::new(Duration::from_secs(2));

    let err = balancer
        .call(&svc, &invoker, &(), &CancelSignal::new())
        .await
        .unwrap_err();

    assert!(matches!(err, CallError::RetriesExceeded { attempts: 1, .. }));
    let cause = err.source().and_then(|e| e.downcast_ref::<ProbeError>());
    assert!(matches!(cause, Some(ProbeError::Connect { .. }) | Some(ProbeError::Timeout { .. })));
}
