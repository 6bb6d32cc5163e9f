// ReachabilityScheduler lifecycle and interval handling

use crate::common::*;
use proxywatch::core::proxy::reachability::{
    ProbeOptions, ReachabilityCallback, ReachabilityScheduler,
};
use proxywatch::core::proxy::ReachabilityResult;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn recorder() -> (ReachabilityCallback, Arc<Mutex<Vec<ReachabilityResult>>>) {
    let seen = Arc::new(Mutex::new(Vec::<ReachabilityResult>::new()));
    let sink = Arc::clone(&seen);
    let callback: ReachabilityCallback =
        Arc::new(move |result: ReachabilityResult| sink.lock().unwrap().push(result));
    (callback, seen)
}

fn scheduler(client: &Arc<MockTunnelClient>, interval_ms: i64) -> ReachabilityScheduler {
    ReachabilityScheduler::new(probe_with(client), ProbeOptions::background(), interval_ms)
}

#[tokio::test(start_paused = true)]
async fn test_interval_is_clamped() {
    let client = Arc::new(MockTunnelClient::new());

    assert_eq!(scheduler(&client, 1_000).interval_ms(), 30_000);
    assert_eq!(scheduler(&client, -1).interval_ms(), 30_000);
    assert_eq!(scheduler(&client, 3_600_000).interval_ms(), 600_000);
    assert_eq!(scheduler(&client, 45_000).interval_ms(), 45_000);
}

#[tokio::test(start_paused = true)]
async fn test_fires_every_interval() {
    let client = Arc::new(MockTunnelClient::new());
    let scheduler = scheduler(&client, 30_000);
    let (callback, seen) = recorder();

    scheduler.start(PROXY_A, callback);
    tokio::time::sleep(Duration::from_millis(95_000)).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    assert!(seen.iter().all(|r| r.success && r.proxy_url.as_deref() == Some(PROXY_A)));
}

#[tokio::test(start_paused = true)]
async fn test_stop_clears_state() {
    let client = Arc::new(MockTunnelClient::new());
    let scheduler = scheduler(&client, 30_000);
    let (callback, seen) = recorder();

    scheduler.start(PROXY_A, callback);
    scheduler.stop();
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert!(!scheduler.is_running());
    assert!(scheduler.endpoint().is_none());
    assert!(seen.lock().unwrap().is_empty());
    assert!(scheduler.trigger_now().await.is_none());
    assert!(!scheduler.update_endpoint(PROXY_B));
}

#[tokio::test(start_paused = true)]
async fn test_update_endpoint_applies_to_next_probe() {
    let client = Arc::new(MockTunnelClient::new());
    let scheduler = scheduler(&client, 30_000);
    let (callback, seen) = recorder();

    scheduler.start(PROXY_A, callback);
    tokio::time::sleep(Duration::from_millis(31_000)).await;
    assert!(scheduler.update_endpoint(PROXY_B));
    tokio::time::sleep(Duration::from_millis(30_000)).await;

    let endpoints: Vec<Option<String>> =
        seen.lock().unwrap().iter().map(|r| r.proxy_url.clone()).collect();
    assert_eq!(
        endpoints,
        vec![Some(PROXY_A.to_string()), Some(PROXY_B.to_string())]
    );
}

#[tokio::test(start_paused = true)]
async fn test_update_interval_restarts_running_timer() {
    let client = Arc::new(MockTunnelClient::new());
    let scheduler = scheduler(&client, 600_000);
    let (callback, seen) = recorder();

    scheduler.start(PROXY_A, callback);
    tokio::time::sleep(Duration::from_secs(10)).await;
    scheduler.update_interval(30_000);
    tokio::time::sleep(Duration::from_millis(30_500)).await;

    assert_eq!(scheduler.interval_ms(), 30_000);
    assert_eq!(scheduler.endpoint().as_deref(), Some(PROXY_A));
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_update_interval_while_stopped_does_not_start() {
    let client = Arc::new(MockTunnelClient::new());
    let scheduler = scheduler(&client, 60_000);

    scheduler.update_interval(45_000);

    assert_eq!(scheduler.interval_ms(), 45_000);
    assert!(!scheduler.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_trigger_now_runs_immediately() {
    let client = Arc::new(MockTunnelClient::failing());
    let scheduler = scheduler(&client, 60_000);
    let (callback, seen) = recorder();

    scheduler.start(PROXY_A, callback);
    let result = scheduler.trigger_now().await.expect("scheduler is running");

    assert!(!result.success);
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_slow_probe_never_overlaps() {
    let client = Arc::new(MockTunnelClient::new());
    // Each attempt outlives the watchdog, so every probe takes 4s
    client.set_default(60_000, Ok(()));
    let scheduler = scheduler(&client, 30_000);
    let (callback, seen) = recorder();

    scheduler.start(PROXY_A, callback);
    let manual = scheduler.trigger_now();
    tokio::time::sleep(Duration::from_millis(100)).await;
    let result = manual.await.unwrap();
    assert!(!result.success);

    tokio::time::sleep(Duration::from_secs(40)).await;

    // One manual probe plus one scheduled probe, never concurrent
    assert_eq!(seen.lock().unwrap().len(), 2);
    assert_eq!(client.started(), 6);
}
