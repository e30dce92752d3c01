//! End-to-end tests: client → proxy → retry queue → mock upstream.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use futures_util::future::join_all;
use reqwest::StatusCode;
use sdk_rust::{ClientError, ProxyClient};

mod common;

#[tokio::test]
async fn test_retry_until_success() {
    let backend_addr: SocketAddr = "127.0.0.1:29181".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:29182".parse().unwrap();

    let call_count = Arc::new(AtomicU32::new(0));
    let cc = call_count.clone();
    common::start_programmable_backend(backend_addr, move || {
        let cc = cc.clone();
        async move {
            if cc.fetch_add(1, Ordering::SeqCst) < 2 {
                (503, "Service Unavailable".into())
            } else {
                (200, "Success".into())
            }
        }
    })
    .await;

    let (shutdown, _config_tx) =
        common::start_proxy(common::proxy_config(proxy_addr, backend_addr)).await;
    let client = ProxyClient::new(&format!("http://{}", proxy_addr));

    let res = client.fetch("/items/1").await.expect("proxy unreachable");
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, "Success");
    assert_eq!(call_count.load(Ordering::SeqCst), 3);

    let status = client.queue_status().await.unwrap();
    assert_eq!(status.failure_count, 1);
    assert_eq!(status.in_flight, 0);
    assert_eq!(status.next_index, 1);

    shutdown.trigger();
}

#[tokio::test]
async fn test_exhaustion_surfaces_as_503() {
    let backend_addr: SocketAddr = "127.0.0.1:29281".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:29282".parse().unwrap();

    let call_count = Arc::new(AtomicU32::new(0));
    let cc = call_count.clone();
    common::start_programmable_backend(backend_addr, move || {
        let cc = cc.clone();
        async move {
            cc.fetch_add(1, Ordering::SeqCst);
            (500, "broken".into())
        }
    })
    .await;

    let mut config = common::proxy_config(proxy_addr, backend_addr);
    config.queue.max_retries_per_window = 3;
    let (shutdown, _config_tx) = common::start_proxy(config).await;
    let client = ProxyClient::new(&format!("http://{}", proxy_addr));

    match client.fetch("/always-broken").await {
        Err(ClientError::Proxy { status, attempts, error }) => {
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
            assert_eq!(attempts, Some(4));
            assert!(error.contains("max retries exceeded"), "got: {error}");
        }
        other => panic!("expected exhaustion, got {:?}", other),
    }
    assert_eq!(call_count.load(Ordering::SeqCst), 4);

    let status = client.queue_status().await.unwrap();
    assert_eq!(status.tracked_records, 0);
    assert_eq!(status.in_flight, 0);

    shutdown.trigger();
}

#[tokio::test]
async fn test_client_errors_pass_through_without_retry() {
    let backend_addr: SocketAddr = "127.0.0.1:29381".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:29382".parse().unwrap();

    let call_count = Arc::new(AtomicU32::new(0));
    let cc = call_count.clone();
    common::start_programmable_backend(backend_addr, move || {
        let cc = cc.clone();
        async move {
            cc.fetch_add(1, Ordering::SeqCst);
            (404, "no such item".into())
        }
    })
    .await;

    let (shutdown, _config_tx) =
        common::start_proxy(common::proxy_config(proxy_addr, backend_addr)).await;
    let client = ProxyClient::new(&format!("http://{}", proxy_addr));

    let res = client.fetch("/items/404").await.unwrap();
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body, "no such item");
    assert_eq!(call_count.load(Ordering::SeqCst), 1);

    shutdown.trigger();
}

#[tokio::test]
async fn test_throttling_upstream_serves_every_queued_request() {
    let backend_addr: SocketAddr = "127.0.0.1:29481".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:29482".parse().unwrap();

    let in_flight = Arc::new(AtomicUsize::new(0));
    let served = Arc::new(AtomicUsize::new(0));
    let (inf, srv) = (in_flight.clone(), served.clone());
    common::start_programmable_backend(backend_addr, move || {
        let (inf, srv) = (inf.clone(), srv.clone());
        async move {
            if inf.fetch_add(1, Ordering::SeqCst) >= 5 {
                inf.fetch_sub(1, Ordering::SeqCst);
                return (429, "slow down".into());
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            inf.fetch_sub(1, Ordering::SeqCst);
            srv.fetch_add(1, Ordering::SeqCst);
            (200, "ok".into())
        }
    })
    .await;

    let (shutdown, _config_tx) =
        common::start_proxy(common::proxy_config(proxy_addr, backend_addr)).await;

    let client = reqwest::Client::new();
    let direct = join_all((0..200).map(|_| {
        client.get(format!("http://{}/direct", backend_addr)).send()
    }))
    .await;
    let direct_rejected = direct
        .iter()
        .filter(|r| !matches!(r, Ok(res) if res.status().is_success()))
        .count();
    assert!(direct_rejected > 0, "direct calls should be throttled");
    served.store(0, Ordering::SeqCst);

    let queued = join_all((0..200).map(|i| {
        client
            .get(format!("http://{}/api/v1/upstream/job/{}", proxy_addr, i))
            .send()
    }))
    .await;
    let ok = queued
        .iter()
        .filter(|r| matches!(r, Ok(res) if res.status() == StatusCode::OK))
        .count();
    assert_eq!(ok, 200, "every queued request should eventually succeed");
    assert_eq!(served.load(Ordering::SeqCst), 200);

    shutdown.trigger();
}

#[tokio::test]
async fn test_reload_switches_upstream() {
    let first_addr: SocketAddr = "127.0.0.1:29581".parse().unwrap();
    let second_addr: SocketAddr = "127.0.0.1:29582".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:29583".parse().unwrap();

    common::start_programmable_backend(first_addr, || async { (200, "first".into()) }).await;
    common::start_programmable_backend(second_addr, || async { (200, "second".into()) }).await;

    let config = common::proxy_config(proxy_addr, first_addr);
    let (shutdown, config_tx) = common::start_proxy(config.clone()).await;
    let client = ProxyClient::new(&format!("http://{}", proxy_addr));

    assert_eq!(client.fetch("/").await.unwrap().body, "first");

    let mut updated = config;
    updated.upstream.base_url = format!("http://{}", second_addr);
    config_tx.send(updated).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(client.fetch("/").await.unwrap().body, "second");
    let status = client.queue_status().await.unwrap();
    assert_eq!(status.upstream, format!("http://{}/", second_addr));

    shutdown.trigger();
}

#[tokio::test]
async fn test_health_endpoint() {
    let backend_addr: SocketAddr = "127.0.0.1:29681".parse().unwrap();
    let proxy_addr: SocketAddr = "127.0.0.1:29682".parse().unwrap();

    let (shutdown, _config_tx) =
        common::start_proxy(common::proxy_config(proxy_addr, backend_addr)).await;
    let client = ProxyClient::new(&format!("http://{}", proxy_addr));

    let health = client.health().await.unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));

    shutdown.trigger();
}
