//! Round-trip tests against an in-process stand-in for the worker.
//!
//! A ROUTER socket bound to a loopback port plays the worker: it reads
//! framed jobs, inspects the payload, and answers with whatever envelope
//! the test scripted.

use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use vigil_core::{
    Credentials, DiscoveryTarget, Error, JobDispatcher, JobRequest, JobStatus, PolledData,
};
use vigil_dispatch::{Dispatcher, DispatcherConfig};

fn target(profile_id: i32) -> DiscoveryTarget {
    DiscoveryTarget {
        profile_id,
        name: format!("device-{profile_id}"),
        ip: "127.0.0.1".parse().unwrap(),
        system_type: "linux".to_string(),
        credentials: json!({"username": "admin", "password": "secret"}),
    }
}

fn creds() -> Credentials {
    Credentials {
        username: "admin".to_string(),
        password: "secret".to_string(),
    }
}

fn test_config(endpoint: String) -> DispatcherConfig {
    DispatcherConfig {
        endpoint,
        tick_interval: Duration::from_millis(10),
        pending_max_age: Duration::from_secs(60),
        awaited_slack: Duration::from_secs(5),
    }
}

/// A scripted worker: for each received job, applies `respond` to the
/// request document and sends back the produced envelopes (zero or more
/// per job, each echoing the request's correlation id unless overridden).
fn spawn_worker_stub<F>(jobs: usize, respond: F) -> (String, std::thread::JoinHandle<()>)
where
    F: Fn(&Value) -> Vec<(Option<String>, Value)> + Send + 'static,
{
    let context = zmq::Context::new();
    let router = context.socket(zmq::ROUTER).unwrap();
    router.bind("tcp://127.0.0.1:*").unwrap();
    let endpoint = router.get_last_endpoint().unwrap().unwrap();

    let handle = std::thread::spawn(move || {
        router.set_rcvtimeo(5_000).unwrap();
        for _ in 0..jobs {
            // DEALER frames [corr, "", payload]; ROUTER prepends identity.
            let frames = router.recv_multipart(0).expect("worker stub timed out");
            assert!(frames.len() >= 3, "unexpected frame count: {}", frames.len());
            let identity = frames[0].clone();
            let correlation_id = frames[1].clone();
            let payload = frames.last().unwrap();
            let request: Value = serde_json::from_slice(payload).unwrap();

            for (corr_override, envelope) in respond(&request) {
                let corr = corr_override
                    .map(|c| c.into_bytes())
                    .unwrap_or_else(|| correlation_id.clone());
                let reply = envelope.to_string().into_bytes();
                let frames: [&[u8]; 4] =
                    [identity.as_slice(), corr.as_slice(), b"", reply.as_slice()];
                router.send_multipart(frames, 0).unwrap();
            }
        }
    });

    (endpoint, handle)
}

#[tokio::test(flavor = "multi_thread")]
async fn test_discovery_reply_completes_the_waiting_caller() {
    let (endpoint, worker) = spawn_worker_stub(1, |request| {
        assert_eq!(request["RequestType"], "discovery");
        assert_eq!(request["SystemType"], "linux");
        vec![(
            None,
            json!({
                "RequestType": "discovery",
                "status": "success",
                "result": {"hostname": "device-7", "os": "linux"}
            }),
        )]
    });

    let (telemetry_tx, _telemetry_rx) = mpsc::channel(16);
    let dispatcher = Dispatcher::start(test_config(endpoint), telemetry_tx).unwrap();

    let request = JobRequest::discovery(&target(7), &creds());
    let reply = dispatcher
        .submit_and_wait(request, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(reply.status, JobStatus::Success);
    assert_eq!(reply.result.unwrap()["hostname"], "device-7");

    worker.join().unwrap();
    dispatcher.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_correlation_id_does_not_disturb_the_real_wait() {
    // The stub answers each job twice: first under a bogus correlation id
    // (must be discarded), then under the real one.
    let (endpoint, worker) = spawn_worker_stub(1, |_| {
        vec![
            (
                Some("no-such-job".to_string()),
                json!({
                    "RequestType": "discovery",
                    "status": "failure",
                    "errors": {"reason": "this reply belongs to nobody"}
                }),
            ),
            (
                None,
                json!({
                    "RequestType": "discovery",
                    "status": "success",
                    "result": {"hostname": "device-7"}
                }),
            ),
        ]
    });

    let (telemetry_tx, _telemetry_rx) = mpsc::channel(16);
    let dispatcher = Dispatcher::start(test_config(endpoint), telemetry_tx).unwrap();

    let request = JobRequest::discovery(&target(7), &creds());
    let reply = dispatcher
        .submit_and_wait(request, Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(reply.status, JobStatus::Success);

    worker.join().unwrap();
    dispatcher.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_provisioning_reply_routes_to_telemetry() {
    let (endpoint, worker) = spawn_worker_stub(1, |request| {
        assert_eq!(request["RequestType"], "provisioning");
        assert_eq!(request["discovery_profile_id"], 4);
        vec![(
            None,
            json!({
                "RequestType": "provisioning",
                "status": "success",
                "result": {"cpu": 12.5, "memory": 48.0},
                "discovery_profile_id": 4
            }),
        )]
    });

    let (telemetry_tx, mut telemetry_rx) = mpsc::channel(16);
    let dispatcher = Dispatcher::start(test_config(endpoint), telemetry_tx).unwrap();

    let request = JobRequest::provisioning(&target(4), &creds());
    let correlation_id = dispatcher.submit(request).await.unwrap();
    assert!(!correlation_id.is_empty());

    let data: PolledData =
        tokio::time::timeout(Duration::from_secs(5), telemetry_rx.recv())
            .await
            .expect("no telemetry within deadline")
            .expect("telemetry channel closed");
    assert_eq!(data.discovery_profile_id, 4);
    assert_eq!(data.payload["cpu"], 12.5);

    worker.join().unwrap();
    dispatcher.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_submissions_get_distinct_correlation_ids() {
    let (endpoint, worker) = spawn_worker_stub(3, |_| Vec::new());

    let (telemetry_tx, _telemetry_rx) = mpsc::channel(16);
    let dispatcher = Dispatcher::start(test_config(endpoint), telemetry_tx).unwrap();

    let mut ids = Vec::new();
    for profile_id in [3, 4, 5] {
        let request = JobRequest::provisioning(&target(profile_id), &creds());
        ids.push(dispatcher.submit(request).await.unwrap());
    }

    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);

    worker.join().unwrap();
    dispatcher.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_silent_worker_times_out_the_caller() {
    // A worker that reads the job but never answers.
    let (endpoint, worker) = spawn_worker_stub(1, |_| Vec::new());

    let (telemetry_tx, _telemetry_rx) = mpsc::channel(16);
    let dispatcher = Dispatcher::start(test_config(endpoint), telemetry_tx).unwrap();

    let request = JobRequest::discovery(&target(7), &creds());
    let err = dispatcher
        .submit_and_wait(request, Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));

    worker.join().unwrap();
    dispatcher.shutdown().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shutdown_cancels_pending_waits() {
    let (endpoint, worker) = spawn_worker_stub(1, |_| Vec::new());

    let (telemetry_tx, _telemetry_rx) = mpsc::channel(16);
    let dispatcher = Dispatcher::start(test_config(endpoint), telemetry_tx).unwrap();

    let request = JobRequest::discovery(&target(7), &creds());
    let waiting = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { dispatcher.submit_and_wait(request, Duration::from_secs(30)).await })
    };

    // Give the submission time to land in the routing table, then stop.
    tokio::time::sleep(Duration::from_millis(100)).await;
    dispatcher.shutdown().await;

    let err = waiting.await.unwrap().unwrap_err();
    assert!(matches!(err, Error::Cancelled));

    worker.join().unwrap();
}
