mod support;

use std::time::Duration;

use bytes::Bytes;
use http::HeaderMap;

use aapns::{Origin, Pool, Request};

use support::{
    certs,
    server::{self, Action, ServerSettings},
};

#[tokio::test]
async fn concurrent_requests_spread_across_the_pool() {
    let fake = server::start(certs::server_tls_config(), ServerSettings::default(), |_req| {
        Action::Respond {
            status: 200,
            apns_id: "ok",
            body: Vec::new(),
        }
    })
    .await;

    let origin = Origin::custom("127.0.0.1", fake.addr.port());
    let pool = Pool::create(origin, 2, certs::client_tls_config())
        .await
        .expect("pool created");

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move {
            let request = Request::new("/3/device/abc", HeaderMap::new(), Bytes::new());
            pool.post(request).await
        }));
    }
    for task in tasks {
        task.await.expect("task join").expect("post succeeds");
    }

    assert_eq!(pool.completed(), 20);
    assert_eq!(pool.errors(), 0);
    pool.close().await;
}

/// A server that only admits one concurrent stream forces every request
/// past the first to see `h2`'s readiness future stay pending, which our
/// connection reports as `Blocked` — this checks the pool retries those
/// transparently instead of surfacing the refusal to the caller.
#[tokio::test]
async fn backpressure_from_max_concurrent_streams_retries_transparently() {
    let settings = ServerSettings {
        max_concurrent_streams: Some(1),
    };
    let fake = server::start(certs::server_tls_config(), settings, |_req| Action::Respond {
        status: 200,
        apns_id: "ok",
        body: Vec::new(),
    })
    .await;

    let origin = Origin::custom("127.0.0.1", fake.addr.port());
    let pool = Pool::create(origin, 1, certs::client_tls_config())
        .await
        .expect("pool created");

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let pool = pool.clone();
        tasks.push(tokio::spawn(async move {
            let request = Request::new("/3/device/abc", HeaderMap::new(), Bytes::new());
            pool.post(request).await
        }));
    }
    for task in tasks {
        task.await
            .expect("task join")
            .expect("post eventually succeeds despite single-stream backpressure");
    }

    assert_eq!(pool.completed(), 8);
    assert_eq!(pool.errors(), 0);
    pool.close().await;
}

#[tokio::test]
async fn bad_certificate_environment_closes_the_whole_pool() {
    let fake = server::start(certs::server_tls_config(), ServerSettings::default(), |_req| {
        Action::Respond {
            status: 403,
            apns_id: "err",
            body: br#"{"reason":"BadCertificateEnvironment"}"#.to_vec(),
        }
    })
    .await;

    let origin = Origin::custom("127.0.0.1", fake.addr.port());
    let pool = Pool::create(origin, 2, certs::client_tls_config())
        .await
        .expect("pool created");

    let request = Request::new("/3/device/abc", HeaderMap::new(), Bytes::new());
    let _ = pool.post(request).await;

    // The connection notices BadCertificateEnvironment immediately; the
    // pool's maintenance loop only lifts it up to pool level on its next
    // tick (at most MAINTENANCE_TICK later), so poll for it.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while pool.outcome().is_none() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    assert_eq!(pool.outcome().as_deref(), Some("BadCertificateEnvironment"));

    let request = Request::new("/3/device/abc", HeaderMap::new(), Bytes::new());
    let err = pool
        .post(request)
        .await
        .expect_err("the pool is closing and must refuse new work");
    assert!(err.is_terminal());
}
