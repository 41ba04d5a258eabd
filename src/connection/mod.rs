//! A single HTTP/2 connection to one APNs origin.
//!
//! `Connection` owns one `h2` client session: a [`Pool`](crate::Pool) dials,
//! keeps, and retires these, multiplexing many concurrent `post` calls over
//! each one. `h2` already does HEADERS/DATA/RST_STREAM dispatch internally,
//! so the per-stream bookkeeping here is a direct async function rather than
//! the explicit event table a hand-rolled HTTP/2 stack would need.

mod keepalive;

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use bytes::{Bytes, BytesMut};
use h2::client::ResponseFuture;
use tokio::{sync::Notify, task::JoinHandle};

use crate::{
    config::Origin,
    connect,
    error::{Error, Result},
    reason::ApnsReason,
    request::Request,
    response::Response,
};

const MAX_RESPONSE_BODY: usize = 64 * 1024;
const CLOSE_GRACE: Duration = Duration::from_secs(2);

/// State shared between `Connection`'s own methods, its driver task, and its
/// keepalive task. Plain (non-`pub`) fields are visible to the `keepalive`
/// submodule too — Rust lets descendants see an ancestor module's privates.
struct Shared {
    closing: AtomicBool,
    closed: AtomicBool,
    outcome: Mutex<Option<String>>,
    buffered: AtomicUsize,
    inflight: AtomicUsize,
}

impl Shared {
    /// Transitions to closing exactly once, recording `outcome` only if
    /// nothing else already claimed it, then wakes every pending stream
    /// racing on `notify` so they fail fast with `Blocked`.
    fn mark_closing(&self, outcome: impl Into<String>, notify: &Notify) {
        let was_closing = self.closing.swap(true, Ordering::SeqCst);
        if !was_closing {
            let mut guard = self.outcome.lock().unwrap();
            if guard.is_none() {
                *guard = Some(outcome.into());
            }
        }
        notify.notify_waiters();
    }
}

/// One live HTTP/2 session. Cheap to hold behind an `Arc` — cloning the
/// inner `h2::client::SendRequest` handle is how concurrent `post` calls
/// share the connection.
pub struct Connection {
    shared: Arc<Shared>,
    closing_notify: Arc<Notify>,
    send_request: h2::client::SendRequest<Bytes>,
    authority: String,
    driver: Mutex<Option<JoinHandle<()>>>,
    keepalive: Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    /// Dials `origin`, completes the TLS + HTTP/2 handshake, and spawns the
    /// connection's driver and keepalive tasks. Fails with a `Closed` error
    /// if any handshake step fails.
    pub async fn create(origin: Origin, tls_config: Arc<rustls::ClientConfig>) -> Result<Connection> {
        let tls_stream = connect::dial(&origin, tls_config).await?;

        let (send_request, mut connection) = h2::client::Builder::new()
            .enable_push(false)
            .handshake(tls_stream)
            .await
            .map_err(|e| Error::closed(describe_h2_error(&e)))?;

        let ping_pong = connection
            .ping_pong()
            .expect("ping_pong is taken at most once, right after the handshake");

        let shared = Arc::new(Shared {
            closing: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            outcome: Mutex::new(None),
            buffered: AtomicUsize::new(0),
            inflight: AtomicUsize::new(0),
        });
        let closing_notify = Arc::new(Notify::new());

        let driver = tokio::spawn({
            let shared = shared.clone();
            let closing_notify = closing_notify.clone();
            async move {
                let result = connection.await;
                let outcome = match result {
                    Ok(()) => "Closed".to_owned(),
                    Err(e) => describe_h2_error(&e),
                };
                shared.mark_closing(outcome, &closing_notify);
                shared.closed.store(true, Ordering::SeqCst);
            }
        });

        let keepalive = tokio::spawn(keepalive::run(
            ping_pong,
            shared.clone(),
            keepalive::DEFAULT_IDLE_INTERVAL,
            closing_notify.clone(),
        ));

        log::debug!(target: "aapns::connection", "connected to {origin}");

        Ok(Connection {
            shared,
            closing_notify,
            send_request,
            authority: origin.host().to_owned(),
            driver: Mutex::new(Some(driver)),
            keepalive: Mutex::new(Some(keepalive)),
        })
    }

    /// Sends one request over this connection.
    ///
    /// Fails fast with `Blocked` if the connection is closing, or if
    /// admitting this stream would exceed the peer's `max_concurrent_streams`
    /// (checked with a zero-duration poll of `h2`'s own readiness future,
    /// rather than waiting for capacity — a blocked request should go try
    /// another connection, not queue here).
    pub async fn post(&self, req: Request) -> Result<Response> {
        if req.has_expired() {
            return Err(Error::timeout());
        }
        if self.shared.closing.load(Ordering::SeqCst) {
            return Err(Error::blocked());
        }

        let mut send_request = self.send_request.clone();
        match tokio::time::timeout(Duration::ZERO, send_request.ready()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(Error::closed(describe_h2_error(&e))),
            Err(_elapsed) => return Err(Error::blocked()),
        }

        self.shared.buffered.fetch_add(1, Ordering::SeqCst);
        let http_request = match build_http_request(&self.authority, &req) {
            Ok(r) => r,
            Err(e) => {
                self.shared.buffered.fetch_sub(1, Ordering::SeqCst);
                return Err(e);
            }
        };

        let (response_future, send_stream) = match send_request.send_request(http_request, false) {
            Ok(pair) => pair,
            Err(e) => {
                self.shared.buffered.fetch_sub(1, Ordering::SeqCst);
                return Err(Error::closed(describe_h2_error(&e)));
            }
        };
        self.shared.buffered.fetch_sub(1, Ordering::SeqCst);
        self.shared.inflight.fetch_add(1, Ordering::SeqCst);
        let _inflight_guard = DecrementOnDrop(&self.shared.inflight);

        let mut guard = ResetOnDrop::new(send_stream);
        if let Err(e) = guard.send_data(req.body.clone(), true) {
            return Err(Error::format(e));
        }

        // `mark_closing` only wakes waiters already registered on
        // `closing_notify` at the moment it runs, so a transition that lands
        // in the window between the admission check above and here would
        // otherwise go unseen until the request's own deadline. Re-checking
        // the flag directly closes nearly all of that window; `guard`
        // dropping here still resets the stream we just opened.
        if self.shared.closing.load(Ordering::SeqCst) {
            return Err(Error::blocked());
        }

        let deadline = tokio::time::Instant::from_std(req.deadline());
        let outcome = tokio::select! {
            res = drive_response(response_future, &self.shared, &self.closing_notify) => res,
            _ = self.closing_notify.notified() => Err(Error::blocked()),
            _ = tokio::time::sleep_until(deadline) => Err(Error::timeout()),
        };

        match outcome {
            Ok((status, apns_id, body)) => {
                guard.disarm();
                if status == 200 {
                    Ok(Response::new(apns_id, status, body))
                } else {
                    let reason = parse_reason(&body);
                    if reason.is_bad_certificate_environment() {
                        self.shared
                            .mark_closing("BadCertificateEnvironment", &self.closing_notify);
                    }
                    Err(Error::apns(reason, apns_id))
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Stops admitting new requests, gives inflight streams a brief grace
    /// period to finish, then tears down the transport. Idempotent: a second
    /// call is a no-op beyond re-observing the already-recorded outcome.
    pub async fn close(&self) {
        self.shared.mark_closing("Closed", &self.closing_notify);

        let grace_deadline = tokio::time::Instant::now() + CLOSE_GRACE;
        while self.channels() > 0 && tokio::time::Instant::now() < grace_deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        if let Some(handle) = self.driver.lock().unwrap().take() {
            handle.abort();
        }
        if let Some(handle) = self.keepalive.lock().unwrap().take() {
            handle.abort();
        }
        self.shared.closed.store(true, Ordering::SeqCst);
    }

    pub fn closing(&self) -> bool {
        self.shared.closing.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// The recorded reason the connection became closing, if any.
    pub fn outcome(&self) -> Option<String> {
        self.shared.outcome.lock().unwrap().clone()
    }

    /// Total open streams: reserved-but-not-yet-sent plus inflight.
    pub fn channels(&self) -> usize {
        self.buffered() + self.inflight()
    }

    pub fn inflight(&self) -> usize {
        self.shared.inflight.load(Ordering::SeqCst)
    }

    pub fn buffered(&self) -> usize {
        self.shared.buffered.load(Ordering::SeqCst)
    }
}

struct DecrementOnDrop<'a>(&'a AtomicUsize);

impl Drop for DecrementOnDrop<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Sends `RST_STREAM(CANCEL)` unless [`disarm`](ResetOnDrop::disarm) ran
/// first — covers both our own deadline/closing races and the caller simply
/// dropping the `post` future mid-flight.
struct ResetOnDrop {
    stream: Option<h2::SendStream<Bytes>>,
}

impl ResetOnDrop {
    fn new(stream: h2::SendStream<Bytes>) -> Self {
        ResetOnDrop {
            stream: Some(stream),
        }
    }

    fn send_data(&mut self, data: Bytes, end_of_stream: bool) -> std::result::Result<(), h2::Error> {
        self.stream
            .as_mut()
            .expect("not yet disarmed")
            .send_data(data, end_of_stream)
    }

    fn disarm(mut self) {
        self.stream = None;
    }
}

impl Drop for ResetOnDrop {
    fn drop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.send_reset(h2::Reason::CANCEL);
        }
    }
}

async fn drive_response(
    response_future: ResponseFuture,
    shared: &Shared,
    closing_notify: &Notify,
) -> Result<(u16, String, Bytes)> {
    let response = response_future
        .await
        .map_err(|e| translate_h2_error(e, shared, closing_notify))?;

    let status = response.status().as_u16();
    let apns_id = response
        .headers()
        .get("apns-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();

    let mut recv_stream = response.into_body();
    let mut body = BytesMut::new();
    while let Some(chunk) = recv_stream.data().await {
        let chunk = chunk.map_err(|e| translate_h2_error(e, shared, closing_notify))?;
        if body.len() + chunk.len() > MAX_RESPONSE_BODY {
            return Err(Error::response_too_large());
        }
        let len = chunk.len();
        body.extend_from_slice(&chunk);
        let _ = recv_stream.flow_control().release_capacity(len);
    }

    Ok((status, apns_id, body.freeze()))
}

/// Turns an `h2::Error` surfaced mid-stream into our taxonomy. A handful of
/// reset reasons mean the whole session is compromised (the peer is telling
/// us something is wrong with the connection, not just this stream) and are
/// promoted to closing the connection; everything else — including a plain
/// `CANCEL`, which APNs servers use for ordinary backpressure — becomes a
/// `StreamReset` carrying the reset code, which the pool treats the same as
/// `Blocked` and retries elsewhere.
fn translate_h2_error(e: h2::Error, shared: &Shared, closing_notify: &Notify) -> Error {
    match e.reason() {
        Some(reason) if is_session_fatal(reason) => {
            let outcome = format!("stream-reset:{reason:?}");
            shared.mark_closing(outcome.clone(), closing_notify);
            Error::closed(outcome)
        }
        Some(reason) => Error::stream_reset(format!("{reason:?}")),
        None => Error::format(e),
    }
}

fn is_session_fatal(reason: h2::Reason) -> bool {
    matches!(
        reason,
        h2::Reason::PROTOCOL_ERROR
            | h2::Reason::INTERNAL_ERROR
            | h2::Reason::FLOW_CONTROL_ERROR
            | h2::Reason::CONNECT_ERROR
    )
}

fn describe_h2_error(e: &h2::Error) -> String {
    match e.reason() {
        Some(reason) => format!("{reason:?}"),
        None => e.to_string(),
    }
}

fn build_http_request(authority: &str, req: &Request) -> Result<http::Request<()>> {
    let uri: http::Uri = format!("https://{authority}{}", req.path())
        .parse()
        .map_err(Error::builder)?;

    let mut builder = http::Request::builder()
        .method(http::Method::POST)
        .uri(uri)
        .version(http::Version::HTTP_2)
        .header(http::header::CONTENT_LENGTH, req.body.len());

    for (name, value) in req.headers.iter() {
        builder = builder.header(name, value);
    }

    builder.body(()).map_err(Error::builder)
}

fn parse_reason(body: &Bytes) -> ApnsReason {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        reason: String,
    }

    serde_json::from_slice::<ErrorBody>(body)
        .map(|b| ApnsReason::parse(&b.reason))
        .unwrap_or_else(|_| ApnsReason::Unknown(String::from_utf8_lossy(body).into_owned()))
}
