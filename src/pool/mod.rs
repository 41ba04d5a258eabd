//! A fixed-size connection pool with automatic replacement.
//!
//! `Pool` owns a target number of [`Connection`]s to one [`Origin`], retries
//! `post` across them with [`backoff::Backoff`], and runs a maintenance loop
//! that reaps dying connections and refills the active set back to target.

mod backoff;

use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use rand::seq::SliceRandom;
use tokio::{sync::Notify, task::JoinHandle};

use crate::{
    config::Origin,
    connection::Connection,
    error::{Error, Result},
    request::Request,
    response::Response,
};

const MAINTENANCE_TICK: Duration = Duration::from_secs(1);

/// A pool of HTTP/2 connections to one origin, retried across and kept at a
/// target size.
pub struct Pool {
    origin: Origin,
    tls_config: Arc<rustls::ClientConfig>,
    size: AtomicUsize,
    active: Mutex<Vec<Arc<Connection>>>,
    dying: Mutex<Vec<Arc<Connection>>>,
    closing: AtomicBool,
    closed: AtomicBool,
    outcome: Mutex<Option<String>>,
    errors: AtomicU64,
    retrying: AtomicU64,
    completed: AtomicU64,
    maintenance_needed: Notify,
    maintenance: Mutex<Option<JoinHandle<()>>>,
}

impl Pool {
    /// Dials `size` connections to `origin` concurrently and starts the
    /// maintenance loop. Fails if `size` is zero, or if any of the initial
    /// connections fails to come up.
    pub async fn create(
        origin: Origin,
        size: usize,
        tls_config: Arc<rustls::ClientConfig>,
    ) -> Result<Arc<Pool>> {
        if size == 0 {
            return Err(Error::builder("connection pool size must be strictly positive"));
        }

        let mut handles = Vec::with_capacity(size);
        for _ in 0..size {
            handles.push(tokio::spawn(Connection::create(
                origin.clone(),
                tls_config.clone(),
            )));
        }

        let mut active = Vec::with_capacity(size);
        let mut first_error = None;
        for handle in handles {
            match handle.await {
                Ok(Ok(connection)) => active.push(Arc::new(connection)),
                Ok(Err(e)) => {
                    first_error.get_or_insert(e);
                }
                Err(join_err) => {
                    first_error.get_or_insert(Error::builder(join_err));
                }
            }
        }

        if let Some(e) = first_error {
            for connection in active {
                connection.close().await;
            }
            return Err(e);
        }

        let pool = Arc::new(Pool {
            origin,
            tls_config,
            size: AtomicUsize::new(size),
            active: Mutex::new(active),
            dying: Mutex::new(Vec::new()),
            closing: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            outcome: Mutex::new(None),
            errors: AtomicU64::new(0),
            retrying: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            maintenance_needed: Notify::new(),
            maintenance: Mutex::new(None),
        });

        let task_pool = pool.clone();
        let handle = tokio::spawn(async move { task_pool.maintain().await });
        *pool.maintenance.lock().unwrap() = Some(handle);

        Ok(pool)
    }

    /// Changes the target size; the maintenance loop picks this up on its
    /// next tick (woken early via `maintenance_needed`).
    pub fn resize(&self, size: usize) {
        assert!(size > 0, "connection pool size must be strictly positive");
        self.size.store(size, Ordering::SeqCst);
        self.maintenance_needed.notify_one();
    }

    /// Sends `req`, retrying across connections (and, transiently, across
    /// time) until it succeeds, a non-retryable error surfaces, or the
    /// request's own deadline passes.
    pub async fn post(&self, req: Request) -> Result<Response> {
        for delay in backoff::Backoff::new() {
            if self.closing.load(Ordering::SeqCst) {
                return Err(Error::closed(self.outcome_or_default()));
            }

            match self.post_once(&req).await {
                Ok(response) => {
                    self.completed.fetch_add(1, Ordering::SeqCst);
                    return Ok(response);
                }
                Err(e) if e.is_blocked() => {}
                Err(e) => {
                    self.errors.fetch_add(1, Ordering::SeqCst);
                    return Err(e);
                }
            }

            if self.closing.load(Ordering::SeqCst) {
                return Err(Error::closed(self.outcome_or_default()));
            }

            let now = tokio::time::Instant::now();
            let deadline = tokio::time::Instant::from_std(req.deadline());
            if now + delay > deadline {
                self.errors.fetch_add(1, Ordering::SeqCst);
                return Err(Error::timeout());
            }

            self.retrying.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            self.retrying.fetch_sub(1, Ordering::SeqCst);
        }

        unreachable!("the backoff schedule never ends")
    }

    /// One attempt: shuffles the active set (so load spreads evenly and not
    /// every connection expires at the same moment) and tries each in turn
    /// until one accepts the request.
    async fn post_once(&self, req: &Request) -> Result<Response> {
        let mut active: Vec<Arc<Connection>> = self.active.lock().unwrap().clone();
        active.shuffle(&mut rand::thread_rng());

        for connection in active {
            if self.closing.load(Ordering::SeqCst) {
                return Err(Error::closed(self.outcome_or_default()));
            }
            if connection.closed() {
                continue;
            }
            match connection.post(req.clone()).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_blocked() || e.is_closed() => continue,
                Err(e) => return Err(e),
            }
        }

        Err(Error::blocked())
    }

    /// Reaps closing/dead connections, evicts down to target, refills up to
    /// target, and waits (at most a second, or until woken by `resize`) for
    /// the next pass.
    async fn maintain(self: Arc<Pool>) {
        loop {
            if self.closing.load(Ordering::SeqCst) || self.closed.load(Ordering::SeqCst) {
                return;
            }

            self.move_closing_to_dying();
            self.evict_excess().await;
            if self.drain_dying().await {
                return;
            }
            if self.refill().await {
                return;
            }

            let _ = tokio::time::timeout(MAINTENANCE_TICK, self.maintenance_needed.notified()).await;
        }
    }

    fn move_closing_to_dying(&self) {
        let mut active = self.active.lock().unwrap();
        let mut dying = self.dying.lock().unwrap();
        let mut i = 0;
        while i < active.len() {
            if active[i].closing() {
                let connection = active.remove(i);
                self.termination_hook(&connection);
                dying.push(connection);
            } else {
                i += 1;
            }
        }
    }

    async fn evict_excess(&self) {
        loop {
            let target = self.size.load(Ordering::SeqCst);
            let excess = { self.active.lock().unwrap().len() > target };
            if !excess {
                return;
            }
            let connection = { self.active.lock().unwrap().pop() };
            let Some(connection) = connection else {
                return;
            };
            let spawned = connection.clone();
            tokio::spawn(async move { spawned.close().await });
            self.termination_hook(&connection);
            self.dying.lock().unwrap().push(connection);
        }
    }

    /// Drains dying connections that have fully closed or emptied out, and
    /// returns `true` if the caller (the maintenance loop) should stop.
    async fn drain_dying(&self) -> bool {
        let snapshot: Vec<Arc<Connection>> = self.dying.lock().unwrap().clone();
        for connection in snapshot {
            if connection.closed() {
                self.remove_from_dying(&connection);
                self.termination_hook(&connection);
            } else if connection.channels() == 0 {
                self.remove_from_dying(&connection);
                connection.close().await;
                self.termination_hook(&connection);
            }

            if self.closing.load(Ordering::SeqCst) || self.closed.load(Ordering::SeqCst) {
                return true;
            }
        }
        false
    }

    /// Dials enough connections, concurrently, to bring the active set up to
    /// target, the same way `Pool::create` dials its initial set. Failed
    /// dials are logged and simply leave the active set below target until
    /// the next tick. Returns `true` if the caller (the maintenance loop)
    /// should stop because the pool started closing mid-refill.
    async fn refill(&self) -> bool {
        let needed = {
            let active = self.active.lock().unwrap();
            self.size.load(Ordering::SeqCst).saturating_sub(active.len())
        };
        if needed == 0 {
            return false;
        }

        let mut handles = Vec::with_capacity(needed);
        for _ in 0..needed {
            handles.push(tokio::spawn(Connection::create(
                self.origin.clone(),
                self.tls_config.clone(),
            )));
        }

        for handle in handles {
            match handle.await {
                Ok(Ok(connection)) => {
                    let connection = Arc::new(connection);
                    self.active.lock().unwrap().push(connection.clone());
                    self.termination_hook(&connection);
                }
                Ok(Err(e)) => {
                    log::error!(target: "aapns::pool", "failed creating APNs connection: {e}");
                }
                Err(join_err) => {
                    log::error!(target: "aapns::pool", "APNs connection task failed: {join_err}");
                }
            }
        }

        self.closing.load(Ordering::SeqCst) || self.closed.load(Ordering::SeqCst)
    }

    fn remove_from_dying(&self, connection: &Arc<Connection>) {
        self.dying
            .lock()
            .unwrap()
            .retain(|c| !Arc::ptr_eq(c, connection));
    }

    /// Lifts a connection's `BadCertificateEnvironment` outcome to pool
    /// level: one misconfigured certificate means every connection to this
    /// origin is doomed, so the whole pool stops instead of endlessly
    /// reconnecting.
    fn termination_hook(&self, connection: &Connection) {
        let mut outcome = self.outcome.lock().unwrap();
        if outcome.is_none() {
            if let Some(connection_outcome) = connection.outcome() {
                if connection_outcome == "BadCertificateEnvironment" {
                    self.closing.store(true, Ordering::SeqCst);
                    *outcome = Some(connection_outcome);
                }
            }
        }
    }

    fn outcome_or_default(&self) -> String {
        self.outcome
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| "Closed".to_owned())
    }

    /// Stops the maintenance loop and closes every connection. Idempotent.
    pub async fn close(&self) {
        self.closing.store(true, Ordering::SeqCst);
        {
            let mut outcome = self.outcome.lock().unwrap();
            if outcome.is_none() {
                *outcome = Some("Closed".to_owned());
            }
        }

        if let Some(handle) = self.maintenance.lock().unwrap().take() {
            handle.abort();
        }

        let connections: Vec<Arc<Connection>> = {
            let active = self.active.lock().unwrap();
            let dying = self.dying.lock().unwrap();
            active.iter().chain(dying.iter()).cloned().collect()
        };

        let mut handles = Vec::with_capacity(connections.len());
        for connection in connections {
            handles.push(tokio::spawn(async move { connection.close().await }));
        }
        for handle in handles {
            let _ = handle.await;
        }

        self.closed.store(true, Ordering::SeqCst);
    }

    pub fn state(&self) -> &'static str {
        if !self.closing.load(Ordering::SeqCst) {
            "active"
        } else if !self.closed.load(Ordering::SeqCst) {
            "closing"
        } else {
            "closed"
        }
    }

    pub fn outcome(&self) -> Option<String> {
        self.outcome.lock().unwrap().clone()
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::SeqCst)
    }

    pub fn retrying(&self) -> u64 {
        self.retrying.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().unwrap().len()
    }

    pub fn dying_count(&self) -> usize {
        self.dying.lock().unwrap().len()
    }
}
