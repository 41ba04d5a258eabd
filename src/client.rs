//! The public client facade: pairs a [`Pool`] with the per-notification
//! `apns-*` header wiring, so callers work with a device token and a
//! [`Notification`] instead of building requests by hand.

use std::sync::Arc;

use http::{HeaderMap, HeaderValue};

use crate::{
    config::{Origin, Priority},
    error::{Error, Result},
    notification::Notification,
    pool::Pool,
    request::Request,
    tls::{self, Identity},
};

/// Per-call overrides for the `apns-*` headers APNs reads alongside the
/// payload. Everything defaults to "not set"; `priority` defaults to
/// [`Priority::Normal`].
#[derive(Debug, Clone, Default)]
pub struct NotificationOptions {
    apns_id: Option<String>,
    expiration: Option<i64>,
    priority: Priority,
    topic: Option<String>,
    collapse_id: Option<String>,
}

impl NotificationOptions {
    pub fn new() -> NotificationOptions {
        NotificationOptions::default()
    }

    /// A caller-supplied `apns-id`; APNs generates one if this is unset.
    pub fn apns_id(mut self, apns_id: impl Into<String>) -> Self {
        self.apns_id = Some(apns_id.into());
        self
    }

    /// Unix epoch seconds after which APNs should stop trying to deliver.
    pub fn expiration(mut self, expiration: i64) -> Self {
        self.expiration = Some(expiration);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn collapse_id(mut self, collapse_id: impl Into<String>) -> Self {
        self.collapse_id = Some(collapse_id.into());
        self
    }
}

/// An APNs client: one certificate identity, one origin, one connection pool.
pub struct Client {
    pool: Arc<Pool>,
}

impl Client {
    /// Loads `identity`, dials `pool_size` connections to `origin`, and
    /// starts the pool's maintenance loop.
    pub async fn connect(identity: Identity, origin: Origin, pool_size: usize) -> Result<Client> {
        let tls_config = tls::client_config(identity)?;
        let pool = Pool::create(origin, pool_size, tls_config).await?;
        Ok(Client { pool })
    }

    /// Sends `notification` to `device_token`, returning the `apns-id` APNs
    /// (or the caller, via `options`) assigned the request.
    pub async fn send_notification(
        &self,
        device_token: &str,
        notification: Notification,
        options: NotificationOptions,
    ) -> Result<String> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apns-push-type",
            HeaderValue::from_static(notification.push_type().header_value()),
        );
        headers.insert(
            "apns-priority",
            HeaderValue::from_static(options.priority.header_value()),
        );
        if let Some(apns_id) = &options.apns_id {
            headers.insert("apns-id", HeaderValue::from_str(apns_id).map_err(Error::builder)?);
        }
        if let Some(expiration) = options.expiration {
            headers.insert(
                "apns-expiration",
                HeaderValue::from_str(&expiration.to_string()).map_err(Error::builder)?,
            );
        }
        if let Some(topic) = &options.topic {
            headers.insert("apns-topic", HeaderValue::from_str(topic).map_err(Error::builder)?);
        }
        if let Some(collapse_id) = &options.collapse_id {
            headers.insert(
                "apns-collapse-id",
                HeaderValue::from_str(collapse_id).map_err(Error::builder)?,
            );
        }

        let path = format!("/3/device/{device_token}");
        let request = Request::new(path, headers, notification.encode());
        let response = self.pool.post(request).await?;
        Ok(response.apns_id().to_owned())
    }

    /// Stops admitting new requests and closes every connection. Idempotent.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}
