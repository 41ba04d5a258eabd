//! An APNs (Apple Push Notification service) client over HTTP/2, with
//! TLS client-certificate authentication and a self-healing connection pool.
//!
//! The pieces, bottom-up:
//!
//! - [`tls::Identity`] loads a client certificate and key.
//! - [`connection::Connection`] drives one HTTP/2 session and its streams.
//! - [`Pool`] keeps a target number of connections alive, retrying `post`
//!   across them.
//! - [`Client`] wires a [`Notification`] into the right `apns-*` headers and
//!   posts it through a pool.
//!
//! Most callers only need [`Client`]; the lower layers are public for
//! anyone who wants pool or connection behavior without the header wiring.

pub mod client;
pub mod config;
mod connect;
pub mod connection;
mod error;
pub mod notification;
pub mod pool;
mod reason;
pub mod request;
pub mod response;
pub mod tls;

pub use client::{Client, NotificationOptions};
pub use config::{Environment, Origin, Priority};
pub use connection::Connection;
pub use error::{Error, Result};
pub use notification::{Alert, Notification, PushType};
pub use pool::Pool;
pub use reason::ApnsReason;
pub use request::Request;
pub use response::Response;
pub use tls::Identity;
