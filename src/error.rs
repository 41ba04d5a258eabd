use std::{error::Error as StdError, fmt, io};

use crate::reason::ApnsReason;

/// A `Result` alias where the `Err` case is [`aapns::Error`](Error).
pub type Result<T> = std::result::Result<T, Error>;

/// A boxed error type used to carry an arbitrary transport/TLS cause.
pub(crate) type BoxError = Box<dyn StdError + Send + Sync>;

/// The errors that can occur while driving a connection, a pool, or a single
/// `post`.
pub struct Error {
    inner: Box<Inner>,
}

struct Inner {
    kind: Kind,
    source: Option<BoxError>,
}

impl Error {
    fn new<E>(kind: Kind, source: Option<E>) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(Inner {
                kind,
                source: source.map(Into::into),
            }),
        }
    }

    /// A connection or pool local refusal: the caller should retry elsewhere.
    pub(crate) fn blocked() -> Error {
        Error::new(Kind::Blocked, None::<Error>)
    }

    /// The request's own deadline elapsed.
    pub(crate) fn timeout() -> Error {
        Error::new(Kind::Timeout, None::<Error>)
    }

    /// A connection or pool is terminal, with a recorded outcome string.
    pub(crate) fn closed(outcome: impl Into<String>) -> Error {
        Error::new(Kind::Closed(outcome.into()), None::<Error>)
    }

    /// The peer reset the stream; `code` is `h2::Reason`'s debug name.
    pub(crate) fn stream_reset(code: impl Into<String>) -> Error {
        Error::new(Kind::StreamReset(code.into()), None::<Error>)
    }

    /// A response violated the protocol in a way that isn't a logical APNs
    /// error (missing `:status`, oversized body, ...).
    pub(crate) fn format<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::FormatError, Some(e))
    }

    pub(crate) fn response_too_large() -> Error {
        Error::new(Kind::ResponseTooLarge, None::<Error>)
    }

    pub(crate) fn apns(reason: ApnsReason, apns_id: String) -> Error {
        Error::new(Kind::Apns(reason, apns_id), None::<Error>)
    }

    pub(crate) fn tls<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::Tls, Some(e))
    }

    pub(crate) fn io<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::Io, Some(e))
    }

    pub(crate) fn builder<E: Into<BoxError>>(e: E) -> Error {
        Error::new(Kind::Builder, Some(e))
    }

    /// True if this is a [`Kind::Blocked`] refusal, or a [`Kind::StreamReset`]
    /// that isn't session-fatal: either way, the connection or pool that
    /// returned it expects the caller to retry elsewhere.
    pub fn is_blocked(&self) -> bool {
        matches!(self.inner.kind, Kind::Blocked | Kind::StreamReset(_))
    }

    /// True if this is a [`Kind::Closed`] terminal state.
    pub fn is_closed(&self) -> bool {
        matches!(self.inner.kind, Kind::Closed(_))
    }

    /// Returns the `reason` string of a `BadCertificateEnvironment`/logical
    /// APNs error, if this is one.
    pub fn apns_reason(&self) -> Option<&ApnsReason> {
        match &self.inner.kind {
            Kind::Apns(reason, _) => Some(reason),
            _ => None,
        }
    }

    /// Returns the `apns-id` header value carried by a logical APNs error, if any.
    pub fn apns_id(&self) -> Option<&str> {
        match &self.inner.kind {
            Kind::Apns(_, apns_id) => Some(apns_id.as_str()),
            _ => None,
        }
    }

    /// True if the request's own deadline elapsed.
    pub fn is_timeout(&self) -> bool {
        matches!(self.inner.kind, Kind::Timeout)
    }

    /// True if the connection or pool has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self.inner.kind, Kind::Closed(_))
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut builder = f.debug_struct("aapns::Error");
        builder.field("kind", &self.inner.kind);
        if let Some(ref source) = self.inner.source {
            builder.field("source", source);
        }
        builder.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.kind {
            Kind::Blocked => f.write_str("connection refused the request locally (blocked)")?,
            Kind::Timeout => f.write_str("request deadline exceeded")?,
            Kind::Closed(outcome) => write!(f, "closed: {outcome}")?,
            Kind::StreamReset(code) => write!(f, "stream reset by peer: {code}")?,
            Kind::FormatError => f.write_str("malformed response")?,
            Kind::ResponseTooLarge => f.write_str("response body exceeded 64 KiB")?,
            Kind::Apns(reason, apns_id) => {
                write!(f, "APNs error {reason} (apns-id {apns_id})")?
            }
            Kind::Tls => f.write_str("TLS error")?,
            Kind::Io => f.write_str("I/O error")?,
            Kind::Builder => f.write_str("builder error")?,
        }
        if let Some(e) = &self.inner.source {
            write!(f, ": {e}")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|e| &**e as _)
    }
}

#[derive(Debug)]
pub(crate) enum Kind {
    Blocked,
    Timeout,
    Closed(String),
    StreamReset(String),
    FormatError,
    ResponseTooLarge,
    Apns(ApnsReason, String),
    Tls,
    Io,
    Builder,
}
