//! APNs origins, ports, and notification priority.

use std::fmt;

/// Which APNs environment a connection talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Sandbox,
}

impl Environment {
    fn host(self) -> &'static str {
        match self {
            Environment::Production => "api.push.apple.com",
            Environment::Sandbox => "api.development.push.apple.com",
        }
    }
}

/// The default TLS port.
pub const DEFAULT_PORT: u16 = 443;
/// The alternate port APNs also accepts connections on.
pub const ALT_PORT: u16 = 2197;

/// An origin a [`Pool`](crate::Pool) maintains connections to: a host and port pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub(crate) host: String,
    pub(crate) port: u16,
}

impl Origin {
    /// The given environment's host on the default port 443.
    pub fn new(environment: Environment) -> Origin {
        Origin {
            host: environment.host().to_owned(),
            port: DEFAULT_PORT,
        }
    }

    /// The given environment's host on the alternate port 2197.
    pub fn new_alt_port(environment: Environment) -> Origin {
        Origin {
            host: environment.host().to_owned(),
            port: ALT_PORT,
        }
    }

    /// An arbitrary host/port, for tests and non-standard deployments.
    pub fn custom(host: impl Into<String>, port: u16) -> Origin {
        Origin {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// The `apns-priority` header value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// `apns-priority: 5` — deliver at a time that conserves power on the device.
    Normal,
    /// `apns-priority: 10` — deliver immediately.
    Immediately,
}

impl Priority {
    pub(crate) fn header_value(self) -> &'static str {
        match self {
            Priority::Normal => "5",
            Priority::Immediately => "10",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}
