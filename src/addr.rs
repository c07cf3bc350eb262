use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::conn::ConnError;
use crate::frame::Method;

/// Default controller address (the ESP soft-AP gateway).
pub const DEFAULT_ADDR: &str = "192.168.4.1";

/// Named HTTP resources served by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Stats,
    ErrorCodes,
    DebugMsg,
    CourseState,
    ResetStats,
    DispenseBall,
    Settings,
    ClearSequence,
    Ping,
}

impl Resource {
    pub const ALL: [Resource; 9] = [
        Self::Stats,
        Self::ErrorCodes,
        Self::DebugMsg,
        Self::CourseState,
        Self::ResetStats,
        Self::DispenseBall,
        Self::Settings,
        Self::ClearSequence,
        Self::Ping,
    ];

    /// Path segment relative to the controller root.
    pub fn path(self) -> &'static str {
        match self {
            Self::Stats => "stats",
            Self::ErrorCodes => "error_codes",
            Self::DebugMsg => "debug_msg",
            Self::CourseState => "course_state",
            Self::ResetStats => "reset_stats",
            Self::DispenseBall => "dispense_ball",
            Self::Settings => "settings",
            Self::ClearSequence => "clear_sequence",
            Self::Ping => "ping",
        }
    }

    pub fn method(self) -> Method {
        match self {
            Self::Stats | Self::ErrorCodes | Self::DebugMsg | Self::Ping => Method::Get,
            Self::CourseState
            | Self::ResetStats
            | Self::DispenseBall
            | Self::Settings
            | Self::ClearSequence => Method::Post,
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.path())
    }
}

/// Shared handle to the controller's network address.
///
/// Clones observe the same address. Every URL is built from the address at
/// the time of the call, and a swap via [`set_address`](Self::set_address) is
/// atomic for readers.
#[derive(Debug, Clone)]
pub struct Endpoint {
    address: Arc<RwLock<String>>,
}

impl Endpoint {
    pub fn new(address: &str) -> Result<Self, ConnError> {
        validate(address)?;
        Ok(Self {
            address: Arc::new(RwLock::new(address.trim().to_string())),
        })
    }

    /// Replace the controller address. Rejects empty or malformed input and
    /// leaves the previous address in place.
    pub fn set_address(&self, address: &str) -> Result<(), ConnError> {
        validate(address)?;
        let mut guard = self.address.write().unwrap_or_else(PoisonError::into_inner);
        *guard = address.trim().to_string();
        Ok(())
    }

    pub fn address(&self) -> String {
        self.address.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Base URL, e.g. `http://192.168.4.1/`.
    pub fn base_url(&self) -> String {
        format!("http://{}/", self.address())
    }

    /// Full URL for a resource, e.g. `http://192.168.4.1/stats`.
    pub fn url(&self, resource: Resource) -> String {
        format!("http://{}/{}", self.address(), resource.path())
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            address: Arc::new(RwLock::new(DEFAULT_ADDR.to_string())),
        }
    }
}

fn validate(address: &str) -> Result<(), ConnError> {
    let trimmed = address.trim();
    let reason = if trimmed.is_empty() {
        "address cannot be empty"
    } else if trimmed.contains("://") {
        "address must not include a scheme"
    } else if trimmed.contains('/') {
        "address must not include a path"
    } else if trimmed.chars().any(char::is_whitespace) {
        "address must not contain whitespace"
    } else if !trimmed.starts_with('[') && trimmed.matches(':').count() > 1 {
        "IPv6 addresses must be bracketed"
    } else {
        return Ok(());
    };
    Err(ConnError::InvalidAddress {
        address: address.to_string(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_table() {
        let paths: Vec<&str> = Resource::ALL.iter().map(|r| r.path()).collect();
        assert_eq!(
            paths,
            [
                "stats",
                "error_codes",
                "debug_msg",
                "course_state",
                "reset_stats",
                "dispense_ball",
                "settings",
                "clear_sequence",
                "ping"
            ]
        );
        assert_eq!(Resource::Ping.method(), Method::Get);
        assert_eq!(Resource::CourseState.method(), Method::Post);
        assert_eq!(Resource::Stats.to_string(), "/stats");
    }

    #[test]
    fn default_urls() {
        let ep = Endpoint::default();
        assert_eq!(ep.base_url(), "http://192.168.4.1/");
        assert_eq!(ep.url(Resource::Stats), "http://192.168.4.1/stats");
    }

    #[test]
    fn set_address_rebuilds_urls() {
        let ep = Endpoint::default();
        let shared = ep.clone();
        ep.set_address("10.0.0.31:8080").unwrap();
        assert_eq!(shared.url(Resource::Ping), "http://10.0.0.31:8080/ping");
    }

    #[test]
    fn ipv6_addresses_resolve_to_targets() {
        let ep = Endpoint::default();
        ep.set_address("[::1]").unwrap();
        let target = crate::frame::Target::parse(&ep.url(Resource::Ping)).unwrap();
        assert_eq!(target.host, "[::1]");
        assert_eq!(target.port, 80);

        ep.set_address("[fe80::2]:8080").unwrap();
        let target = crate::frame::Target::parse(&ep.url(Resource::Stats)).unwrap();
        assert_eq!(target.port, 8080);
    }

    #[test]
    fn rejects_bad_addresses() {
        let ep = Endpoint::default();
        for bad in ["", "   ", "http://10.0.0.1", "10.0.0.1/stats", "10.0 .0.1", "fe80::1"] {
            assert!(
                matches!(ep.set_address(bad), Err(ConnError::InvalidAddress { .. })),
                "{bad:?} should be rejected"
            );
        }
        assert_eq!(ep.address(), DEFAULT_ADDR);
        assert!(Endpoint::new("").is_err());
    }
}
