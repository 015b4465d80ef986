//! Per-click client details: source address anonymization and user-agent
//! classification.

use ipnet::IpNet;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use woothee::parser::Parser;

use crate::models::NewAnalyticsEvent;

/// Stored in place of addresses that cannot be parsed
pub const SENTINEL_ADDRESS: Ipv4Addr = Ipv4Addr::UNSPECIFIED;

const UNKNOWN: &str = "UNKNOWN";

/// Truncates addresses to a network prefix before they are stored
///
/// - IPv4: keep the first `v4_prefix` bits (default /24, last octet zeroed)
/// - IPv6: keep the first `v6_prefix` bits (default /48)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpAnonymizer {
    v4_prefix: u8,
    v6_prefix: u8,
}

impl Default for IpAnonymizer {
    fn default() -> Self {
        Self {
            v4_prefix: 24,
            v6_prefix: 48,
        }
    }
}

impl IpAnonymizer {
    pub fn new(v4_prefix: u8, v6_prefix: u8) -> Self {
        Self {
            v4_prefix: v4_prefix.min(32),
            v6_prefix: v6_prefix.min(128),
        }
    }

    pub fn anonymize_ip(&self, ip: IpAddr) -> IpAddr {
        let prefix = match ip {
            IpAddr::V4(_) => self.v4_prefix,
            IpAddr::V6(_) => self.v6_prefix,
        };
        IpNet::new(ip, prefix)
            .map(|net| net.network())
            .unwrap_or(IpAddr::V4(SENTINEL_ADDRESS))
    }

    /// Anonymize a textual address. Accepts a bare address or `addr:port`;
    /// anything else becomes [`SENTINEL_ADDRESS`].
    pub fn anonymize(&self, raw: &str) -> String {
        let raw = raw.trim();
        let parsed = raw
            .parse::<IpAddr>()
            .ok()
            .or_else(|| raw.parse::<SocketAddr>().ok().map(|addr| addr.ip()));

        match parsed {
            Some(ip) => self.anonymize_ip(ip).to_string(),
            None => SENTINEL_ADDRESS.to_string(),
        }
    }
}

/// Browser, OS and device class derived from a user-agent string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAgentInfo {
    pub browser: String,
    pub os: String,
    pub device_type: String,
}

fn known(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty() && value != UNKNOWN).then_some(value)
}

pub fn classify_user_agent(user_agent: &str) -> UserAgentInfo {
    let parser = Parser::new();
    let parsed = parser.parse(user_agent).unwrap_or_default();

    let browser = match (known(&parsed.name), known(&parsed.version)) {
        (Some(name), Some(version)) => format!("{name} {version}"),
        (Some(name), None) => name.to_string(),
        _ => "Unknown".to_string(),
    };

    let os = known(&parsed.os).unwrap_or("Unknown").to_string();

    let device_type = match &*parsed.category {
        "pc" => "Desktop",
        "smartphone" | "mobilephone" => "Mobile",
        "crawler" => "Bot",
        "appliance" | "misc" => "Other",
        _ => "Unknown",
    };

    UserAgentInfo {
        browser,
        os,
        device_type: device_type.to_string(),
    }
}

/// What the caller knows about a click at redirect time
///
/// The address is kept raw here; it is anonymized when the event is recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickContext {
    pub ip_address: String,
    pub user_agent: String,
    pub info: UserAgentInfo,
}

impl ClickContext {
    pub fn new(ip_address: impl Into<String>, user_agent: impl Into<String>) -> Self {
        let user_agent = user_agent.into();
        Self {
            ip_address: ip_address.into(),
            info: classify_user_agent(&user_agent),
            user_agent,
        }
    }

    pub fn into_event(self, link_id: u64, clicked_at: i64) -> NewAnalyticsEvent {
        NewAnalyticsEvent {
            link_id,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            device_type: self.info.device_type,
            browser: self.info.browser,
            os: self.info.os,
            clicked_at,
        }
    }
}
