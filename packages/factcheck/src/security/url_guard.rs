//! SSRF protection for links taken from user messages.
//!
//! Every link is checked before the Source Extractor fetches it: scheme
//! allow-list, blocked hostnames, private/link-local address ranges, and
//! (optionally) a DNS re-check so a public name resolving to an internal
//! address is still rejected.

use std::collections::HashSet;
use std::net::IpAddr;

use ipnet::IpNet;
use url::{Host, Url};

use crate::error::{SecurityError, SecurityResult};

const BLOCKED_CIDRS: &[&str] = &[
    "10.0.0.0/8",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "169.254.0.0/16", // link-local / cloud metadata
    "127.0.0.0/8",
    "100.64.0.0/10", // carrier-grade NAT
    "0.0.0.0/8",
    "::1/128",
    "fc00::/7",
    "fe80::/10",
];

const BLOCKED_HOSTS: &[&str] = &[
    "localhost",
    "metadata.google.internal",
    "metadata.gke.internal",
    "instance-data",
];

/// Validates URLs before they are fetched.
#[derive(Debug, Clone)]
pub struct UrlGuard {
    allowed_schemes: HashSet<String>,
    blocked_hosts: HashSet<String>,
    blocked_cidrs: Vec<IpNet>,
    allowed_hosts: HashSet<String>,
    resolve_dns: bool,
}

impl Default for UrlGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlGuard {
    pub fn new() -> Self {
        Self {
            allowed_schemes: ["http", "https"].into_iter().map(String::from).collect(),
            blocked_hosts: BLOCKED_HOSTS.iter().map(|h| h.to_string()).collect(),
            blocked_cidrs: BLOCKED_CIDRS
                .iter()
                .filter_map(|c| c.parse().ok())
                .collect(),
            allowed_hosts: HashSet::new(),
            resolve_dns: true,
        }
    }

    /// Allow a host unconditionally (skips every other check).
    pub fn allow_host(mut self, host: impl Into<String>) -> Self {
        self.allowed_hosts.insert(host.into().to_lowercase());
        self
    }

    /// Block an additional host.
    pub fn block_host(mut self, host: impl Into<String>) -> Self {
        self.blocked_hosts.insert(host.into().to_lowercase());
        self
    }

    /// Block an additional CIDR range.
    pub fn block_cidr(mut self, cidr: IpNet) -> Self {
        self.blocked_cidrs.push(cidr);
        self
    }

    /// Enable or disable the DNS re-check in [`UrlGuard::check`].
    pub fn with_dns_check(mut self, enabled: bool) -> Self {
        self.resolve_dns = enabled;
        self
    }

    /// Static checks only: scheme, hostname, literal IP ranges.
    pub fn validate(&self, url: &Url) -> SecurityResult<()> {
        if !self.allowed_schemes.contains(url.scheme()) {
            return Err(SecurityError::DisallowedScheme(url.scheme().to_string()));
        }

        let host = url.host().ok_or(SecurityError::NoHost)?;
        match host {
            Host::Domain(name) => {
                let name = name.trim_end_matches('.').to_lowercase();
                if self.allowed_hosts.contains(&name) {
                    return Ok(());
                }
                if self.blocked_hosts.contains(&name) || name.ends_with(".localhost") {
                    return Err(SecurityError::BlockedHost(name));
                }
                Ok(())
            }
            Host::Ipv4(ip) => self.check_ip(IpAddr::V4(ip)),
            Host::Ipv6(ip) => self.check_ip(IpAddr::V6(ip)),
        }
    }

    /// Static checks followed by a DNS re-check of the hostname, when enabled.
    pub async fn check(&self, url: &Url) -> SecurityResult<()> {
        self.validate(url)?;

        if !self.resolve_dns {
            return Ok(());
        }

        let Some(Host::Domain(name)) = url.host() else {
            return Ok(());
        };
        if self.allowed_hosts.contains(&name.to_lowercase()) {
            return Ok(());
        }

        let port = url.port_or_known_default().unwrap_or(80);
        let addrs = tokio::net::lookup_host((name, port))
            .await
            .map_err(|e| SecurityError::DnsResolution(e.to_string()))?;

        for addr in addrs {
            if let Err(SecurityError::BlockedCidr(_)) = self.check_ip(addr.ip()) {
                return Err(SecurityError::BlockedCidr(format!(
                    "{} resolved to blocked IP {}",
                    name,
                    addr.ip()
                )));
            }
        }

        Ok(())
    }

    fn check_ip(&self, ip: IpAddr) -> SecurityResult<()> {
        if self.blocked_cidrs.iter().any(|cidr| cidr.contains(&ip)) {
            return Err(SecurityError::BlockedCidr(ip.to_string()));
        }
        Ok(())
    }
}
