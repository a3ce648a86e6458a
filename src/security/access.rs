//! IP allow/deny evaluation and client identity resolution

use hyper::HeaderMap;
use std::net::IpAddr;

use crate::config::{IpRule, SecurityConfig};

/// Longest `X-Forwarded-For` value that is parsed at all
const MAX_X_FORWARDED_FOR_LENGTH: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny,
}

/// Allow/deny lists. An explicit deny always wins over an overlapping allow.
#[derive(Debug, Clone, Default)]
pub struct AccessControl {
    allowed: Vec<IpRule>,
    denied: Vec<IpRule>,
}

impl AccessControl {
    pub fn new(config: &SecurityConfig) -> Self {
        Self {
            allowed: config.allowed_ips.clone(),
            denied: config.denied_ips.clone(),
        }
    }

    pub fn check(&self, client: IpAddr) -> AccessDecision {
        if self.denied.iter().any(|rule| rule.contains(&client)) {
            return AccessDecision::Deny;
        }
        if self.allowed.is_empty() || self.allowed.iter().any(|rule| rule.contains(&client)) {
            AccessDecision::Allow
        } else {
            AccessDecision::Deny
        }
    }
}

/// Determine the client address for a request.
///
/// `X-Forwarded-For` is only honoured when the TCP peer is a trusted proxy.
/// The chain is walked right to left and the first hop that is not itself a
/// trusted proxy is the client.
pub fn resolve_client_ip(headers: &HeaderMap, peer_ip: IpAddr, trusted: &[IpRule]) -> IpAddr {
    let peer_ip = peer_ip.to_canonical();
    if trusted.is_empty() || !trusted.iter().any(|rule| rule.contains(&peer_ip)) {
        return peer_ip;
    }

    let Some(xff) = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .filter(|v| v.len() <= MAX_X_FORWARDED_FOR_LENGTH)
    else {
        return peer_ip;
    };

    xff.rsplit(',')
        .filter_map(|s| s.trim().parse::<IpAddr>().ok())
        .map(|ip| ip.to_canonical())
        .find(|ip| !trusted.iter().any(|rule| rule.contains(ip)))
        .unwrap_or(peer_ip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    fn rules(list: &[&str]) -> Vec<IpRule> {
        list.iter().map(|s| s.parse().unwrap()).collect()
    }

    fn control(allowed: &[&str], denied: &[&str]) -> AccessControl {
        AccessControl::new(&SecurityConfig {
            allowed_ips: rules(allowed),
            denied_ips: rules(denied),
            ..SecurityConfig::default()
        })
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_empty_lists_allow_everyone() {
        let acl = control(&[], &[]);
        assert_eq!(acl.check(ip("203.0.113.9")), AccessDecision::Allow);
    }

    #[test]
    fn test_deny_takes_precedence() {
        let acl = control(&["10.0.0.0/8", "192.168.1.1"], &["192.168.1.1", "10.1.0.0/16"]);
        assert_eq!(acl.check(ip("192.168.1.1")), AccessDecision::Deny);
        assert_eq!(acl.check(ip("10.1.2.3")), AccessDecision::Deny);
        assert_eq!(acl.check(ip("10.2.0.1")), AccessDecision::Allow);
    }

    #[test]
    fn test_allow_list_restricts() {
        let acl = control(&["127.0.0.1"], &[]);
        assert_eq!(acl.check(ip("127.0.0.1")), AccessDecision::Allow);
        assert_eq!(acl.check(ip("::ffff:127.0.0.1")), AccessDecision::Allow);
        assert_eq!(acl.check(ip("127.0.0.2")), AccessDecision::Deny);
    }

    #[test]
    fn test_deny_only() {
        let acl = control(&[], &["198.51.100.0/24"]);
        assert_eq!(acl.check(ip("198.51.100.7")), AccessDecision::Deny);
        assert_eq!(acl.check(ip("198.51.101.7")), AccessDecision::Allow);
    }

    #[test]
    fn test_forwarded_for_ignored_without_trusted_proxies() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("1.2.3.4"));
        assert_eq!(
            resolve_client_ip(&headers, ip("10.0.0.1"), &[]),
            ip("10.0.0.1")
        );
    }

    #[test]
    fn test_forwarded_for_from_trusted_proxy() {
        let trusted = rules(&["10.0.0.0/8"]);
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 5.6.7.8, 10.0.0.2"),
        );
        assert_eq!(
            resolve_client_ip(&headers, ip("10.0.0.1"), &trusted),
            ip("5.6.7.8")
        );
        // Untrusted peer: header is not believed
        assert_eq!(
            resolve_client_ip(&headers, ip("203.0.113.1"), &trusted),
            ip("203.0.113.1")
        );
    }
}
