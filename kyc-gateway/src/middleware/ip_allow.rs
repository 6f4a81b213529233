//! IP allow-list matching shared by the API-key resolver and the
//! authz engine's per-endpoint `ip_whitelist` check. Entries are either
//! bare addresses or CIDR ranges; an empty list means "allow all".

use std::net::IpAddr;
use std::str::FromStr;

use ipnet::IpNet;

/// `entries` empty ⇒ no restriction. Each entry is tried as a CIDR
/// range first, falling back to an exact address match.
pub fn ip_matches_any(client_ip: &str, entries: &[String]) -> bool {
    if entries.is_empty() {
        return true;
    }
    let Ok(addr) = IpAddr::from_str(client_ip) else {
        return false;
    };
    entries.iter().any(|entry| match IpNet::from_str(entry) {
        Ok(net) => net.contains(&addr),
        Err(_) => IpAddr::from_str(entry).map(|e| e == addr).unwrap_or(false),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_allows_everything() {
        assert!(ip_matches_any("203.0.113.9", &[]));
    }

    #[test]
    fn matches_exact_address() {
        let entries = vec!["203.0.113.9".to_string()];
        assert!(ip_matches_any("203.0.113.9", &entries));
        assert!(!ip_matches_any("203.0.113.10", &entries));
    }

    #[test]
    fn matches_cidr_range() {
        let entries = vec!["203.0.113.0/24".to_string()];
        assert!(ip_matches_any("203.0.113.200", &entries));
        assert!(!ip_matches_any("203.0.114.1", &entries));
    }
}
