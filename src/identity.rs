use axum::http::HeaderMap;
use clap::ValueEnum;

// Key used when no header gives us a usable peer address
pub const ANONYMOUS: &str = "anonymous";

// Longest textual IPv6 address
const MAX_IP_LEN: usize = 45;

const CF_CONNECTING_IP: &str = "cf-connecting-ip";
const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Deployment environment. Only `Production` uses the strict proxy trust policy.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
    Test,
}

impl Environment {
    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

// Resolve the caller's address from proxy headers
pub fn resolve_client_ip(headers: &HeaderMap, env: Environment) -> String {
    let forwarded = header_str(headers, X_FORWARDED_FOR);
    let real_ip = header_str(headers, X_REAL_IP);

    let candidate = if env.is_production() {
        // CDN edge first, then the hop appended by our own load balancer
        header_str(headers, CF_CONNECTING_IP)
            .filter(|ip| is_valid_ip(ip))
            .or_else(|| {
                forwarded
                    .and_then(|chain| chain.split(',').map(str::trim).next_back())
                    .filter(|ip| is_valid_ip(ip))
            })
            .or_else(|| real_ip.filter(|ip| is_valid_ip(ip)))
    } else {
        forwarded
            .and_then(|chain| chain.split(',').map(str::trim).next())
            .filter(|ip| is_valid_ip(ip))
            .or_else(|| real_ip.filter(|ip| is_valid_ip(ip)))
    };

    candidate.unwrap_or(ANONYMOUS).to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

// Syntax check only: dotted-quad IPv4, full-form IPv6, or the loopback/unspecified shorthands
pub fn is_valid_ip(ip: &str) -> bool {
    if ip.is_empty() || ip.len() > MAX_IP_LEN {
        return false;
    }
    is_ipv4(ip) || is_ipv6(ip)
}

fn is_ipv4(ip: &str) -> bool {
    let octets: Vec<&str> = ip.split('.').collect();
    octets.len() == 4
        && octets.iter().all(|o| {
            (1..=3).contains(&o.len())
                && o.bytes().all(|b| b.is_ascii_digit())
                && o.parse::<u16>().is_ok_and(|n| n <= 255)
        })
}

fn is_ipv6(ip: &str) -> bool {
    if ip == "::1" || ip == "::" {
        return true;
    }
    let groups: Vec<&str> = ip.split(':').collect();
    groups.len() == 8
        && groups
            .iter()
            .all(|g| (1..=4).contains(&g.len()) && g.bytes().all(|b| b.is_ascii_hexdigit()))
}
