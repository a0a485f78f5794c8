//! Client identity helpers: extracting, sanitizing and hashing the caller's
//! address. Transcripts are keyed by the sanitized address; analytics only
//! ever see the hash.

use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use std::net::IpAddr;

/// Extracts the client address from forwarding headers, falling back to
/// "unknown" when nothing usable is present.
pub fn client_ip(headers: &HeaderMap) -> String {
    let candidate = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .or_else(|| headers.get("cf-connecting-ip").and_then(|v| v.to_str().ok()))
        .unwrap_or("unknown");

    sanitize_ip(candidate)
}

/// Whether `ip` is a parseable IPv4/IPv6 address or one of the accepted
/// placeholders.
pub fn is_valid_ip(ip: &str) -> bool {
    ip.parse::<IpAddr>().is_ok() || ip == "localhost" || ip == "unknown"
}

/// Strips characters that cannot appear in an address and validates the rest.
/// Invalid input degrades to the safe "unknown" placeholder.
pub fn sanitize_ip(ip: &str) -> String {
    let clean: String = ip
        .chars()
        .filter(|c| c.is_ascii_hexdigit() || *c == '.' || *c == ':')
        .collect();

    if is_valid_ip(&clean) {
        clean
    } else if is_valid_ip(ip) {
        ip.to_string()
    } else {
        "unknown".to_string()
    }
}

/// SHA-256 hash of an address, base64-encoded. This is the only form of the
/// address that analytics records are allowed to carry.
pub fn hash_ip(ip: &str) -> String {
    let digest = Sha256::digest(ip.as_bytes());
    STANDARD_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.5, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers), "203.0.113.5");
    }

    #[test]
    fn test_missing_headers_fall_back_to_unknown() {
        let headers = HeaderMap::new();
        assert_eq!(client_ip(&headers), "unknown");
    }

    #[test]
    fn test_sanitize_rejects_garbage() {
        assert_eq!(sanitize_ip("<script>alert(1)</script>"), "unknown");
        assert_eq!(sanitize_ip("192.168.1.1"), "192.168.1.1");
        assert_eq!(sanitize_ip("::1"), "::1");
        assert_eq!(sanitize_ip("localhost"), "localhost");
    }

    #[test]
    fn test_hash_is_stable_and_opaque() {
        let a = hash_ip("203.0.113.5");
        let b = hash_ip("203.0.113.5");
        let c = hash_ip("203.0.113.6");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(!a.contains("203"));
    }
}
