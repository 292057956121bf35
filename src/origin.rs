//! Origin canonicalization — a security boundary, not a formatting nicety.
//!
//! `canonicalize` is total and deterministic: every input either comes back
//! as a lowercase, IDNA-normalized, default-port-stripped `scheme://host`
//! string, or the function fails with one of the four origin error kinds.
//! Two inputs that canonicalize to the same string MUST derive the same
//! salt and nullifier (spec invariant I-3); the reverse must also hold
//! (I-4): two origins that don't canonicalize to the same string must
//! never collide downstream.

use url::Url;

use crate::error::BrassError;

/// Canonicalize an origin string per the contract in the design doc.
///
/// Accepts bare `scheme://host[:port]` origins (no path/query/fragment
/// beyond an empty or single `/` path, no userinfo). Returns the canonical
/// `scheme://host` form with the default HTTPS port omitted.
pub fn canonicalize(origin: &str) -> Result<String, BrassError> {
    let parsed = Url::parse(origin).map_err(|_| BrassError::InvalidOrigin)?;

    if parsed.scheme() != "https" {
        return Err(BrassError::OriginMustBeHttps);
    }
    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err(BrassError::OriginMustNotContainPathQueryFragment);
    }
    if parsed.query().is_some() || parsed.fragment().is_some() {
        return Err(BrassError::OriginMustNotContainPathQueryFragment);
    }
    let path = parsed.path();
    if !(path.is_empty() || path == "/") {
        return Err(BrassError::OriginMustNotContainPathQueryFragment);
    }

    let host = parsed.host_str().ok_or(BrassError::InvalidHostname)?;
    let host = normalize_host(host)?;

    let mut canonical = format!("https://{host}");
    if let Some(port) = parsed.port() {
        if port != 443 {
            canonical.push(':');
            canonical.push_str(&port.to_string());
        }
    }
    Ok(canonical)
}

/// Lowercase, strip trailing dots, and normalize an IPv6 literal's brackets.
///
/// `url::Url` has already IDNA/punycode-normalized and lowercased the host
/// for us (per the WHATWG URL standard the crate implements); what remains
/// here is the protocol's own extra strictness: a bare trailing dot is
/// rejected rather than silently treated as the same host.
fn normalize_host(host: &str) -> Result<String, BrassError> {
    if let Some(inner) = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')) {
        let normalized = inner.to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(BrassError::InvalidHostname);
        }
        return Ok(format!("[{normalized}]"));
    }

    let trimmed = host.trim_end_matches('.');
    if trimmed.is_empty() {
        return Err(BrassError::InvalidHostname);
    }
    Ok(trimmed.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_https() {
        assert_eq!(
            canonicalize("http://example.com"),
            Err(BrassError::OriginMustBeHttps)
        );
    }

    #[test]
    fn rejects_path_query_fragment() {
        assert!(canonicalize("https://example.com/a").is_err());
        assert!(canonicalize("https://example.com?q=1").is_err());
        assert!(canonicalize("https://example.com#f").is_err());
        assert!(canonicalize("https://user@example.com").is_err());
    }

    #[test]
    fn lowercases_host() {
        assert_eq!(
            canonicalize("https://EXAMPLE.com").unwrap(),
            "https://example.com"
        );
    }

    #[test]
    fn strips_trailing_dot() {
        assert_eq!(
            canonicalize("https://example.com.").unwrap(),
            canonicalize("https://example.com").unwrap()
        );
    }

    #[test]
    fn omits_default_port() {
        assert_eq!(
            canonicalize("https://example.com:443").unwrap(),
            "https://example.com"
        );
        assert_eq!(
            canonicalize("https://example.com:8443").unwrap(),
            "https://example.com:8443"
        );
    }

    #[test]
    fn canonical_equivalence_holds_for_case_dot_port() {
        let variants = [
            "https://example.com",
            "https://EXAMPLE.com",
            "https://example.com.",
            "https://example.com:443",
            "https://Example.Com.:443",
        ];
        let canon = canonicalize(variants[0]).unwrap();
        for v in &variants[1..] {
            assert_eq!(canonicalize(v).unwrap(), canon);
        }
    }

    #[test]
    fn cross_origin_differs() {
        assert_ne!(
            canonicalize("https://example.com").unwrap(),
            canonicalize("https://attacker.com").unwrap()
        );
    }

    #[test]
    fn normalizes_ipv6_brackets() {
        let a = canonicalize("https://[2001:DB8::1]").unwrap();
        let b = canonicalize("https://[2001:db8::1]").unwrap();
        assert_eq!(a, b);
    }
}
