/// Checks if a host matches a pattern
///
/// This function supports two types of patterns:
/// 1. Exact match: "docs.example.com" matches only "docs.example.com"
/// 2. Wildcard match: "*.example.com" matches:
///    - "example.com" (the bare domain)
///    - "docs.example.com" (single subdomain)
///    - "v2.api.example.com" (nested subdomains)
///
/// Hosts are compared case-insensitively.
///
/// # Examples
///
/// ```
/// use docharvest::url::matches_host;
///
/// assert!(matches_host("docs.example.com", "docs.example.com"));
/// assert!(matches_host("*.example.com", "example.com"));
/// assert!(matches_host("*.example.com", "api.v2.example.com"));
/// assert!(!matches_host("*.example.com", "example.org"));
/// ```
pub fn matches_host(pattern: &str, host: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let host = host.to_ascii_lowercase();

    match pattern.strip_prefix("*.") {
        Some(base) => host == base || host.ends_with(&format!(".{}", base)),
        None => host == pattern,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match() {
        assert!(matches_host("example.com", "example.com"));
        assert!(!matches_host("example.com", "docs.example.com"));
        assert!(!matches_host("docs.example.com", "example.com"));
    }

    #[test]
    fn test_wildcard_matches_bare_and_subdomains() {
        assert!(matches_host("*.github.io", "github.io"));
        assert!(matches_host("*.github.io", "microsoft.github.io"));
        assert!(matches_host("*.github.io", "a.b.github.io"));
    }

    #[test]
    fn test_wildcard_requires_label_boundary() {
        assert!(!matches_host("*.example.com", "myexample.com"));
        assert!(!matches_host("*.example.com", "example.com.evil.org"));
    }

    #[test]
    fn test_case_insensitive() {
        assert!(matches_host("Docs.Example.com", "docs.example.COM"));
        assert!(matches_host("*.EXAMPLE.com", "api.example.com"));
    }
}
