use url::Url;

/// Returns the politeness key for a URL: its lowercase host plus any
/// explicit non-default port
///
/// Two origins on the same host but different ports are treated as distinct
/// servers for rate limiting.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use docharvest::url::host_key;
///
/// let url = Url::parse("https://Docs.Example.com/guide").unwrap();
/// assert_eq!(host_key(&url), Some("docs.example.com".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8080/").unwrap();
/// assert_eq!(host_key(&url), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}
