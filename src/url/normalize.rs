use crate::UrlError;
use url::Url;

/// Query parameters that never change page content and are dropped
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid", "ref", "_ga"];

/// Normalizes a URL string into the key used for deduplication
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only `http` and `https`; require a host
/// 3. Lowercase the host (done by the `url` parser for web schemes)
/// 4. Normalize the path:
///    - Remove dot segments (`.` and `..`) and empty segments
///    - Remove trailing slash (except for the root `/`)
/// 5. Remove the fragment
/// 6. Remove tracking query parameters (`utm_*`, `fbclid`, ...)
/// 7. Sort remaining query parameters; drop an empty query
///
/// Two URLs that normalize to the same string refer to the same page for
/// the purposes of the crawl frontier.
///
/// # Examples
///
/// ```
/// use docharvest::url::normalize_url;
///
/// let url = normalize_url("https://Docs.Example.com/guide/./intro/#setup").unwrap();
/// assert_eq!(url.as_str(), "https://docs.example.com/guide/intro");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    normalize_parsed(&url)
}

/// Normalizes an already parsed URL
///
/// See [`normalize_url`] for the rules applied.
pub fn normalize_parsed(url: &Url) -> Result<Url, UrlError> {
    let mut url = url.clone();

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);
    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut()
                .clear()
                .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
    }

    Ok(url)
}

/// Returns the URL with its fragment removed and nothing else changed
///
/// This is the form a page is actually requested with; the normalized form
/// is only used as the dedup key.
pub fn strip_fragment(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    params.sort();
    params
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}
