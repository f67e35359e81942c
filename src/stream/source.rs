//! Proxied source URL composition
//!
//! The media element never sees the raw origin URL. It plays
//! `proxy_base + percent_encode(raw) + "&token=" + token`.

/// Compose the final playable URL.
///
/// An absent or empty token leaves the `&token=` suffix off entirely; the
/// proxy may then reject the request, which surfaces as a media error.
pub fn compose_source_url(proxy_base: &str, raw_url: &str, token: Option<&str>) -> String {
    let mut url = format!("{}{}", proxy_base, urlencoding::encode(raw_url));
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        url.push_str("&token=");
        url.push_str(token);
    }
    url
}
