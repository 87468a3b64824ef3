use url::Url;

/// Shorten an absolute URL to its host name, without a leading `www.`.
///
/// Empty input gives an empty string; anything that is not an absolute
/// `http(s)` URL is returned unchanged.
pub fn beautify_url(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }

    if !value.starts_with("http://") && !value.starts_with("https://") {
        return value.to_string();
    }

    match Url::parse(value) {
        Ok(url) => match url.host_str() {
            Some(host) => host.strip_prefix("www.").unwrap_or(host).to_string(),
            None => value.to_string(),
        },
        Err(_) => value.to_string(),
    }
}
