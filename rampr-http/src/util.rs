use super::{Error, Result};

pub(super) fn has_header(headers: &[(String, String)], name: &str) -> bool {
    headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
}

pub(super) fn host_header_value(parsed: &url::Url) -> Option<String> {
    let host = parsed.host_str()?;
    match parsed.port() {
        Some(port) => Some(format!("{host}:{port}")),
        None => Some(host.to_string()),
    }
}

/// Parses `raw` and checks it is an absolute http(s) URL with a host.
pub fn validate_target_url(raw: &str) -> Result<url::Url> {
    let parsed = url::Url::parse(raw).map_err(|_| Error::InvalidUrl(raw.to_string()))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(Error::UnsupportedScheme(raw.to_string()));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(Error::InvalidUrl(raw.to_string()));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_header_keeps_explicit_port() {
        let u = url::Url::parse("http://localhost:8080/api/pull").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(host_header_value(&u).as_deref(), Some("localhost:8080"));

        let u = url::Url::parse("http://example.com/").unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(host_header_value(&u).as_deref(), Some("example.com"));
    }

    #[test]
    fn validate_target_url_rejects_other_schemes() {
        assert!(validate_target_url("http://127.0.0.1:1/x").is_ok());
        assert!(validate_target_url("https://example.com").is_ok());
        assert!(matches!(
            validate_target_url("ftp://example.com"),
            Err(Error::UnsupportedScheme(_))
        ));
        assert!(matches!(
            validate_target_url("/relative"),
            Err(Error::InvalidUrl(_))
        ));
    }
}
