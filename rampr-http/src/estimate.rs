use super::util::{has_header, host_header_value, validate_target_url};
use super::{HttpRequest, Result};

/// Best-effort HTTP/1.1 size of a request: request line, headers, blank line, body.
///
/// Host and Content-Length are counted when the client would add them implicitly.
pub(super) fn estimate_http_request_bytes(req: &HttpRequest) -> Result<u64> {
    let parsed = validate_target_url(&req.url)?;
    let headers = &req.headers;
    let body_len = req.body.len() as u64;

    let path_len = match parsed.query() {
        Some(q) => parsed.path().len() + 1 + q.len(),
        None => parsed.path().len(),
    } as u64;

    // "METHOD SP path SP HTTP/1.1 CRLF"
    let mut bytes = (req.method.as_str().len() as u64)
        .saturating_add(1)
        .saturating_add(path_len.max(1))
        .saturating_add(1)
        .saturating_add("HTTP/1.1".len() as u64)
        .saturating_add(2);

    for (k, v) in headers {
        bytes = bytes.saturating_add(header_bytes(k.as_bytes(), v.as_bytes()));
    }

    if !has_header(headers, "host")
        && let Some(host) = host_header_value(&parsed)
    {
        bytes = bytes.saturating_add(header_bytes(b"host", host.as_bytes()));
    }

    if body_len != 0 && !has_header(headers, "content-length") {
        let v = body_len.to_string();
        bytes = bytes.saturating_add(header_bytes(b"content-length", v.as_bytes()));
    }

    Ok(bytes.saturating_add(2).saturating_add(body_len))
}

pub(super) fn estimate_http1_response_head_bytes(
    status: http::StatusCode,
    headers: &http::HeaderMap,
) -> u64 {
    // "HTTP/1.1 SP 200 CRLF"; the reason phrase is ignored.
    let mut bytes = ("HTTP/1.1".len() as u64)
        .saturating_add(1)
        .saturating_add(status.as_str().len() as u64)
        .saturating_add(2);
    for (name, value) in headers {
        bytes = bytes.saturating_add(header_bytes(name.as_str().as_bytes(), value.as_bytes()));
    }
    bytes.saturating_add(2)
}

fn header_bytes(name: &[u8], value: &[u8]) -> u64 {
    // "name: value\r\n"
    (name.len() as u64)
        .saturating_add(2)
        .saturating_add(value.len() as u64)
        .saturating_add(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn get_without_body_counts_request_line_and_host() {
        let req = HttpRequest::get("http://localhost:8080/api/pull");
        let n = estimate_http_request_bytes(&req).unwrap_or_else(|e| panic!("{e}"));
        let expected = "GET /api/pull HTTP/1.1\r\n".len()
            + "host: localhost:8080\r\n".len()
            + "\r\n".len();
        assert_eq!(n, expected as u64);
    }

    #[test]
    fn body_adds_content_length_and_payload() {
        let body = Bytes::from_static(br#"{"chat":"apple:banana","reverse":true}"#);
        let req = HttpRequest::get("http://h/p?x=1")
            .with_header("Content-Type", "application/json")
            .with_body(body.clone());
        let n = estimate_http_request_bytes(&req).unwrap_or_else(|e| panic!("{e}"));
        let expected = "GET /p?x=1 HTTP/1.1\r\n".len()
            + "Content-Type: application/json\r\n".len()
            + "host: h\r\n".len()
            + format!("content-length: {}\r\n", body.len()).len()
            + 2
            + body.len();
        assert_eq!(n, expected as u64);
    }
}
