//! Wire-level header policy: what is forwarded upstream, what is stripped
//! from origin responses, and which content types are exempt from the
//! response size gate.

use axum::http::{header, HeaderMap, HeaderName};

/// The only client headers forwarded to the origin. Everything else —
/// including client `Cookie` headers — is dropped; upstream cookies come
/// from the jar, `Host` comes from the origin URL, and `Referer` is replaced
/// with the request's own origin URL. `Accept-Encoding` is negotiated by the
/// upstream client itself: a manually-set value would disable its automatic
/// decompression and hand the rewriter compressed bytes.
pub const FORWARD_HEADERS: [HeaderName; 5] = [
    header::USER_AGENT,
    header::ACCEPT,
    header::ACCEPT_LANGUAGE,
    header::CONTENT_TYPE,
    header::REFERER,
];

/// Headers stripped from origin responses. Cookies are captured into the
/// jar instead of reaching the user agent; framing/security policies would
/// break mirrored rendering; payload metadata is recomputed after rewriting.
pub const STRIP_HEADERS: &[&str] = &[
    "set-cookie",
    "content-security-policy",
    "strict-transport-security",
    "x-frame-options",
    "access-control-allow-origin",
    "content-encoding",
    "transfer-encoding",
    "content-length",
];

/// Safe headers copied onto intercepted redirect responses.
pub const REDIRECT_COPY_HEADERS: &[HeaderName] = &[header::CACHE_CONTROL, header::EXPIRES];

/// Content types exempt from the non-media response size cap.
const SIZE_EXEMPT_MEDIA_TYPES: &[&str] =
    &["image/", "video/", "audio/", "application/octet-stream"];

pub fn is_media_content_type(content_type: &str) -> bool {
    let ct = content_type.to_ascii_lowercase();
    SIZE_EXEMPT_MEDIA_TYPES.iter().any(|m| ct.contains(m))
}

/// Copy origin response headers, dropping the strip set. Repeated header
/// values survive the copy.
pub fn filter_response_headers(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::new();
    for (name, value) in headers {
        if STRIP_HEADERS.contains(&name.as_str()) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_strip_set_removes_listed_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("text/html"));
        headers.insert("set-cookie", HeaderValue::from_static("sid=1"));
        headers.insert("content-encoding", HeaderValue::from_static("gzip"));
        headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
        headers.insert("x-custom", HeaderValue::from_static("keep"));

        let out = filter_response_headers(&headers);
        assert_eq!(out.get("content-type").unwrap(), "text/html");
        assert_eq!(out.get("x-custom").unwrap(), "keep");
        assert!(out.get("set-cookie").is_none());
        assert!(out.get("content-encoding").is_none());
        assert!(out.get("x-frame-options").is_none());
    }

    #[test]
    fn test_media_content_types() {
        assert!(is_media_content_type("image/png"));
        assert!(is_media_content_type("VIDEO/mp4"));
        assert!(is_media_content_type("application/octet-stream"));
        assert!(!is_media_content_type("text/html; charset=utf-8"));
        assert!(!is_media_content_type("application/json"));
    }
}
