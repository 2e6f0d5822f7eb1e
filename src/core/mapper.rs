//! Bidirectional host+path mapping between the mirror and origin namespaces.
//!
//! Forward mapping runs on request ingress (mirror host/path → origin URL),
//! reverse mapping runs on redirects and inside the HTML rewriter (origin
//! URL → mirror URL). External domains are carried inside the mirror path as
//! an encoded first segment: `https://abc.external.com/p` ↔ `/abc.external.com/p`.

use url::Url;

use crate::core::types::{EffectiveConfig, MediaPolicy};

/// File extensions treated as media/downloads. Shared by the mapper and the
/// CSS pass; matched case-insensitively against the URL path suffix.
pub const MEDIA_EXTENSIONS: &[&str] = &[
    // Images
    ".jpg", ".jpeg", ".png", ".gif", ".webp", ".svg", ".ico", ".bmp",
    // Videos
    ".mp4", ".mkv", ".avi", ".mov", ".m3u8", ".webm", ".flv", ".wmv",
    // Audio
    ".mp3", ".wav", ".ogg", ".aac", ".flac", ".m4a",
    // Downloads/Archives
    ".zip", ".rar", ".7z", ".tar", ".gz", ".bz2",
    // Documents
    ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".ppt", ".pptx",
    // Executables
    ".apk", ".exe", ".dmg", ".deb", ".rpm",
    // Fonts
    ".ttf", ".woff", ".woff2", ".eot", ".otf",
];

/// Everything the reverse mapping needs to know about the current request.
#[derive(Debug, Clone, Copy)]
pub struct RewriteContext<'a> {
    /// Host the user agent addressed (port already stripped).
    pub mirror_host: &'a str,
    pub mirror_root: &'a str,
    pub source_root: &'a str,
    /// Origin URL of the page being rewritten; base for relative URLs.
    pub page_origin_url: &'a str,
    pub config: &'a EffectiveConfig,
}

/// Check whether a URL points at a media/download resource by path extension.
pub fn is_media_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }
    // Drop fragment and query so only the path suffix is considered.
    let path = url.split('#').next().unwrap_or(url);
    let path = path.split('?').next().unwrap_or(path);
    let path = path.to_ascii_lowercase();
    MEDIA_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// A path segment counts as an encoded external host when it contains at
/// least one dot and no spaces.
pub fn is_encoded_external_domain(segment: &str) -> bool {
    segment.contains('.') && !segment.contains(' ')
}

/// Map a mirror host to its origin host: `mirror.com → source.com`,
/// `xyz.mirror.com → xyz.source.com`. Hosts outside the mirror namespace are
/// returned unchanged.
pub fn map_mirror_host_to_origin_host(
    mirror_host: &str,
    mirror_root: &str,
    source_root: &str,
) -> String {
    if mirror_host == mirror_root {
        return source_root.to_string();
    }
    if let Some(prefix) = mirror_host.strip_suffix(&format!(".{mirror_root}")) {
        return format!("{prefix}.{source_root}");
    }
    mirror_host.to_string()
}

/// The symmetric origin → mirror host transform.
pub fn map_origin_host_to_mirror_host(
    origin_host: &str,
    source_root: &str,
    mirror_root: &str,
) -> String {
    if origin_host == source_root {
        return mirror_root.to_string();
    }
    if let Some(prefix) = origin_host.strip_suffix(&format!(".{source_root}")) {
        return format!("{prefix}.{mirror_root}");
    }
    origin_host.to_string()
}

/// Forward mapping: build the origin URL for an incoming mirror request.
///
/// A first path segment that looks like a host is an encoded external domain
/// and wins over host mapping:
/// `mirror.com /abc.external.com/path → https://abc.external.com/path`.
/// Otherwise the mirror host is swapped for the origin host and the path kept:
/// `xyz.mirror.com /abc → https://xyz.source.com/abc`.
pub fn build_origin_url(
    mirror_host: &str,
    mirror_path: &str,
    query: Option<&str>,
    source_root: &str,
    mirror_root: &str,
) -> String {
    let path = if mirror_path.starts_with('/') {
        mirror_path.to_string()
    } else {
        format!("/{mirror_path}")
    };

    let trimmed = path.trim_start_matches('/');
    let (first_segment, remainder) = match trimmed.split_once('/') {
        Some((first, rest)) => (first, format!("/{rest}")),
        None => (trimmed, String::from("/")),
    };

    let mut origin = if !first_segment.is_empty() && is_encoded_external_domain(first_segment) {
        if remainder == "/" {
            format!("https://{first_segment}/")
        } else {
            format!("https://{first_segment}{remainder}")
        }
    } else {
        let origin_host = map_mirror_host_to_origin_host(mirror_host, mirror_root, source_root);
        format!("https://{origin_host}{path}")
    };

    if let Some(q) = query {
        if !q.is_empty() {
            origin.push('?');
            origin.push_str(q);
        }
    }
    origin
}

/// Resolve a possibly-relative URL against the current page's origin URL.
/// `data:`, `javascript:`, `mailto:` and fragment-only references pass
/// through untouched; protocol-relative URLs inherit the base scheme.
pub fn make_absolute_url(url: &str, base_url: &str) -> String {
    if url.is_empty()
        || url.starts_with("data:")
        || url.starts_with("javascript:")
        || url.starts_with("mailto:")
        || url.starts_with('#')
    {
        return url.to_string();
    }

    if let Some(rest) = url.strip_prefix("//") {
        let scheme = Url::parse(base_url)
            .map(|u| u.scheme().to_string())
            .unwrap_or_else(|_| "https".to_string());
        return format!("{scheme}://{rest}");
    }

    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }

    match Url::parse(base_url).and_then(|base| base.join(url)) {
        Ok(joined) => joined.to_string(),
        Err(_) => url.to_string(),
    }
}

/// True when `host` is `domain` itself or any subdomain of it.
pub fn host_belongs_to_domain(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{domain}"))
}

/// Reverse mapping: rewrite one URL found in origin content so it stays in
/// the mirror namespace.
///
/// In-namespace hosts are swapped symmetrically (`x.source → x.mirror`,
/// scheme forced to https, path/query/fragment untouched). External hosts
/// are path-encoded under the mirror root when `proxy_external_domains` is
/// set, and left alone otherwise. Media URLs bypass the mirror entirely
/// under `media_policy = bypass`.
pub fn rewrite_url(url: &str, ctx: &RewriteContext<'_>) -> String {
    if url.is_empty()
        || url.starts_with("data:")
        || url.starts_with("javascript:")
        || url.starts_with("mailto:")
        || url.starts_with('#')
    {
        return url.to_string();
    }

    let absolute = make_absolute_url(url, ctx.page_origin_url);

    if is_media_url(&absolute) && ctx.config.media_policy == MediaPolicy::Bypass {
        return absolute;
    }

    let parsed = match Url::parse(&absolute) {
        Ok(p) => p,
        Err(_) => return url.to_string(),
    };
    let origin_host = match parsed.host_str() {
        Some(h) => h.to_string(),
        None => return url.to_string(),
    };
    let origin_path = if parsed.path().is_empty() {
        "/"
    } else {
        parsed.path()
    };

    let mut tail = String::from(origin_path);
    if let Some(q) = parsed.query() {
        tail.push('?');
        tail.push_str(q);
    }
    if let Some(f) = parsed.fragment() {
        tail.push('#');
        tail.push_str(f);
    }

    if host_belongs_to_domain(&origin_host, ctx.source_root) {
        let mirror_host =
            map_origin_host_to_mirror_host(&origin_host, ctx.source_root, ctx.mirror_root);
        format!("https://{mirror_host}{tail}")
    } else {
        if !ctx.config.proxy_external_domains {
            return absolute;
        }
        // External path encoding is rooted at the mirror root, never at a
        // subdomain of it.
        format!("https://{}/{}{}", ctx.mirror_root, origin_host, tail)
    }
}
