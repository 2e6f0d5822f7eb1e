//! CSS `url(...)` rewriting for `<style>` elements and `style=` attributes.

use regex::{Captures, Regex};

use crate::core::mapper::{is_media_url, make_absolute_url, rewrite_url, RewriteContext};
use crate::core::types::MediaPolicy;

/// Rewrite every `url(...)` occurrence in a CSS string. The reference may be
/// unquoted, single-quoted, or double-quoted; the quote style is preserved.
/// `data:` and fragment-only references are skipped, and media-extension
/// URLs pass through untouched under `media_policy = bypass`.
pub fn rewrite_css_urls(css: &str, ctx: &RewriteContext<'_>) -> String {
    if css.is_empty() || !css.contains("url(") {
        return css.to_string();
    }

    let url_ref = Regex::new(r#"url\s*\(\s*["']?([^"')]+)["']?\s*\)"#).unwrap();

    url_ref
        .replace_all(css, |caps: &Captures<'_>| {
            let original = caps.get(1).map(|m| m.as_str().trim()).unwrap_or("");

            if original.is_empty() || original.starts_with("data:") || original.starts_with('#') {
                return caps[0].to_string();
            }

            let absolute = make_absolute_url(original, ctx.page_origin_url);
            if is_media_url(&absolute) && ctx.config.media_policy == MediaPolicy::Bypass {
                return caps[0].to_string();
            }

            let rewritten = rewrite_url(original, ctx);
            let full = &caps[0];
            if full.contains('"') {
                format!("url(\"{rewritten}\")")
            } else if full.contains('\'') {
                format!("url('{rewritten}')")
            } else {
                format!("url({rewritten})")
            }
        })
        .to_string()
}
