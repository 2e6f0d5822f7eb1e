//! Inline-JS redirect rewriting.
//!
//! Deliberately shallow: a fixed set of navigation assignment idioms is
//! matched with regexes and the URL literal is passed through the reverse
//! mapping. Aliased forms (`var l = location; l.href = ...`) are out of
//! scope; a full JS parser is not.

use regex::Regex;

use crate::core::mapper::{rewrite_url, RewriteContext};

/// Rewrite the recognized redirect idioms in one inline script:
///
/// 1. `window.location.href = "URL"`
/// 2. `location.href = "URL"` (not when preceded by `window.`)
/// 3. `location.replace("URL")`
/// 4. `location = "URL"` (not when preceded by `window.`)
///
/// Single and double quotes are both recognized and preserved.
pub fn rewrite_js_redirects(js: &str, ctx: &RewriteContext<'_>) -> String {
    if js.is_empty() {
        return js.to_string();
    }

    let window_href = Regex::new(r#"window\.location\.href\s*=\s*["']([^"']+)["']"#).unwrap();
    let bare_href = Regex::new(r#"location\.href\s*=\s*["']([^"']+)["']"#).unwrap();
    let replace_call = Regex::new(r#"location\.replace\s*\(\s*["']([^"']+)["']\s*\)"#).unwrap();
    let bare_assign = Regex::new(r#"location\s*=\s*["']([^"']+)["']"#).unwrap();

    let out = apply_pattern(js, &window_href, false, ctx);
    let out = apply_pattern(&out, &bare_href, true, ctx);
    let out = apply_pattern(&out, &replace_call, false, ctx);
    apply_pattern(&out, &bare_assign, true, ctx)
}

/// Substitute every match of `re`, passing the captured URL through the
/// reverse mapping. When `skip_window_prefix` is set, matches immediately
/// preceded by `window.` are left alone — the regex crate has no
/// look-behind, so the prefix is checked against the haystack directly.
fn apply_pattern(
    js: &str,
    re: &Regex,
    skip_window_prefix: bool,
    ctx: &RewriteContext<'_>,
) -> String {
    let mut out = String::with_capacity(js.len());
    let mut last = 0;

    for caps in re.captures_iter(js) {
        let full = caps.get(0).unwrap();
        let url = caps.get(1).unwrap();

        out.push_str(&js[last..full.start()]);

        if skip_window_prefix && js[..full.start()].ends_with("window.") {
            out.push_str(full.as_str());
        } else {
            let rewritten = rewrite_url(url.as_str(), ctx);
            out.push_str(&js[full.start()..url.start()]);
            out.push_str(&rewritten);
            out.push_str(&js[url.end()..full.end()]);
        }

        last = full.end();
    }

    out.push_str(&js[last..]);
    out
}
