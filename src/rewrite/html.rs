//! The HTML rewriting engine: one streaming pass that rewrites every
//! link-bearing attribute through the reverse mapping, rewrites redirect
//! idioms in inline scripts, and rewrites `url(...)` references in inline
//! CSS. Markup outside the touched spans is emitted byte-for-byte.

use std::cell::Cell;
use std::rc::Rc;

use lol_html::html_content::ContentType;
use lol_html::{element, rewrite_str, text, RewriteStrSettings};
use tracing::warn;

use crate::core::mapper::{rewrite_url, RewriteContext};
use crate::rewrite::css::rewrite_css_urls;
use crate::rewrite::js::rewrite_js_redirects;

/// Element/attribute pairs swept by the rewriter.
const ATTR_TARGETS: &[(&str, &str)] = &[
    ("a[href]", "href"),
    ("form[action]", "action"),
    ("iframe[src]", "src"),
    ("link[href]", "href"),
    ("script[src]", "src"),
    ("img[src]", "src"),
    ("source[src]", "src"),
    ("video[src]", "src"),
    ("audio[src]", "src"),
    ("base[href]", "href"),
];

/// Rewrite an HTML document so every link, form target, asset reference,
/// inline-CSS url, and recognized JS navigation stays inside the mirror
/// namespace described by `ctx`.
pub fn rewrite_html(html: &str, ctx: &RewriteContext<'_>) -> String {
    if html.is_empty() {
        return html.to_string();
    }

    let ctx = *ctx;
    let mut handlers = Vec::new();

    for (selector, attr) in ATTR_TARGETS {
        handlers.push(element!(*selector, move |el| {
            if let Some(value) = el.get_attribute(attr) {
                let rewritten = rewrite_url(&value, &ctx);
                if rewritten != value {
                    el.set_attribute(attr, &rewritten)?;
                }
            }
            Ok(())
        }));
    }

    handlers.push(element!("img[srcset]", move |el| {
        if let Some(srcset) = el.get_attribute("srcset") {
            let rewritten = rewrite_srcset(&srcset, &ctx);
            if rewritten != srcset {
                el.set_attribute("srcset", &rewritten)?;
            }
        }
        Ok(())
    }));

    handlers.push(element!("*[style]", move |el| {
        if let Some(style) = el.get_attribute("style") {
            if style.contains("url(") {
                let rewritten = rewrite_css_urls(&style, &ctx);
                if rewritten != style {
                    el.set_attribute("style", &rewritten)?;
                }
            }
        }
        Ok(())
    }));

    // <style> and inline <script> text arrives in chunks; buffer until the
    // final chunk, then emit the rewritten whole.
    let mut css_buffer = String::new();
    handlers.push(text!("style", move |chunk| {
        css_buffer.push_str(chunk.as_str());
        if chunk.last_in_text_node() {
            let rewritten = rewrite_css_urls(&css_buffer, &ctx);
            chunk.replace(&rewritten, ContentType::Html);
            css_buffer.clear();
        } else {
            chunk.remove();
        }
        Ok(())
    }));

    if ctx.config.rewrite_js_redirects {
        // Only inline scripts are rewritten. The element handler fires at
        // the start tag, before the text chunks, so it can flag src-bearing
        // scripts whose fallback text must pass through untouched.
        let script_has_src = Rc::new(Cell::new(false));
        let flag = script_has_src.clone();
        handlers.push(element!("script", move |el| {
            flag.set(el.get_attribute("src").is_some());
            Ok(())
        }));

        let mut js_buffer = String::new();
        handlers.push(text!("script", move |chunk| {
            if script_has_src.get() {
                return Ok(());
            }
            js_buffer.push_str(chunk.as_str());
            if chunk.last_in_text_node() {
                let rewritten = rewrite_js_redirects(&js_buffer, &ctx);
                chunk.replace(&rewritten, ContentType::Html);
                js_buffer.clear();
            } else {
                chunk.remove();
            }
            Ok(())
        }));
    }

    match rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: handlers,
            ..RewriteStrSettings::default()
        },
    ) {
        Ok(out) => out,
        Err(e) => {
            warn!("html rewrite failed: {e} — returning input unchanged");
            html.to_string()
        }
    }
}

/// Rewrite a `srcset` value: comma-separated `url [descriptor]` tokens, with
/// each URL mapped and its descriptor re-emitted untouched.
fn rewrite_srcset(srcset: &str, ctx: &RewriteContext<'_>) -> String {
    srcset
        .split(',')
        .map(|token| {
            let token = token.trim();
            match token.rsplit_once(' ') {
                Some((url_part, descriptor)) => {
                    format!("{} {}", rewrite_url(url_part.trim(), ctx), descriptor)
                }
                None => rewrite_url(token, ctx),
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
