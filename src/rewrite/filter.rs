//! Ad and analytics filtering: a clean pass that strips known tracker/ad
//! nodes from origin HTML, and an inject pass that appends operator-supplied
//! ad markup and tracker JS.
//!
//! The pattern lists are data, not logic: they are plain string tables
//! compiled into Aho-Corasick automatons at construction, so updating them
//! requires no code changes elsewhere.

use aho_corasick::{AhoCorasick, AhoCorasickBuilder};
use lol_html::{element, rewrite_str, RewriteStrSettings};
use scraper::{Html, Selector};
use tracing::warn;

use crate::core::types::EffectiveConfig;

/// Substrings matched (case-insensitively) against `script[src]` and
/// `iframe[src]` values.
pub const AD_SRC_PATTERNS: &[&str] = &[
    "doubleclick",
    "googlesyndication",
    "adsystem",
    "adservice",
    "adsbygoogle",
    "googletagmanager",
    "google-analytics",
    "googleadservices",
];

/// Substrings matched against inline `<script>` text.
pub const INLINE_SCRIPT_PATTERNS: &[&str] = &[
    "gtag(",
    "ga(",
    "GoogleAnalyticsObject",
    "fbq(",
    "_gaq",
    "dataLayer",
];

pub struct AdFilter {
    src_patterns: AhoCorasick,
    inline_patterns: AhoCorasick,
}

impl AdFilter {
    pub fn new() -> Self {
        Self::with_patterns(AD_SRC_PATTERNS, INLINE_SCRIPT_PATTERNS)
    }

    /// Build a filter over custom pattern tables.
    pub fn with_patterns(src_patterns: &[&str], inline_patterns: &[&str]) -> Self {
        let src = AhoCorasickBuilder::new()
            .ascii_case_insensitive(true)
            .build(src_patterns)
            .expect("static ad pattern table builds");
        let inline = AhoCorasickBuilder::new()
            .build(inline_patterns)
            .expect("static tracker pattern table builds");
        Self {
            src_patterns: src,
            inline_patterns: inline,
        }
    }

    /// Clean pass: remove `<script src>` / `<iframe src>` nodes whose source
    /// matches the ad table, and inline `<script>` nodes whose text matches
    /// the tracker table. When both flags are off the input is returned
    /// byte-for-byte.
    pub fn clean(&self, html: &str, config: &EffectiveConfig) -> String {
        if !config.remove_ads && !config.remove_analytics {
            return html.to_string();
        }

        // A streaming rewriter decides at the start tag, before any element
        // text is visible, so inline-script verdicts come from a DOM
        // pre-scan and are consumed by ordinal during the removal pass.
        let verdicts = self.scan_inline_scripts(html);
        let mut inline_index = 0usize;

        let result = rewrite_str(
            html,
            RewriteStrSettings {
                element_content_handlers: vec![
                    element!("script[src]", |el| {
                        if let Some(src) = el.get_attribute("src") {
                            if self.src_patterns.is_match(&src) {
                                el.remove();
                            }
                        }
                        Ok(())
                    }),
                    element!("iframe[src]", |el| {
                        if let Some(src) = el.get_attribute("src") {
                            if self.src_patterns.is_match(&src) {
                                el.remove();
                            }
                        }
                        Ok(())
                    }),
                    element!("script", |el| {
                        if el.get_attribute("src").is_none() {
                            let flagged = verdicts.get(inline_index).copied().unwrap_or(false);
                            inline_index += 1;
                            if flagged {
                                el.remove();
                            }
                        }
                        Ok(())
                    }),
                ],
                ..RewriteStrSettings::default()
            },
        );

        match result {
            Ok(cleaned) => cleaned,
            Err(e) => {
                warn!("ad filter clean pass failed: {e} — returning input unchanged");
                html.to_string()
            }
        }
    }

    fn scan_inline_scripts(&self, html: &str) -> Vec<bool> {
        let document = Html::parse_document(html);
        let Ok(selector) = Selector::parse("script") else {
            return Vec::new();
        };
        document
            .select(&selector)
            .filter(|el| el.value().attr("src").is_none())
            .map(|el| {
                let text: String = el.text().collect();
                self.inline_patterns.is_match(text.as_str())
            })
            .collect()
    }

    /// Inject pass: append the operator's ad HTML as the last children of
    /// `<body>`, and the tracker JS as a final `<script>` in `<body>` (head,
    /// then html, when no body exists). Ad HTML targets `<body>` only; a
    /// document with a head/html anchor but no body gets the tracker and not
    /// the ad. A bare fragment with no anchor at all has both appended at
    /// the document end. Short-circuits when there is nothing to inject.
    /// NOT idempotent — callers invoke it exactly once per response.
    pub fn inject(&self, html: &str, config: &EffectiveConfig) -> String {
        let ad_html = if config.inject_ads {
            config
                .custom_ad_html
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(extract_fragment_body)
        } else {
            None
        };
        let tracker_js = config
            .custom_tracker_js
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|js| format!("<script>{js}</script>"));

        if ad_html.is_none() && tracker_js.is_none() {
            return html.to_string();
        }

        let lower = html.to_ascii_lowercase();
        let has_body = lower.contains("<body");
        let has_head = lower.contains("<head");
        let has_html = lower.contains("<html");

        let mut body_payload = String::new();
        if let Some(ad) = &ad_html {
            if has_body {
                body_payload.push_str(ad);
            }
        }
        if let Some(script) = &tracker_js {
            if has_body {
                body_payload.push_str(script);
            }
        }

        // Tracker fallback anchor when the document has no <body>.
        let fallback_payload = match (&tracker_js, has_body) {
            (Some(script), false) => Some(script.clone()),
            _ => None,
        };

        let mut handlers = Vec::new();
        if !body_payload.is_empty() {
            let payload = body_payload.clone();
            let mut done = false;
            handlers.push(element!("body", move |el| {
                if !done {
                    el.append(&payload, lol_html::html_content::ContentType::Html);
                    done = true;
                }
                Ok(())
            }));
        }
        if let Some(payload) = fallback_payload {
            if has_head {
                let mut done = false;
                handlers.push(element!("head", move |el| {
                    if !done {
                        el.append(&payload, lol_html::html_content::ContentType::Html);
                        done = true;
                    }
                    Ok(())
                }));
            } else if has_html {
                let mut done = false;
                handlers.push(element!("html", move |el| {
                    if !done {
                        el.append(&payload, lol_html::html_content::ContentType::Html);
                        done = true;
                    }
                    Ok(())
                }));
            }
        }

        let mut output = match rewrite_str(
            html,
            RewriteStrSettings {
                element_content_handlers: handlers,
                ..RewriteStrSettings::default()
            },
        ) {
            Ok(out) => out,
            Err(e) => {
                warn!("ad filter inject pass failed: {e} — returning input unchanged");
                return html.to_string();
            }
        };

        // No anchor element at all (bare fragment): append at document end.
        // With an anchor present, ad HTML goes into <body> or nowhere; only
        // the tracker gets the head/html fallback chain.
        if !has_body && !has_head && !has_html {
            if let Some(ad) = &ad_html {
                output.push_str(ad);
            }
            if let Some(script) = &tracker_js {
                output.push_str(script);
            }
        }

        output
    }
}

impl Default for AdFilter {
    fn default() -> Self {
        Self::new()
    }
}

/// Unwrap operator ad markup that arrives as a full document: when the
/// fragment carries its own `<body>`, only that body's children are
/// injected.
fn extract_fragment_body(fragment: &str) -> String {
    if !fragment.to_ascii_lowercase().contains("<body") {
        return fragment.to_string();
    }
    let document = Html::parse_document(fragment);
    let Ok(selector) = Selector::parse("body") else {
        return fragment.to_string();
    };
    match document.select(&selector).next() {
        Some(body) => body.inner_html(),
        None => fragment.to_string(),
    }
}
