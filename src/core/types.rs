use serde::{Deserialize, Serialize};

/// How media and download URLs (by file extension) are treated by the rewriter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediaPolicy {
    /// Leave media URLs pointing at the origin; the user agent fetches them directly.
    Bypass,
    /// Rewrite media URLs into the mirror namespace like any other URL.
    #[default]
    Proxy,
    /// Rewrite, but the orchestrator enforces the response size cap.
    SizeLimited,
}

/// Whether requests carry a per-session cookie jar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    #[default]
    Stateless,
    CookieJar,
}

/// A configured mirror mapping: one operator-owned DNS suffix shadowing one
/// origin suffix, with optional per-site overrides of [`GlobalConfig`].
///
/// Sites are created and mutated by the external admin surface; the proxy
/// core only ever reads them through the site registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    /// DNS suffix owned by the operator, unique across sites.
    pub mirror_root: String,
    /// Origin DNS suffix this mirror shadows.
    pub source_root: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    // Overrides; None falls back to the global default.
    #[serde(default)]
    pub proxy_subdomains: Option<bool>,
    #[serde(default)]
    pub proxy_external_domains: Option<bool>,
    #[serde(default)]
    pub rewrite_js_redirects: Option<bool>,
    #[serde(default)]
    pub remove_ads: Option<bool>,
    #[serde(default)]
    pub inject_ads: Option<bool>,
    #[serde(default)]
    pub remove_analytics: Option<bool>,
    #[serde(default)]
    pub media_policy: Option<MediaPolicy>,
    #[serde(default)]
    pub session_mode: Option<SessionMode>,
    #[serde(default)]
    pub custom_ad_html: Option<String>,
    #[serde(default)]
    pub custom_tracker_js: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl Site {
    pub fn new(id: i64, mirror_root: &str, source_root: &str) -> Self {
        Self {
            id,
            mirror_root: mirror_root.to_string(),
            source_root: source_root.to_string(),
            enabled: true,
            proxy_subdomains: None,
            proxy_external_domains: None,
            rewrite_js_redirects: None,
            remove_ads: None,
            inject_ads: None,
            remove_analytics: None,
            media_policy: None,
            session_mode: None,
            custom_ad_html: None,
            custom_tracker_js: None,
        }
    }
}

/// Singleton default configuration shared by every site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub proxy_subdomains: bool,
    pub proxy_external_domains: bool,
    pub rewrite_js_redirects: bool,
    pub remove_ads: bool,
    pub inject_ads: bool,
    pub remove_analytics: bool,
    pub media_policy: MediaPolicy,
    pub session_mode: SessionMode,
    pub custom_ad_html: Option<String>,
    pub custom_tracker_js: Option<String>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            proxy_subdomains: true,
            proxy_external_domains: true,
            rewrite_js_redirects: false,
            remove_ads: false,
            inject_ads: false,
            remove_analytics: false,
            media_policy: MediaPolicy::Proxy,
            session_mode: SessionMode::Stateless,
            custom_ad_html: None,
            custom_tracker_js: None,
        }
    }
}

/// Per-request configuration: each field is the site override when present,
/// the global default otherwise. Built once at the top of the request and
/// immutable from then on.
#[derive(Debug, Clone)]
pub struct EffectiveConfig {
    pub proxy_subdomains: bool,
    pub proxy_external_domains: bool,
    pub rewrite_js_redirects: bool,
    pub remove_ads: bool,
    pub inject_ads: bool,
    pub remove_analytics: bool,
    pub media_policy: MediaPolicy,
    pub session_mode: SessionMode,
    pub custom_ad_html: Option<String>,
    pub custom_tracker_js: Option<String>,
}

impl EffectiveConfig {
    pub fn resolve(site: &Site, global: &GlobalConfig) -> Self {
        Self {
            proxy_subdomains: site.proxy_subdomains.unwrap_or(global.proxy_subdomains),
            proxy_external_domains: site
                .proxy_external_domains
                .unwrap_or(global.proxy_external_domains),
            rewrite_js_redirects: site
                .rewrite_js_redirects
                .unwrap_or(global.rewrite_js_redirects),
            remove_ads: site.remove_ads.unwrap_or(global.remove_ads),
            inject_ads: site.inject_ads.unwrap_or(global.inject_ads),
            remove_analytics: site.remove_analytics.unwrap_or(global.remove_analytics),
            media_policy: site.media_policy.unwrap_or(global.media_policy),
            session_mode: site.session_mode.unwrap_or(global.session_mode),
            custom_ad_html: site
                .custom_ad_html
                .clone()
                .or_else(|| global.custom_ad_html.clone()),
            custom_tracker_js: site
                .custom_tracker_js
                .clone()
                .or_else(|| global.custom_tracker_js.clone()),
        }
    }
}
