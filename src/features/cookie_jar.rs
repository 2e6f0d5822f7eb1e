//! Per-(site, session, origin-host) cookie jars.
//!
//! The jar stores bare `name=value` pairs only; `Path`, `Domain`, `Secure`,
//! `HttpOnly` and expiry attributes from `Set-Cookie` are discarded, so the
//! jar is a coarse approximation of browser cookie handling. Entries are
//! merged last-write-wins and never expire automatically — cleanup is
//! operator policy.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// One origin's cookies for one session. Insertion-ordered so the rebuilt
/// `Cookie` header lists pairs in the order they were first seen.
pub type CookieMap = Vec<(String, String)>;

#[async_trait]
pub trait CookieStore: Send + Sync {
    /// Cookies previously observed for this (site, session, origin host).
    async fn get(&self, site_id: i64, session_id: &str, origin_host: &str) -> CookieMap;

    /// Merge the `name=value` prefixes of the given `Set-Cookie` header
    /// values into the jar. Empty input is a no-op.
    async fn store(
        &self,
        site_id: i64,
        session_id: &str,
        origin_host: &str,
        set_cookie_headers: &[String],
    );
}

/// Parse a request `Cookie` header into name/value pairs.
pub fn parse_cookie_header(cookie_string: &str) -> CookieMap {
    let mut cookies = CookieMap::new();
    for part in cookie_string.split(';') {
        let part = part.trim();
        if let Some((name, value)) = part.split_once('=') {
            upsert(&mut cookies, name.trim(), value.trim());
        }
    }
    cookies
}

/// Extract the `name=value` prefix (everything before the first `;`) of each
/// `Set-Cookie` header. Attribute-only or malformed headers are skipped.
pub fn parse_set_cookie_headers(set_cookie_headers: &[String]) -> CookieMap {
    let mut cookies = CookieMap::new();
    for header in set_cookie_headers {
        let pair = header.split(';').next().unwrap_or("").trim();
        if let Some((name, value)) = pair.split_once('=') {
            upsert(&mut cookies, name.trim(), value.trim());
        }
    }
    cookies
}

/// Build the upstream `Cookie` header: `name=value` pairs joined by `; ` in
/// insertion order. Empty jar → empty string.
pub fn build_cookie_header(cookies: &CookieMap) -> String {
    cookies
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
}

fn upsert(cookies: &mut CookieMap, name: &str, value: &str) {
    if let Some(slot) = cookies.iter_mut().find(|(n, _)| n == name) {
        slot.1 = value.to_string();
    } else {
        cookies.push((name.to_string(), value.to_string()));
    }
}

pub fn lookup<'a>(cookies: &'a CookieMap, name: &str) -> Option<&'a str> {
    cookies
        .iter()
        .find(|(n, _)| n == name)
        .map(|(_, v)| v.as_str())
}

// ---------------------------------------------------------------------------

type JarKey = (i64, String, String);

pub struct MemoryCookieStore {
    jars: RwLock<HashMap<JarKey, CookieMap>>,
}

impl MemoryCookieStore {
    pub fn new() -> Self {
        Self {
            jars: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCookieStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CookieStore for MemoryCookieStore {
    async fn get(&self, site_id: i64, session_id: &str, origin_host: &str) -> CookieMap {
        let jars = self.jars.read().await;
        jars.get(&(site_id, session_id.to_string(), origin_host.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    async fn store(
        &self,
        site_id: i64,
        session_id: &str,
        origin_host: &str,
        set_cookie_headers: &[String],
    ) {
        if set_cookie_headers.is_empty() {
            return;
        }
        let incoming = parse_set_cookie_headers(set_cookie_headers);
        if incoming.is_empty() {
            return;
        }

        let mut jars = self.jars.write().await;
        let jar = jars
            .entry((site_id, session_id.to_string(), origin_host.to_string()))
            .or_default();
        for (name, value) in incoming {
            upsert(jar, &name, &value);
        }
        debug!(
            "cookie_jar: 🍪 {} cookies stored for site {} origin {}",
            jar.len(),
            site_id,
            origin_host
        );
    }
}
