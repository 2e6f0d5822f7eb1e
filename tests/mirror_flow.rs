/// Scenario tests for the mirror core: forward/reverse mapping, redirect
/// interception, the cookie-jar round trip, SSRF containment, and rate-limit
/// behavior — all against the public API, no live network.
use std::net::IpAddr;

use mirrorgate::core::mapper::{
    build_origin_url, make_absolute_url, rewrite_url, RewriteContext,
};
use mirrorgate::core::rate_limiter::RateLimiter;
use mirrorgate::core::security::is_safe_origin_url;
use mirrorgate::core::session::SessionManager;
use mirrorgate::core::types::{EffectiveConfig, GlobalConfig, SessionMode, Site};
use mirrorgate::features::cookie_jar::{
    build_cookie_header, lookup, parse_cookie_header, CookieStore, MemoryCookieStore,
};
use mirrorgate::features::site_registry::{MemorySiteRegistry, SiteRegistry};

fn mirror_site() -> Site {
    Site::new(1, "mirror.com", "source.com")
}

fn effective(site: &Site) -> EffectiveConfig {
    EffectiveConfig::resolve(site, &GlobalConfig::default())
}

#[test]
fn test_simple_forward_mapping() {
    let site = mirror_site();
    let origin = build_origin_url("mirror.com", "/foo/bar", None, &site.source_root, &site.mirror_root);
    assert_eq!(origin, "https://source.com/foo/bar");
}

#[test]
fn test_subdomain_forward_mapping() {
    let site = mirror_site();
    let origin = build_origin_url("xyz.mirror.com", "/abc", None, &site.source_root, &site.mirror_root);
    assert_eq!(origin, "https://xyz.source.com/abc");
}

#[test]
fn test_external_domain_forward_encoding() {
    let site = mirror_site();
    let origin = build_origin_url(
        "mirror.com",
        "/abc.external.com/path/to",
        None,
        &site.source_root,
        &site.mirror_root,
    );
    assert_eq!(origin, "https://abc.external.com/path/to");
}

#[test]
fn test_redirect_location_reverse_mapping() {
    // Origin answers 302 Location: https://xyz.source.com/q on a request
    // that came in via mirror.com; the mirror must emit xyz.mirror.com/q.
    let site = mirror_site();
    let config = effective(&site);
    let origin_url = "https://source.com/login";
    let ctx = RewriteContext {
        mirror_host: "mirror.com",
        mirror_root: &site.mirror_root,
        source_root: &site.source_root,
        page_origin_url: origin_url,
        config: &config,
    };

    let absolute = make_absolute_url("https://xyz.source.com/q", origin_url);
    assert_eq!(rewrite_url(&absolute, &ctx), "https://xyz.mirror.com/q");

    // Relative Location headers resolve against the origin URL first.
    let relative = make_absolute_url("/next", origin_url);
    assert_eq!(rewrite_url(&relative, &ctx), "https://mirror.com/next");
}

#[tokio::test]
async fn test_cookie_jar_round_trip() {
    // First request: no session cookie → a fresh one is minted and the
    // origin's Set-Cookie is captured. Second request: the presented
    // session maps back to the same jar and the upstream Cookie header
    // carries the stored pair.
    let mut site = mirror_site();
    site.session_mode = Some(SessionMode::CookieJar);
    let config = effective(&site);
    assert_eq!(config.session_mode, SessionMode::CookieJar);

    let sessions = SessionManager::new("an-adequately-long-test-secret-key!!");
    let store = MemoryCookieStore::new();

    // Request 1: mint, then observe the origin's Set-Cookie headers.
    let signed = sessions.mint();
    let session_id = sessions.verify(&signed).expect("fresh cookie verifies");
    store
        .store(
            site.id,
            &session_id,
            "source.com",
            &["sid=1; Path=/".to_string()],
        )
        .await;

    // Request 2: the user agent presents the signed cookie.
    let presented = parse_cookie_header(&format!("px_session_id={signed}"));
    let signed_back = lookup(&presented, "px_session_id").expect("cookie present");
    let session_id_back = sessions.verify(signed_back).expect("valid signature");
    assert_eq!(session_id_back, session_id);

    let jar = store.get(site.id, &session_id_back, "source.com").await;
    assert_eq!(build_cookie_header(&jar), "sid=1");
}

#[tokio::test]
async fn test_cookie_jar_merge_semantics() {
    let store = MemoryCookieStore::new();
    store
        .store(1, "sess", "origin.com", &["a=1".to_string()])
        .await;
    store
        .store(
            1,
            "sess",
            "origin.com",
            &["a=2".to_string(), "b=3".to_string()],
        )
        .await;

    let jar = store.get(1, "sess", "origin.com").await;
    assert_eq!(lookup(&jar, "a"), Some("2"));
    assert_eq!(lookup(&jar, "b"), Some("3"));
}

#[tokio::test]
async fn test_ssrf_blocks_localhost_source() {
    // A site whose source root is localhost can never be fetched.
    let origin = build_origin_url("mirror.com", "/any/path", None, "localhost", "mirror.com");
    let (safe, reason) = is_safe_origin_url(&origin).await;
    assert!(!safe);
    assert!(
        reason.contains("localhost") || reason.contains("loopback") || reason.contains("private"),
        "unexpected reason: {reason}"
    );
}

#[tokio::test]
async fn test_ssrf_blocks_private_range_target() {
    let (safe, reason) = is_safe_origin_url("https://192.168.0.10/router").await;
    assert!(!safe);
    assert!(reason.contains("private"), "unexpected reason: {reason}");
}

#[test]
fn test_rate_limiter_window_invariants() {
    let limiter = RateLimiter::new(5, 60);
    let ip: IpAddr = "198.51.100.1".parse().unwrap();

    let mut admitted = 0;
    for _ in 0..10 {
        if limiter.is_allowed(ip).0 {
            admitted += 1;
        }
    }
    assert_eq!(admitted, 5, "at most N admissions per window");

    let first = limiter.retry_after(ip);
    assert!(first <= 60, "retry_after bounded by the window");
    let second = limiter.retry_after(ip);
    assert!(second <= first, "retry_after never increases over time");
}

#[test]
fn test_session_verification_is_exact() {
    let sessions = SessionManager::new("an-adequately-long-test-secret-key!!");
    let signed = sessions.mint();
    assert!(sessions.verify(&signed).is_some());

    // Any single-byte perturbation invalidates the cookie.
    let mut corrupted = signed.clone().into_bytes();
    let idx = corrupted.len() / 2;
    corrupted[idx] = if corrupted[idx] == b'a' { b'b' } else { b'a' };
    let corrupted = String::from_utf8(corrupted).unwrap();
    if corrupted != signed {
        assert!(sessions.verify(&corrupted).is_none());
    }
}

#[tokio::test]
async fn test_site_registry_routing() {
    let mut disabled = Site::new(2, "paused.net", "old.net");
    disabled.enabled = false;
    let registry = MemorySiteRegistry::new(vec![mirror_site(), disabled]);

    assert_eq!(
        registry.find_by_host("mirror.com").await.map(|s| s.id),
        Some(1)
    );
    assert_eq!(
        registry.find_by_host("a.b.mirror.com:443").await.map(|s| s.id),
        Some(1)
    );
    assert!(registry.find_by_host("paused.net").await.is_none());
    assert!(registry.find_by_host("unknown.org").await.is_none());
}
