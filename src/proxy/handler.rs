//! The proxy request orchestrator.
//!
//! Per-request pipeline: admission → admin-host guard → site lookup →
//! forward mapping → SSRF check → effective config → session/cookie
//! in-flight → upstream fetch → redirect interception, size gate, HTML
//! transform, or passthrough → emit. Terminal errors short-circuit with
//! 429/403/404/413/502; exactly one request event is emitted either way.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use cookie::{Cookie, SameSite};
use url::Url;

use crate::core::app_state::AppState;
use crate::core::mapper::{build_origin_url, make_absolute_url, rewrite_url, RewriteContext};
use crate::core::security::is_safe_origin_url;
use crate::core::session::SESSION_COOKIE_NAME;
use crate::core::types::{EffectiveConfig, SessionMode};
use crate::features::cookie_jar::{build_cookie_header, lookup, parse_cookie_header};
use crate::features::events::{level_for, RequestEvent};
use crate::proxy::headers::{
    filter_response_headers, is_media_content_type, FORWARD_HEADERS, REDIRECT_COPY_HEADERS,
};
use crate::rewrite::html::rewrite_html;

/// Cap on buffered request bodies forwarded upstream.
const MAX_REQUEST_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Session cookie lifetime: 30 days.
const SESSION_COOKIE_MAX_AGE_DAYS: i64 = 30;

/// Terminal proxy outcomes. Each renders as a plain-text response; none of
/// them is retried.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Rate limit exceeded. Try again in {retry_after} seconds.")]
    RateLimited { retry_after: u64, limit: usize },

    #[error("Not found")]
    AdminHost,

    #[error("No site configured for host: {0}")]
    UnknownHost(String),

    #[error("{reason}")]
    UnsafeOrigin { reason: String, origin_url: String },

    #[error("Response too large: {declared_mb:.1}MB exceeds {limit_mb}MB limit")]
    ResponseTooLarge {
        declared_mb: f64,
        limit_mb: u64,
        origin_url: String,
    },

    #[error("Error fetching origin: {source}")]
    Upstream {
        #[source]
        source: reqwest::Error,
        origin_url: String,
    },
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ProxyError::AdminHost | ProxyError::UnknownHost(_) => StatusCode::NOT_FOUND,
            ProxyError::UnsafeOrigin { .. } => StatusCode::FORBIDDEN,
            ProxyError::ResponseTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::Upstream { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    pub fn origin_url(&self) -> Option<&str> {
        match self {
            ProxyError::UnsafeOrigin { origin_url, .. }
            | ProxyError::ResponseTooLarge { origin_url, .. }
            | ProxyError::Upstream { origin_url, .. } => Some(origin_url),
            _ => None,
        }
    }

    fn to_response(&self) -> Response {
        let mut response = (self.status(), self.to_string()).into_response();
        if let ProxyError::RateLimited { retry_after, limit } = self {
            let headers = response.headers_mut();
            headers.insert("Retry-After", HeaderValue::from(*retry_after));
            headers.insert("X-RateLimit-Limit", HeaderValue::from(*limit as u64));
            headers.insert("X-RateLimit-Remaining", HeaderValue::from_static("0"));
            headers.insert("X-RateLimit-Reset", HeaderValue::from(*retry_after));
        }
        response
    }
}

struct RouteOutcome {
    response: Response,
    origin_url: Option<String>,
    message: String,
}

/// Catch-all handler: every method, every path, every mirror host.
pub async fn proxy_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    req: Request,
) -> Response {
    let started = Instant::now();
    let (parts, body) = req.into_parts();

    let raw_host = parts
        .headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let mirror_host = raw_host
        .split(':')
        .next()
        .unwrap_or("")
        .to_string();
    let client_ip = addr.ip();
    let user_agent = parts
        .headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let outcome = route_request(
        &state,
        &parts.method,
        &parts.uri,
        &parts.headers,
        body,
        client_ip,
        &mirror_host,
    )
    .await;

    let (response, origin_url, message, proxy_generated) = match outcome {
        Ok(out) => (out.response, out.origin_url, out.message, false),
        Err(err) => {
            let response = err.to_response();
            let origin_url = err.origin_url().map(str::to_string);
            (response, origin_url, err.to_string(), true)
        }
    };

    let status = response.status().as_u16();
    let event = RequestEvent {
        timestamp: chrono::Utc::now().to_rfc3339(),
        level: level_for(status, proxy_generated),
        logger: "mirrorgate",
        message,
        client_ip: client_ip.to_string(),
        mirror_host: raw_host,
        origin_url,
        status_code: status,
        latency_ms: started.elapsed().as_millis() as u64,
        user_agent,
    };
    state.events.emit(&event).await;

    response
}

async fn route_request(
    state: &AppState,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Body,
    client_ip: IpAddr,
    mirror_host: &str,
) -> Result<RouteOutcome, ProxyError> {
    // Admission.
    if state.settings.enable_rate_limiting {
        let (allowed, _remaining) = state.rate_limiter.is_allowed(client_ip);
        if !allowed {
            return Err(ProxyError::RateLimited {
                retry_after: state.rate_limiter.retry_after(client_ip),
                limit: state.rate_limiter.limit(),
            });
        }
    }

    // Admin traffic must not traverse the proxy.
    if mirror_host == state.settings.admin_host
        || mirror_host.starts_with("0.0.0.0")
        || mirror_host.starts_with("localhost")
    {
        return Err(ProxyError::AdminHost);
    }

    let site = state
        .sites
        .find_by_host(mirror_host)
        .await
        .ok_or_else(|| ProxyError::UnknownHost(mirror_host.to_string()))?;

    let origin_url = build_origin_url(
        mirror_host,
        uri.path(),
        uri.query(),
        &site.source_root,
        &site.mirror_root,
    );

    let (safe, reason) = is_safe_origin_url(&origin_url).await;
    if !safe {
        return Err(ProxyError::UnsafeOrigin { reason, origin_url });
    }

    let global = state.global_config.get().await;
    let config = EffectiveConfig::resolve(&site, &global);

    // Session acquisition (cookie-jar mode only): verify the presented
    // cookie, mint a fresh one when absent or invalid.
    let mut session_id: Option<String> = None;
    let mut fresh_session_cookie: Option<String> = None;
    if config.session_mode == SessionMode::CookieJar {
        if let Some(cookie_header) = headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) {
            let cookies = parse_cookie_header(cookie_header);
            if let Some(signed) = lookup(&cookies, SESSION_COOKIE_NAME) {
                session_id = state.sessions.verify(signed);
            }
        }
        if session_id.is_none() {
            let signed = state.sessions.mint();
            session_id = state.sessions.verify(&signed);
            fresh_session_cookie = Some(signed);
        }
    }

    let origin_host = Url::parse(&origin_url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default();

    // Build the upstream request: curated header forwarding, jar cookies,
    // Referer replaced with our own origin URL. reqwest derives Host from
    // the origin URL itself.
    let mut upstream_req = state
        .http_client
        .request(method.clone(), &origin_url)
        .timeout(Duration::from_secs(state.settings.request_timeout));

    for name in &FORWARD_HEADERS {
        if let Some(value) = headers.get(name) {
            upstream_req = upstream_req.header(name, value);
        }
    }
    if headers.contains_key(header::REFERER) {
        upstream_req = upstream_req.header(header::REFERER, origin_url.as_str());
    }
    if let Some(sid) = &session_id {
        let jar = state.cookies.get(site.id, sid, &origin_host).await;
        if !jar.is_empty() {
            upstream_req = upstream_req.header(header::COOKIE, build_cookie_header(&jar));
        }
    }
    if matches!(*method, Method::POST | Method::PUT | Method::PATCH) {
        let body_bytes = axum::body::to_bytes(body, MAX_REQUEST_BODY_BYTES)
            .await
            .unwrap_or_default();
        upstream_req = upstream_req.body(body_bytes);
    }

    let upstream = upstream_req.send().await.map_err(|e| ProxyError::Upstream {
        source: e,
        origin_url: origin_url.clone(),
    })?;

    let status = upstream.status();
    let content_type = upstream
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    // Size gate: declared Content-Length on non-media content.
    if !is_media_content_type(&content_type) {
        if let Some(declared) = upstream
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
        {
            if declared > state.settings.max_response_size_bytes() {
                return Err(ProxyError::ResponseTooLarge {
                    declared_mb: declared as f64 / (1024.0 * 1024.0),
                    limit_mb: state.settings.max_response_size_mb,
                    origin_url,
                });
            }
        }
    }

    // Persist origin cookies into the jar.
    if let Some(sid) = &session_id {
        let set_cookies: Vec<String> = upstream
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect();
        if !set_cookies.is_empty() {
            state
                .cookies
                .store(site.id, sid, &origin_host, &set_cookies)
                .await;
        }
    }

    let ctx = RewriteContext {
        mirror_host,
        mirror_root: &site.mirror_root,
        source_root: &site.source_root,
        page_origin_url: &origin_url,
        config: &config,
    };

    // Redirect interception: rewrite Location back into the mirror
    // namespace and relay only the safe headers.
    if status.is_redirection() {
        if let Some(location) = upstream
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
        {
            let absolute = make_absolute_url(location, &origin_url);
            let mirror_location = rewrite_url(&absolute, &ctx);

            let mut response_headers = HeaderMap::new();
            if let Ok(value) = HeaderValue::from_str(&mirror_location) {
                response_headers.insert(header::LOCATION, value);
            }
            for name in REDIRECT_COPY_HEADERS {
                if let Some(value) = upstream.headers().get(name) {
                    response_headers.insert(name.clone(), value.clone());
                }
            }
            append_session_cookie(&mut response_headers, &fresh_session_cookie);

            return Ok(RouteOutcome {
                response: (status, response_headers, Body::empty()).into_response(),
                message: format!("Proxy redirect: {origin_url} -> {mirror_location}"),
                origin_url: Some(origin_url),
            });
        }
    }

    let mut response_headers = filter_response_headers(upstream.headers());
    let body_bytes = upstream.bytes().await.map_err(|e| ProxyError::Upstream {
        source: e,
        origin_url: origin_url.clone(),
    })?;

    if content_type.to_ascii_lowercase().contains("text/html") {
        // HTML transform chain: clean → rewrite → inject.
        let html = String::from_utf8_lossy(&body_bytes);
        let cleaned = state.ad_filter.clean(&html, &config);
        let rewritten = rewrite_html(&cleaned, &ctx);
        let final_html = state.ad_filter.inject(&rewritten, &config);

        append_session_cookie(&mut response_headers, &fresh_session_cookie);
        Ok(RouteOutcome {
            response: (status, response_headers, final_html).into_response(),
            message: format!("Proxy HTML: {origin_url}"),
            origin_url: Some(origin_url),
        })
    } else {
        append_session_cookie(&mut response_headers, &fresh_session_cookie);
        Ok(RouteOutcome {
            response: (status, response_headers, body_bytes).into_response(),
            message: format!("Proxy content: {origin_url}"),
            origin_url: Some(origin_url),
        })
    }
}

/// Emit the freshly minted session cookie, when there is one.
fn append_session_cookie(headers: &mut HeaderMap, fresh_cookie: &Option<String>) {
    let Some(signed) = fresh_cookie else {
        return;
    };
    let cookie = Cookie::build((SESSION_COOKIE_NAME, signed.as_str()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(cookie::time::Duration::days(SESSION_COOKIE_MAX_AGE_DAYS))
        .build();
    if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
        headers.append(header::SET_COOKIE, value);
    }
}
