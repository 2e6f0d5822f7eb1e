use std::sync::Arc;

use crate::core::config::{MirrorConfig, Settings};
use crate::core::rate_limiter::RateLimiter;
use crate::core::session::SessionManager;
use crate::features::cookie_jar::{CookieStore, MemoryCookieStore};
use crate::features::events::{EventSink, TracingEventSink};
use crate::features::site_registry::{
    GlobalConfigStore, MemoryGlobalConfigStore, MemorySiteRegistry, SiteRegistry,
};
use crate::rewrite::filter::AdFilter;

#[derive(Clone)]
pub struct AppState {
    pub http_client: reqwest::Client,
    pub settings: Arc<Settings>,
    pub sites: Arc<dyn SiteRegistry>,
    pub global_config: Arc<dyn GlobalConfigStore>,
    pub cookies: Arc<dyn CookieStore>,
    pub events: Arc<dyn EventSink>,
    pub sessions: Arc<SessionManager>,
    pub rate_limiter: Arc<RateLimiter>,
    pub ad_filter: Arc<AdFilter>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("admin_host", &self.settings.admin_host)
            .field("rate_limiting", &self.settings.enable_rate_limiting)
            .finish()
    }
}

impl AppState {
    /// Assemble state around the shared upstream client. The in-memory
    /// collaborator implementations are seeded from the mirror config file;
    /// any of them can be swapped with the `with_*` builders.
    pub fn new(http_client: reqwest::Client, settings: Settings, mirror: MirrorConfig) -> Self {
        let sessions = Arc::new(SessionManager::new(&settings.secret_key));
        let rate_limiter = Arc::new(RateLimiter::new(
            settings.rate_limit_requests,
            settings.rate_limit_window,
        ));
        Self {
            http_client,
            settings: Arc::new(settings),
            sites: Arc::new(MemorySiteRegistry::new(mirror.sites)),
            global_config: Arc::new(MemoryGlobalConfigStore::new(Some(mirror.global))),
            cookies: Arc::new(MemoryCookieStore::new()),
            events: Arc::new(TracingEventSink),
            sessions,
            rate_limiter,
            ad_filter: Arc::new(AdFilter::new()),
        }
    }

    pub fn with_sites(mut self, sites: Arc<dyn SiteRegistry>) -> Self {
        self.sites = sites;
        self
    }

    pub fn with_cookie_store(mut self, cookies: Arc<dyn CookieStore>) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }
}
