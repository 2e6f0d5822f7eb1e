//! Site registry and global-config store — the read side of the admin
//! surface. The proxy core only consumes these traits; the in-memory
//! implementations are seeded from `mirrorgate.json` at startup.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::core::types::{GlobalConfig, Site};

#[async_trait]
pub trait SiteRegistry: Send + Sync {
    /// Find an enabled site whose `mirror_root` equals `host` or is a DNS
    /// suffix of it. `host` may carry a port; it is stripped first.
    async fn find_by_host(&self, host: &str) -> Option<Site>;
}

#[async_trait]
pub trait GlobalConfigStore: Send + Sync {
    /// The singleton defaults. A defaulted row is created on first access.
    async fn get(&self) -> GlobalConfig;
}

// ---------------------------------------------------------------------------

pub struct MemorySiteRegistry {
    sites: RwLock<Vec<Site>>,
}

impl MemorySiteRegistry {
    pub fn new(sites: Vec<Site>) -> Self {
        Self {
            sites: RwLock::new(sites),
        }
    }

    pub async fn insert(&self, site: Site) {
        self.sites.write().await.push(site);
    }
}

#[async_trait]
impl SiteRegistry for MemorySiteRegistry {
    async fn find_by_host(&self, host: &str) -> Option<Site> {
        let host = host.split(':').next().unwrap_or(host);
        let sites = self.sites.read().await;
        sites
            .iter()
            .filter(|s| s.enabled)
            .find(|s| {
                host == s.mirror_root || host.ends_with(&format!(".{}", s.mirror_root))
            })
            .cloned()
    }
}

pub struct MemoryGlobalConfigStore {
    config: RwLock<Option<GlobalConfig>>,
}

impl MemoryGlobalConfigStore {
    pub fn new(config: Option<GlobalConfig>) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }
}

#[async_trait]
impl GlobalConfigStore for MemoryGlobalConfigStore {
    async fn get(&self) -> GlobalConfig {
        {
            let cfg = self.config.read().await;
            if let Some(cfg) = cfg.as_ref() {
                return cfg.clone();
            }
        }
        let mut cfg = self.config.write().await;
        cfg.get_or_insert_with(GlobalConfig::default).clone()
    }
}
