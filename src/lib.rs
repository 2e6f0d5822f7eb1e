pub mod core;
pub mod features;
pub mod proxy;
pub mod rewrite;

// --- Primary core exports ---
pub use core::types;
pub use core::types::*;
pub use core::AppState;

// --- Convenience module paths ---
pub use core::{config, mapper, rate_limiter, security, session};
pub use features::{cookie_jar, events, site_registry};
pub use proxy::{handler, headers};
pub use rewrite::{css, filter, html, js};
