pub mod cookie_jar;
pub mod events;
pub mod site_registry;
