//! Configuration loading

pub mod env;
pub mod site;

pub use env::EnvConfig;
pub use site::SiteConfig;
