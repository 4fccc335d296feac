#[path = "k8s/probe/liveness/mod.rs"]
pub mod liveness;
#[cfg(test)]
mod tests;

#[cfg(test)]
pub use tests::support;

pub mod admission;
pub mod app;
pub mod config;
pub mod controller;
pub mod credentials;
pub mod governor;
pub mod http;
pub mod metrics;
pub mod registry;
pub mod service;
pub mod shutdown;
pub mod transport;
