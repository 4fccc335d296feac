// Gateway application lifecycle.

pub mod app;

pub use app::{listen_ip, App};
