// HTTP module: admin server and the controller interface.

use axum::Router;

pub mod server;

pub use server::AdminServer;

/// A group of admin endpoints mounted on the shared router.
pub trait Controller: Send + Sync {
    /// Returns `router` with this controller's routes added.
    fn add_route(&self, router: Router) -> Router;
}
