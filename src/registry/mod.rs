//! Service registry: listen addresses, URI templates, request resolution.

pub mod address;
pub mod error;
pub mod registry;


pub use address::{ListenAddress, UriTemplate};
pub use error::{RegistryError, ResolveError, TemplateError};
pub use registry::{Registration, Resolver, ServiceRegistry};
