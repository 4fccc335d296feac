// Error definitions for service registration and resolution.

/// Errors produced while parsing a listen address or URI template.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("uri template {0:?} has no scheme")]
    MissingScheme(String),
    #[error("uri template {0:?} has no host")]
    MissingHost(String),
    #[error("uri template {0:?} has an invalid port")]
    InvalidPort(String),
    #[error("placeholder {segment:?} is not allowed at this position of {template:?}")]
    MisplacedPlaceholder { template: String, segment: String },
    #[error("endpoint {0:?} does not resolve to a port")]
    MissingPort(String),
    #[error("endpoint {endpoint:?} is not a valid uri: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
}

/// Configuration errors reported by `ServiceRegistry::register`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("listening service for {key} already registered")]
    SchemeAndPortTaken { key: String },
    #[error("uri template {template} already registered for scheme {scheme}")]
    DuplicateTemplate { scheme: String, template: String },
    #[error("invalid listen address {address}: {source}")]
    InvalidAddress {
        address: String,
        #[source]
        source: TemplateError,
    },
}

impl RegistryError {
    /// A taken scheme:port is tolerated (first registration wins); the other
    /// variants are configuration bugs.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RegistryError::SchemeAndPortTaken { .. })
    }
}

/// Resolution failures. Always a server-side fault: a request reached an
/// address no service was registered for.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("no service resolved for uri {uri}")]
    NoService { uri: String },
}

impl ResolveError {
    pub fn is_server_fault(&self) -> bool {
        match self {
            ResolveError::NoService { .. } => true,
        }
    }
}
