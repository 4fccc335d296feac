//! Service registration and request URI resolution.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{error, trace};
use url::Url;

use super::address::{scheme_port_key, ListenAddress, UriTemplate};
use super::error::{RegistryError, ResolveError};
use crate::metrics::meter;
use crate::service::GatewayService;

/// Lookup strategy, fixed for the lifetime of a registry.
pub enum Resolver {
    /// Local emulator: requests are routed by `"scheme:port"` only.
    Fixed {
        by_scheme_and_port: HashMap<String, Arc<dyn GatewayService>>,
    },
    /// Production: requests are routed by the URI template they fold into.
    Templated,
}

/// Outcome of a single `register` call.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[must_use]
pub struct Registration {
    pub bound_ports: usize,
    pub bound_templates: usize,
    pub errors: Vec<RegistryError>,
}

impl Registration {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Fails on the first configuration bug; taken ports alone are tolerated.
    pub fn into_result(self) -> Result<Self, RegistryError> {
        match self.errors.iter().find(|err| err.is_fatal()) {
            Some(err) => Err(err.clone()),
            None => Ok(self),
        }
    }
}

/// Maps listen addresses to registered services.
///
/// Populated through `&mut self` at startup, then shared behind an `Arc`
/// for lock-free resolution.
pub struct ServiceRegistry {
    resolver: Resolver,
    by_scheme_and_template: HashMap<String, HashMap<UriTemplate, Arc<dyn GatewayService>>>,
}

impl ServiceRegistry {
    /// Creates a registry. `is_local_emulator` picks the lookup strategy once.
    pub fn new(is_local_emulator: bool) -> Self {
        let resolver = if is_local_emulator {
            Resolver::Fixed {
                by_scheme_and_port: HashMap::new(),
            }
        } else {
            Resolver::Templated
        };

        Self {
            resolver,
            by_scheme_and_template: HashMap::new(),
        }
    }

    pub fn is_local_emulator(&self) -> bool {
        matches!(self.resolver, Resolver::Fixed { .. })
    }

    /// Registers `service` under every address in `listen_addresses`.
    ///
    /// Conflicting entries are logged, skipped and reported in the returned
    /// `Registration`; earlier registrations are never overwritten.
    pub fn register(
        &mut self,
        service: Arc<dyn GatewayService>,
        listen_addresses: &[ListenAddress],
    ) -> Registration {
        let mut outcome = Registration::default();

        for address in listen_addresses {
            if let Resolver::Fixed { by_scheme_and_port } = &mut self.resolver {
                match address.scheme_port_key() {
                    Some(Ok(key)) => match by_scheme_and_port.entry(key) {
                        Entry::Occupied(taken) => {
                            error!(
                                component = "registry",
                                event = "scheme_and_port_taken",
                                key = %taken.key(),
                                service = service.name(),
                                "listening service already registered"
                            );
                            meter::inc_registry_collisions();
                            outcome.errors.push(RegistryError::SchemeAndPortTaken {
                                key: taken.key().clone(),
                            });
                        }
                        Entry::Vacant(slot) => {
                            slot.insert(service.clone());
                            outcome.bound_ports += 1;
                        }
                    },
                    Some(Err(source)) => {
                        Self::report_invalid(&mut outcome, address, source);
                        continue;
                    }
                    None => {}
                }
            }

            let template = match address.to_template() {
                Ok(template) => template,
                Err(source) => {
                    Self::report_invalid(&mut outcome, address, source);
                    continue;
                }
            };

            let by_template = self
                .by_scheme_and_template
                .entry(template.scheme().to_string())
                .or_default();
            match by_template.entry(template) {
                Entry::Occupied(taken) => {
                    error!(
                        component = "registry",
                        event = "duplicate_template",
                        scheme = taken.key().scheme(),
                        template = %taken.key(),
                        service = service.name(),
                        "uri template already registered"
                    );
                    meter::inc_registry_collisions();
                    outcome.errors.push(RegistryError::DuplicateTemplate {
                        scheme: taken.key().scheme().to_string(),
                        template: taken.key().to_string(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(service.clone());
                    outcome.bound_templates += 1;
                }
            }
        }

        outcome
    }

    fn report_invalid(outcome: &mut Registration, address: &ListenAddress, source: super::TemplateError) {
        error!(
            component = "registry",
            event = "invalid_address",
            address = %address,
            error = %source,
            "listen address skipped"
        );
        outcome.errors.push(RegistryError::InvalidAddress {
            address: address.to_string(),
            source,
        });
    }

    /// Resolves the service a request URI is addressed to.
    pub fn resolve(&self, request_uri: &Url) -> Result<Arc<dyn GatewayService>, ResolveError> {
        let found = match &self.resolver {
            Resolver::Fixed { by_scheme_and_port } => {
                scheme_port_key(request_uri).and_then(|key| by_scheme_and_port.get(&key))
            }
            Resolver::Templated => self
                .by_scheme_and_template
                .get(&request_uri.scheme().to_ascii_lowercase())
                .and_then(|by_template| {
                    UriTemplate::candidates(request_uri)
                        .iter()
                        .find_map(|template| by_template.get(template))
                }),
        };

        match found {
            Some(service) => {
                trace!(
                    component = "registry",
                    service = service.name(),
                    uri = %request_uri,
                    "service resolved"
                );
                Ok(service.clone())
            }
            None => {
                error!(
                    component = "registry",
                    event = "resolve_failed",
                    uri = %request_uri,
                    "no service resolved for uri"
                );
                meter::inc_resolve_failures();
                Err(ResolveError::NoService {
                    uri: request_uri.to_string(),
                })
            }
        }
    }

    /// Every template registered under `scheme` (case-insensitive).
    ///
    /// The iterator borrows the registry, so it can be recreated at will.
    pub fn registered_templates<'a>(&'a self, scheme: &'a str) -> impl Iterator<Item = &'a UriTemplate> + 'a {
        self.by_scheme_and_template
            .iter()
            .filter(move |(registered, _)| registered.eq_ignore_ascii_case(scheme))
            .flat_map(|(_, by_template)| by_template.keys())
    }

    pub fn registered_schemes(&self) -> impl Iterator<Item = &str> {
        self.by_scheme_and_template.keys().map(String::as_str)
    }

    /// Number of registered templates across all schemes.
    pub fn len(&self) -> usize {
        self.by_scheme_and_template.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
