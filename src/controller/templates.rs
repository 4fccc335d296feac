// Registered templates controller.

use axum::{extract::Query, response::IntoResponse, routing::get, Json, Router};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::http::Controller;
use crate::registry::ServiceRegistry;

pub const TEMPLATES_PATH: &str = "/registry/templates";

#[derive(Debug, Deserialize)]
struct TemplatesQuery {
    scheme: Option<String>,
}

/// Lists registered URI templates, optionally for one scheme.
#[derive(Clone)]
pub struct RegisteredTemplatesController {
    registry: Arc<ServiceRegistry>,
}

impl RegisteredTemplatesController {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self { registry }
    }

    fn sorted(&self, scheme: &str) -> Vec<String> {
        let mut templates: Vec<String> = self
            .registry
            .registered_templates(scheme)
            .map(|t| t.as_str().to_string())
            .collect();
        templates.sort();
        templates
    }

    fn by_scheme(&self, scheme: Option<&str>) -> BTreeMap<String, Vec<String>> {
        match scheme {
            Some(scheme) => BTreeMap::from([(scheme.to_ascii_lowercase(), self.sorted(scheme))]),
            None => self
                .registry
                .registered_schemes()
                .map(|s| (s.to_string(), self.sorted(s)))
                .collect(),
        }
    }
}

impl Controller for RegisteredTemplatesController {
    fn add_route(&self, router: Router) -> Router {
        let controller = self.clone();
        router.route(
            TEMPLATES_PATH,
            get(move |Query(query): Query<TemplatesQuery>| {
                let controller = controller.clone();
                async move { Json(controller.by_scheme(query.scheme.as_deref())).into_response() }
            }),
        )
    }
}
