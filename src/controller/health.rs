// Node health controller.

use axum::{response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::governor::{HealthState, ResourceGovernor};
use crate::http::Controller;

pub const HEALTH_PATH: &str = "/governor/health";

#[derive(Debug, Serialize)]
struct Band {
    state: HealthState,
    min: f32,
    max: f32,
    max_inclusive: bool,
}

#[derive(Debug, Serialize)]
struct HealthBody {
    enabled: bool,
    state: HealthState,
    heat_map: Vec<Band>,
}

/// Reports the governor's current classification and its bands.
#[derive(Clone)]
pub struct NodeHealthController {
    governor: Option<Arc<ResourceGovernor>>,
}

impl NodeHealthController {
    /// `None` when the governor is disabled; the node then always reports normal.
    pub fn new(governor: Option<Arc<ResourceGovernor>>) -> Self {
        Self { governor }
    }

    fn body(&self) -> HealthBody {
        match self.governor {
            Some(ref gov) => HealthBody {
                enabled: true,
                state: gov.current_health_state(),
                heat_map: gov
                    .heat_map()
                    .entries()
                    .iter()
                    .map(|e| Band {
                        state: e.state,
                        min: e.min,
                        max: e.max,
                        max_inclusive: e.max_inclusive,
                    })
                    .collect(),
            },
            None => HealthBody {
                enabled: false,
                state: HealthState::Normal,
                heat_map: Vec::new(),
            },
        }
    }
}

impl Controller for NodeHealthController {
    fn add_route(&self, router: Router) -> Router {
        let controller = self.clone();
        router.route(
            HEALTH_PATH,
            get(move || {
                let controller = controller.clone();
                async move { Json(controller.body()).into_response() }
            }),
        )
    }
}
