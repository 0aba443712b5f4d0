//! Router assembly: service routes plus one route set per resource.

pub mod common;
pub mod resource;

pub use common::common_routes;
pub use resource::{plan_routes, resource_routes, RouteSpec};

use crate::config::{ResolvedSpec, Settings};
use crate::controller::ResourceController;
use crate::error::ConfigError;
use crate::state::AppState;
use crate::store::ServiceRegistry;
use axum::Router;
use std::sync::Arc;
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Build the full application. Fails if a resource's backing service is not
/// in the registry.
pub fn build_router(
    spec: &ResolvedSpec,
    services: &ServiceRegistry,
    settings: &Settings,
    http: reqwest::Client,
) -> Result<Router, ConfigError> {
    let mut app = common_routes(AppState::new(services.clone()));
    for def in &spec.resources {
        let store = services
            .get(&def.backing_service)
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "service",
                id: def.backing_service.clone(),
            })?;
        let controller = ResourceController::new(def.clone(), store, http.clone(), settings);
        app = app.merge(resource_routes(Arc::new(controller)));
    }
    for route in plan_routes(spec) {
        tracing::info!(
            resource = %route.resource,
            operation = %route.operation,
            method = route.method,
            path = %route.path,
            "route registered"
        );
    }
    Ok(app
        .layer(RequestBodyLimitLayer::new(settings.body_limit))
        .layer(TraceLayer::new_for_http()))
}
