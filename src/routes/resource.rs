//! Resource routes: the (resource, operation) → (method, path) table and the
//! axum routes mounted from it.

use crate::config::{ResolvedSpec, ResourceDefinition};
use crate::controller::ResourceController;
use crate::handlers::resource as handlers;
use crate::operation::Operation;
use axum::routing::MethodRouter;
use axum::Router;
use serde::Serialize;
use std::sync::Arc;

/// One mounted endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RouteSpec {
    pub resource: String,
    pub operation: Operation,
    pub method: &'static str,
    /// `/{segment}` or `/{segment}/{id}`.
    pub path: String,
}

/// Every endpoint the resolved spec exposes, in resource then operation order.
pub fn plan_routes(spec: &ResolvedSpec) -> Vec<RouteSpec> {
    spec.resources
        .iter()
        .flat_map(|def| {
            def.operations.iter().map(move |&op| RouteSpec {
                resource: def.name.clone(),
                operation: op,
                method: op.http_method(),
                path: display_path(def, op),
            })
        })
        .collect()
}

fn display_path(def: &ResourceDefinition, op: Operation) -> String {
    if op.addresses_one() {
        format!("{}/{{id}}", def.path)
    } else {
        def.path.clone()
    }
}

fn bind(router: MethodRouter<Arc<ResourceController>>, op: Operation) -> MethodRouter<Arc<ResourceController>> {
    let filter = op.method_filter();
    match op {
        Operation::GetMany => router.on(filter, handlers::get_many),
        Operation::GetOne => router.on(filter, handlers::get_one),
        Operation::Post => router.on(filter, handlers::post),
        Operation::Patch => router.on(filter, handlers::patch),
        Operation::Delete => router.on(filter, handlers::delete),
    }
}

/// Routes for the operations the controller's resource allows. Other methods
/// on a mounted path answer 405.
pub fn resource_routes(controller: Arc<ResourceController>) -> Router {
    let def = controller.definition();
    let mut collection: Option<MethodRouter<Arc<ResourceController>>> = None;
    let mut single: Option<MethodRouter<Arc<ResourceController>>> = None;
    for &op in &def.operations {
        let slot = if op.addresses_one() {
            &mut single
        } else {
            &mut collection
        };
        *slot = Some(bind(slot.take().unwrap_or_else(MethodRouter::new), op));
    }

    let mut router = Router::new();
    if let Some(methods) = collection {
        router = router.route(&def.path, methods);
    }
    if let Some(methods) = single {
        router = router.route(&format!("{}/:id", def.path), methods);
    }
    router.with_state(controller)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_from_str;

    #[test]
    fn plan_follows_the_operation_table() {
        let spec = load_from_str(
            r#"{
                "services": [{"name": "db", "type": "sql", "driver": "memory"}],
                "resources": [{
                    "name": "Account", "table_name": "accounts",
                    "methods": ["delete", "post", "get_one", "get_many", "patch"],
                    "model": {"id": "identifier", "name": "string"},
                    "backing_service": "db"
                }]
            }"#,
        )
        .unwrap();
        let plan: Vec<(&str, String)> = plan_routes(&spec)
            .into_iter()
            .map(|r| (r.method, r.path))
            .collect();
        assert_eq!(
            plan,
            [
                ("GET", "/account".to_string()),
                ("GET", "/account/{id}".to_string()),
                ("POST", "/account".to_string()),
                ("PATCH", "/account/{id}".to_string()),
                ("DELETE", "/account/{id}".to_string()),
            ]
        );
    }

    #[test]
    fn only_allowed_operations_are_planned() {
        let spec = load_from_str(
            r#"{
                "services": [{"name": "db", "type": "sql", "driver": "memory"}],
                "resources": [{
                    "name": "Session", "table_name": "sessions", "path": "sessions",
                    "methods": ["get_one"],
                    "model": {"id": "identifier"},
                    "backing_service": "db"
                }]
            }"#,
        )
        .unwrap();
        let plan = plan_routes(&spec);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].operation, Operation::GetOne);
        assert_eq!(plan[0].path, "/sessions/{id}");
    }
}
