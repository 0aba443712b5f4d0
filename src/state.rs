//! Shared state for the service-level routes.

use crate::store::ServiceRegistry;

#[derive(Clone)]
pub struct AppState {
    pub services: ServiceRegistry,
}

impl AppState {
    pub fn new(services: ServiceRegistry) -> Self {
        AppState { services }
    }
}
