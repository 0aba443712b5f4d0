//! Per-request context: the backing-store handle and outbound HTTP client the
//! request runs with. Threaded explicitly from controller to repository.

use crate::controller::ResourceController;
use crate::store::SqlBackend;
use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use std::sync::Arc;

#[derive(Clone)]
pub struct Context {
    store: Arc<dyn SqlBackend>,
    http: reqwest::Client,
}

impl Context {
    pub fn new(store: Arc<dyn SqlBackend>, http: reqwest::Client) -> Self {
        Context { store, http }
    }

    pub fn store(&self) -> &dyn SqlBackend {
        self.store.as_ref()
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }
}

#[async_trait]
impl FromRequestParts<Arc<ResourceController>> for Context {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        _parts: &mut Parts,
        controller: &Arc<ResourceController>,
    ) -> Result<Self, Self::Rejection> {
        Ok(controller.context())
    }
}
