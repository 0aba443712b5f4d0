//! Controller: adapts one resource's usecases to request decoding and the
//! response envelope. Owns the per-resource model and the shared handles a
//! request context is built from.

use crate::config::{ResourceDefinition, Settings};
use crate::context::Context;
use crate::error::{ApiError, ServiceError, UsecaseError};
use crate::model::{Instance, Model, Record};
use crate::operation::Operation;
use crate::repository::{Page, ResourceRepository};
use crate::store::SqlBackend;
use crate::usecase::ResourceUsecases;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// `?page=&page_size=` on listings.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

pub struct ResourceController {
    definition: Arc<ResourceDefinition>,
    model: Model,
    usecases: ResourceUsecases,
    store: Arc<dyn SqlBackend>,
    http: reqwest::Client,
}

impl ResourceController {
    pub fn new(
        definition: Arc<ResourceDefinition>,
        store: Arc<dyn SqlBackend>,
        http: reqwest::Client,
        settings: &Settings,
    ) -> Self {
        let repo = ResourceRepository::new(&definition, store.dialect(), settings.statement_timeout);
        let usecases = ResourceUsecases::new(repo, definition.operations.clone());
        ResourceController {
            model: Model::for_resource(&definition),
            definition,
            usecases,
            store,
            http,
        }
    }

    pub fn definition(&self) -> &ResourceDefinition {
        &self.definition
    }

    /// Fresh context for one request.
    pub fn context(&self) -> Context {
        Context::new(self.store.clone(), self.http.clone())
    }

    pub async fn get_many(&self, ctx: &Context, params: PageParams) -> Result<Vec<Instance>, ApiError> {
        let op = Operation::GetMany;
        let page = Page::new(params.page, params.page_size)?;
        let rows = self
            .usecases
            .get_many(ctx, page)
            .await
            .map_err(|e| self.fail(op, e))?;
        rows.iter().map(|r| self.instance(op, r)).collect()
    }

    pub async fn get_one(&self, ctx: &Context, raw_id: &str) -> Result<Instance, ApiError> {
        let op = Operation::GetOne;
        let id = self.model.parse_id(raw_id)?;
        let row = self
            .usecases
            .get_one(ctx, id)
            .await
            .map_err(|e| self.fail(op, e))?;
        self.instance(op, &row)
    }

    pub async fn post(&self, ctx: &Context, body: &Value) -> Result<Instance, ApiError> {
        let op = Operation::Post;
        let data = self.model.decode_create(body)?;
        let row = self
            .usecases
            .post(ctx, &data)
            .await
            .map_err(|e| self.fail(op, e))?;
        self.instance(op, &row)
    }

    pub async fn patch(&self, ctx: &Context, raw_id: &str, body: &Value) -> Result<Instance, ApiError> {
        let op = Operation::Patch;
        let id = self.model.parse_id(raw_id)?;
        let data = self.model.decode_patch(body)?;
        let row = self
            .usecases
            .patch(ctx, id, &data)
            .await
            .map_err(|e| self.fail(op, e))?;
        self.instance(op, &row)
    }

    pub async fn delete(&self, ctx: &Context, raw_id: &str) -> Result<Instance, ApiError> {
        let op = Operation::Delete;
        let id = self.model.parse_id(raw_id)?;
        let row = self
            .usecases
            .delete(ctx, id)
            .await
            .map_err(|e| self.fail(op, e))?;
        self.instance(op, &row)
    }

    fn fail(&self, op: Operation, err: UsecaseError) -> ApiError {
        match err {
            UsecaseError::NotFound => ApiError::Service {
                kind: ServiceError::ResourceNotFound,
                message: "Resource not found",
            },
            UsecaseError::Unbound(_) => {
                tracing::error!(
                    resource = %self.definition.name,
                    operation = %op,
                    "no usecase bound for operation"
                );
                self.failed(op)
            }
            UsecaseError::Store(e) => {
                tracing::error!(
                    resource = %self.definition.name,
                    operation = %op,
                    error = %e,
                    "backing store failure"
                );
                self.failed(op)
            }
        }
    }

    fn failed(&self, op: Operation) -> ApiError {
        ApiError::Service {
            kind: op.failure_kind(),
            message: op.failure_message(),
        }
    }

    /// Stored rows that no longer fit the model are a server-side failure.
    fn instance(&self, op: Operation, row: &Record) -> Result<Instance, ApiError> {
        self.model.from_record(row).map_err(|e| {
            tracing::error!(
                resource = %self.definition.name,
                operation = %op,
                error = %e,
                "stored record does not match model"
            );
            self.failed(op)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_from_str;
    use crate::sql::Dialect;
    use crate::store::MemoryBackend;
    use axum::http::StatusCode;
    use serde_json::json;
    use std::time::Duration;

    const SPEC: &str = r#"{
        "services": [{"name": "main", "type": "sql", "driver": "memory"}],
        "resources": [{
            "name": "Account", "table_name": "accounts",
            "methods": ["get_many", "get_one", "post", "patch", "delete"],
            "model": {"id": "identifier", "name": "string", "password": "secret"},
            "backing_service": "main"
        }]
    }"#;

    fn controller() -> ResourceController {
        let spec = load_from_str(SPEC).unwrap();
        let store: Arc<dyn SqlBackend> = Arc::new(MemoryBackend::new(Dialect::MySql));
        ResourceController::new(
            spec.resources[0].clone(),
            store,
            reqwest::Client::new(),
            &Settings::default(),
        )
    }

    #[tokio::test]
    async fn page_zero_is_a_validation_error() {
        let c = controller();
        let err = c
            .get_many(&c.context(), PageParams { page: Some(0), page_size: None })
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn malformed_id_is_a_validation_error() {
        let c = controller();
        let err = c.get_one(&c.context(), "not-a-uuid").await.unwrap_err();
        assert_eq!(err.code(), "request.validation_failed");
    }

    #[tokio::test]
    async fn missing_row_is_not_found() {
        let c = controller();
        let id = uuid::Uuid::new_v4().to_string();
        for err in [
            c.get_one(&c.context(), &id).await.unwrap_err(),
            c.patch(&c.context(), &id, &json!({"name": "x"})).await.unwrap_err(),
            c.delete(&c.context(), &id).await.unwrap_err(),
        ] {
            assert_eq!(err.status(), StatusCode::NOT_FOUND);
            assert_eq!(err.code(), "resource.not_found");
        }
    }

    #[tokio::test]
    async fn unbound_operation_reports_operation_failure() {
        let spec = load_from_str(SPEC).unwrap();
        let def = spec.resources[0].clone();
        let store: Arc<dyn SqlBackend> = Arc::new(MemoryBackend::new(Dialect::Postgres));
        let repo = ResourceRepository::new(&def, Dialect::Postgres, Duration::from_secs(5));
        let c = ResourceController {
            model: Model::for_resource(&def),
            usecases: ResourceUsecases::new(repo, [Operation::GetOne].into_iter().collect()),
            definition: def,
            store,
            http: reqwest::Client::new(),
        };
        let err = c.post(&c.context(), &json!({"name": "a", "password": "p"})).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "resource.creation_failed");
    }
}
