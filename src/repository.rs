//! Repository: one per resource. Talks to the backing store through the request
//! context and returns raw records; `None` means no matching row.

use crate::config::ResourceDefinition;
use crate::context::Context;
use crate::error::{StoreError, ValidationError};
use crate::model::{Changeset, Field, Instance, Record};
use crate::sql::{self, Dialect, Param, QueryTemplate, Statement};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 1000;

/// A validated 1-based page request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    number: i64,
    size: i64,
}

impl Page {
    /// `page` and `page_size` must both be at least 1; size is capped.
    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Result<Page, ValidationError> {
        let number = page.unwrap_or(DEFAULT_PAGE);
        let size = page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if number < 1 {
            return Err(ValidationError::new("page", "must be at least 1"));
        }
        if size < 1 {
            return Err(ValidationError::new("page_size", "must be at least 1"));
        }
        let size = size.min(MAX_PAGE_SIZE);
        (number - 1)
            .checked_mul(size)
            .ok_or_else(|| ValidationError::new("page", "is too large"))?;
        Ok(Page { number, size })
    }

    pub fn limit(&self) -> i64 {
        self.size
    }

    pub fn offset(&self) -> i64 {
        (self.number - 1) * self.size
    }
}

impl Default for Page {
    fn default() -> Self {
        Page {
            number: DEFAULT_PAGE,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

pub struct ResourceRepository {
    dialect: Dialect,
    table: String,
    fields: Arc<[Field]>,
    select_one: QueryTemplate,
    select_page: QueryTemplate,
    insert: QueryTemplate,
    delete: QueryTemplate,
    deadline: Duration,
}

impl ResourceRepository {
    /// Render the fixed statements for `def` once.
    pub fn new(def: &ResourceDefinition, dialect: Dialect, deadline: Duration) -> Self {
        let table = def.table_name.as_str();
        let fields = &def.fields;
        ResourceRepository {
            dialect,
            table: table.to_string(),
            fields: fields.clone(),
            select_one: sql::select_by_id(dialect, table, fields),
            select_page: sql::select_page(dialect, table, fields),
            insert: sql::insert(dialect, table, fields),
            delete: sql::delete(dialect, table, fields),
            deadline,
        }
    }

    pub async fn get_one(&self, ctx: &Context, id: Uuid) -> Result<Option<Record>, StoreError> {
        let stmt = self.select_one.bind(vec![Param::id(id)]);
        self.fetch_one(ctx, &stmt).await
    }

    pub async fn get_many(&self, ctx: &Context, page: Page) -> Result<Vec<Record>, StoreError> {
        let stmt = self
            .select_page
            .bind(vec![Param::integer(page.limit()), Param::integer(page.offset())]);
        log_statement(&stmt);
        self.timed(ctx.store().fetch_all(&stmt)).await
    }

    /// Insert every declared field of `data` and return the stored row.
    pub async fn post(&self, ctx: &Context, data: &Instance) -> Result<Option<Record>, StoreError> {
        let id = data
            .id()
            .ok_or_else(|| StoreError::Malformed("record has no identifier".into()))?;
        let params = data
            .iter()
            .map(|(f, v)| Param::new(f.ty, v.clone()))
            .collect();
        let stmt = self.insert.bind(params);
        if self.dialect.supports_returning() {
            return self.fetch_one(ctx, &stmt).await;
        }
        self.execute(ctx, &stmt).await?;
        self.get_one(ctx, id).await
    }

    /// Update the supplied columns of row `id` and return its new state.
    pub async fn patch(
        &self,
        ctx: &Context,
        id: Uuid,
        data: &Changeset,
    ) -> Result<Option<Record>, StoreError> {
        if data.is_empty() {
            return self.get_one(ctx, id).await;
        }
        let set: Vec<&Field> = data.iter().map(|(f, _)| f).collect();
        let template = sql::update(self.dialect, &self.table, &self.fields, &set);
        let mut params: Vec<Param> = data
            .iter()
            .map(|(f, v)| Param::new(f.ty, v.clone()))
            .collect();
        params.push(Param::id(id));
        let stmt = template.bind(params);
        if self.dialect.supports_returning() {
            return self.fetch_one(ctx, &stmt).await;
        }
        self.execute(ctx, &stmt).await?;
        self.get_one(ctx, id).await
    }

    /// Remove row `id`, returning its last state.
    pub async fn delete(&self, ctx: &Context, id: Uuid) -> Result<Option<Record>, StoreError> {
        let stmt = self.delete.bind(vec![Param::id(id)]);
        if self.dialect.supports_returning() {
            return self.fetch_one(ctx, &stmt).await;
        }
        let Some(prior) = self.get_one(ctx, id).await? else {
            return Ok(None);
        };
        self.execute(ctx, &stmt).await?;
        Ok(Some(prior))
    }

    async fn fetch_one(
        &self,
        ctx: &Context,
        stmt: &Statement<'_>,
    ) -> Result<Option<Record>, StoreError> {
        log_statement(stmt);
        self.timed(ctx.store().fetch_one(stmt)).await
    }

    async fn execute(&self, ctx: &Context, stmt: &Statement<'_>) -> Result<u64, StoreError> {
        log_statement(stmt);
        self.timed(ctx.store().execute(stmt)).await
    }

    async fn timed<T>(
        &self,
        fut: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        tokio::time::timeout(self.deadline, fut)
            .await
            .map_err(|_| StoreError::Timeout(self.deadline))?
    }
}

/// Values are never logged; secret fields travel as parameters.
fn log_statement(stmt: &Statement<'_>) {
    tracing::debug!(sql = %stmt.sql(), params = stmt.params.len(), "statement");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_from_str;
    use crate::model::{FieldValue, Model};
    use crate::store::{MemoryBackend, SqlBackend};
    use async_trait::async_trait;
    use serde_json::json;

    /// Never answers.
    struct Stalled;

    #[async_trait]
    impl SqlBackend for Stalled {
        fn dialect(&self) -> Dialect {
            Dialect::MySql
        }

        async fn execute(&self, _stmt: &Statement<'_>) -> Result<u64, StoreError> {
            std::future::pending().await
        }

        async fn fetch_one(&self, _stmt: &Statement<'_>) -> Result<Option<Record>, StoreError> {
            std::future::pending().await
        }

        async fn fetch_all(&self, _stmt: &Statement<'_>) -> Result<Vec<Record>, StoreError> {
            std::future::pending().await
        }

        async fn ping(&self) -> Result<(), StoreError> {
            std::future::pending().await
        }

        async fn close(&self) {}
    }

    const SPEC: &str = r#"{
        "services": [{"name": "main", "type": "sql", "driver": "memory"}],
        "resources": [{
            "name": "Note",
            "table_name": "notes",
            "methods": ["get_many", "get_one", "post", "patch", "delete"],
            "model": {"id": "identifier", "title": "string", "body": {"type": "string", "nullable": true}},
            "backing_service": "main"
        }]
    }"#;

    fn fixture(dialect: Dialect) -> (ResourceRepository, Model, Context) {
        let spec = load_from_str(SPEC).unwrap();
        let def = spec.resources[0].clone();
        let store: Arc<dyn SqlBackend> = Arc::new(MemoryBackend::new(dialect));
        (
            ResourceRepository::new(&def, dialect, Duration::from_secs(5)),
            Model::for_resource(&def),
            Context::new(store, reqwest::Client::new()),
        )
    }

    #[test]
    fn page_rejects_non_positive_values() {
        assert_eq!(Page::new(Some(0), None).unwrap_err().field, "page");
        assert_eq!(Page::new(None, Some(0)).unwrap_err().field, "page_size");
        assert_eq!(Page::new(None, None).unwrap(), Page::default());
    }

    #[test]
    fn page_offset_and_cap() {
        let p = Page::new(Some(3), Some(20)).unwrap();
        assert_eq!((p.limit(), p.offset()), (20, 40));
        assert_eq!(Page::new(Some(1), Some(50_000)).unwrap().limit(), MAX_PAGE_SIZE);
        assert!(Page::new(Some(i64::MAX), Some(10)).is_err());
    }

    #[tokio::test]
    async fn write_paths_agree_across_dialects() {
        for dialect in [Dialect::Postgres, Dialect::MySql] {
            let (repo, model, ctx) = fixture(dialect);
            let inst = model.decode_create(&json!({"title": "t"})).unwrap();
            let id = inst.id().unwrap();

            let created = repo.post(&ctx, &inst).await.unwrap().unwrap();
            assert_eq!(created.get("title"), Some(&FieldValue::Text("t".into())));

            let cs = model.decode_patch(&json!({"body": "b"})).unwrap();
            let patched = repo.patch(&ctx, id, &cs).await.unwrap().unwrap();
            assert_eq!(patched.get("title"), Some(&FieldValue::Text("t".into())));
            assert_eq!(patched.get("body"), Some(&FieldValue::Text("b".into())));

            let gone = repo.delete(&ctx, id).await.unwrap().unwrap();
            assert_eq!(gone, patched);
            assert!(repo.get_one(&ctx, id).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn missing_rows_yield_none() {
        for dialect in [Dialect::Postgres, Dialect::MySql] {
            let (repo, model, ctx) = fixture(dialect);
            let id = Uuid::new_v4();
            let cs = model.decode_patch(&json!({"title": "x"})).unwrap();
            assert!(repo.get_one(&ctx, id).await.unwrap().is_none());
            assert!(repo.patch(&ctx, id, &cs).await.unwrap().is_none());
            assert!(repo.delete(&ctx, id).await.unwrap().is_none());
        }
    }

    #[tokio::test]
    async fn pages_are_disjoint() {
        let (repo, model, ctx) = fixture(Dialect::Postgres);
        for i in 0..5 {
            let inst = model.decode_create(&json!({"title": format!("n{}", i)})).unwrap();
            repo.post(&ctx, &inst).await.unwrap();
        }
        let first = repo.get_many(&ctx, Page::new(Some(1), Some(2)).unwrap()).await.unwrap();
        let second = repo.get_many(&ctx, Page::new(Some(2), Some(2)).unwrap()).await.unwrap();
        let third = repo.get_many(&ctx, Page::new(Some(3), Some(2)).unwrap()).await.unwrap();
        assert_eq!((first.len(), second.len(), third.len()), (2, 2, 1));
        for r in &first {
            assert!(!second.contains(r));
        }
    }

    #[tokio::test]
    async fn stalled_statements_hit_the_deadline() {
        let spec = load_from_str(SPEC).unwrap();
        let def = spec.resources[0].clone();
        let deadline = Duration::from_millis(10);
        let repo = ResourceRepository::new(&def, Dialect::MySql, deadline);
        let ctx = Context::new(Arc::new(Stalled), reqwest::Client::new());
        let id = Uuid::new_v4();
        assert!(matches!(
            repo.get_one(&ctx, id).await,
            Err(StoreError::Timeout(d)) if d == deadline
        ));
        assert!(matches!(
            repo.delete(&ctx, id).await,
            Err(StoreError::Timeout(_))
        ));
        assert!(matches!(
            repo.get_many(&ctx, Page::default()).await,
            Err(StoreError::Timeout(_))
        ));
    }
}
